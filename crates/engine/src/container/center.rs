//! Container centers and field maxima.
//!
//! A container's center is stored as the `center` field parameter, in code
//! length. It can be given as a point, a unit-tagged point, the domain
//! center, or the location of the maximum of a field over the dataset.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::selector::AllSelector;
use crate::types::FieldSpec;
use crate::units::UnitArray;

use super::SelectionContainer;

/// Units centers are stored in.
pub const CODE_LENGTH: &str = "cm";

/// How a container's center is chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum Center {
    /// Midpoint of the domain.
    Domain,
    /// Location of the maximum of a field over the whole dataset.
    Max(FieldSpec),
    /// A point in code length.
    Point([f64; 3]),
    /// A point with explicit units.
    Tagged(UnitArray),
}

impl Center {
    /// Parse the string forms: `c`/`center`, `m`/`max` (maximum density)
    /// and `max_<field>`.
    pub fn parse(text: &str) -> Result<Self> {
        let lower = text.to_lowercase();
        match lower.as_str() {
            "c" | "center" => Ok(Self::Domain),
            "m" | "max" => Ok(Self::Max(FieldSpec::from("density"))),
            _ => match text.strip_prefix("max_") {
                Some(field) if !field.is_empty() => Ok(Self::Max(FieldSpec::from(field))),
                _ => Err(Error::InvalidArgument(format!("unrecognized center '{text}'"))),
            },
        }
    }

    /// Parse a scripting-layer value: one of the string forms, an array of
    /// three numbers in code length, or `{"value": [x, y, z], "units": u}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Self::parse(text),
            Value::Array(_) => point(value).map(Self::Point),
            Value::Object(fields) => {
                let coordinates = fields
                    .get("value")
                    .ok_or_else(|| Error::InvalidArgument("center object needs a 'value'".to_string()))
                    .and_then(point)?;
                let units = fields.get("units").and_then(Value::as_str).unwrap_or(CODE_LENGTH);
                Ok(Self::Tagged(UnitArray::new(coordinates.to_vec(), units)))
            }
            other => Err(Error::InvalidArgument(format!("unrecognized center {other}"))),
        }
    }
}

fn point(value: &Value) -> Result<[f64; 3]> {
    let invalid = || Error::InvalidArgument(format!("center must be three numbers, got {value}"));
    let items = value.as_array().ok_or_else(invalid)?;
    let coordinates = items.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>().ok_or_else(invalid)?;
    <[f64; 3]>::try_from(coordinates).map_err(|_| invalid())
}

impl SelectionContainer {
    /// Resolve `center` and store it as the `center` field parameter.
    pub fn set_center(&mut self, center: Center) -> Result<()> {
        let dataset = Arc::clone(self.dataset());
        let location = match center {
            Center::Domain => dataset.domain_center(),
            Center::Point(location) => location,
            Center::Tagged(mut array) => {
                array.convert_to(CODE_LENGTH, dataset.units())?;
                <[f64; 3]>::try_from(array.values()).map_err(|_| {
                    Error::InvalidArgument(format!("center must have three components, got {}", array.len()))
                })?
            }
            Center::Max(spec) => {
                let mut everything = self.child(Arc::new(AllSelector));
                everything.find_max(spec)?.1
            }
        };
        debug!(center = ?location, "center set");
        self.set_field_parameter("center", UnitArray::new(location.to_vec(), CODE_LENGTH));
        Ok(())
    }

    /// Largest value of a field over this selection and where it sits.
    ///
    /// Fluid values are located at cell centers and particle values at the
    /// particle positions of the field's category. NaNs are skipped.
    pub fn find_max(&mut self, spec: impl Into<FieldSpec>) -> Result<(f64, [f64; 3])> {
        self.establish()?;
        let key = self.data.determine_field(&spec.into())?;
        let values = self.resolved(&key)?;
        let positions: Vec<[f64; 3]> = if self.dataset().field_info(&key)?.particle_type {
            let [x, y, z] = self.particle_positions(&key.category)?;
            (0..x.len())
                .map(|p| [x.values()[p], y.values()[p], z.values()[p]])
                .collect()
        } else {
            self.fcoords()?
        };
        if positions.len() != values.len() {
            return Err(Error::LengthMismatch {
                field: key,
                expected: positions.len(),
                actual: values.len(),
            });
        }

        let best = values
            .values()
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_nan())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(at, value)| (*value, positions[at]));
        best.ok_or_else(|| Error::InvalidArgument(format!("{key} has no values in the selection")))
    }
}
