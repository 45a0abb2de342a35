//! Unit-tagged arrays and the unit conversion boundary.
//!
//! Unit algebra is not this crate's concern: conversions go through the
//! [`UnitSystem`] a dataset supplies. [`UnitTable`] is a flat table of named
//! symbols, enough for backends that only deal in a fixed set of units.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A numeric array tagged with its units.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitArray {
    values: Vec<f64>,
    units: String,
}

impl UnitArray {
    pub fn new(values: Vec<f64>, units: impl Into<String>) -> Self {
        Self {
            values,
            units: units.into(),
        }
    }

    /// Dimensionless array.
    pub fn dimensionless(values: Vec<f64>) -> Self {
        Self::new(values, "")
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert in place.
    pub fn convert_to(&mut self, units: &str, system: &dyn UnitSystem) -> Result<()> {
        if self.units == units {
            return Ok(());
        }
        let factor = system.factor(&self.units, units)?;
        for value in &mut self.values {
            *value *= factor;
        }
        self.units = units.to_string();
        Ok(())
    }

    /// Elements where `mask` is true, keeping the units.
    pub fn masked(&self, mask: &[bool]) -> Self {
        let values = self
            .values
            .iter()
            .zip(mask)
            .filter_map(|(value, keep)| keep.then_some(*value))
            .collect();
        Self::new(values, self.units.clone())
    }
}

/// Conversion between unit expressions.
pub trait UnitSystem: Send + Sync {
    /// Multiplicative factor taking a value in `from` to `to`.
    fn factor(&self, from: &str, to: &str) -> Result<f64>;
}

#[derive(Debug, Clone)]
struct UnitEntry {
    dimension: String,
    scale: f64,
}

/// Table of named units, each with a dimension and a scale relative to the
/// base unit of that dimension.
#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    units: IndexMap<String, UnitEntry>,
}

impl UnitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol.
    pub fn define(mut self, symbol: &str, dimension: &str, scale: f64) -> Self {
        self.units.insert(
            symbol.to_string(),
            UnitEntry {
                dimension: dimension.to_string(),
                scale,
            },
        );
        self
    }

    /// CGS table with the symbols the reference backend uses.
    pub fn cgs() -> Self {
        Self::new()
            .define("", "dimensionless", 1.0)
            .define("dimensionless", "dimensionless", 1.0)
            .define("cm", "length", 1.0)
            .define("m", "length", 1.0e2)
            .define("km", "length", 1.0e5)
            .define("g", "mass", 1.0)
            .define("kg", "mass", 1.0e3)
            .define("s", "time", 1.0)
            .define("K", "temperature", 1.0)
            .define("cm/s", "velocity", 1.0)
            .define("km/s", "velocity", 1.0e5)
            .define("g/cm**3", "density", 1.0)
            .define("kg/m**3", "density", 1.0e-3)
            .define("erg", "energy", 1.0)
            .define("erg/g", "specific_energy", 1.0)
    }
}

impl UnitSystem for UnitTable {
    fn factor(&self, from: &str, to: &str) -> Result<f64> {
        if from == to {
            return Ok(1.0);
        }
        let mismatch = || Error::UnitConversion {
            from: from.to_string(),
            to: to.to_string(),
        };
        let source = self.units.get(from).ok_or_else(mismatch)?;
        let target = self.units.get(to).ok_or_else(mismatch)?;
        if source.dimension != target.dimension {
            return Err(mismatch());
        }
        Ok(source.scale / target.scale)
    }
}
