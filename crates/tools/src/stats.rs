//! Summary statistics for resolved fields.

use serde::Serialize;

use fieldscope_engine::UnitArray;

/// Count, range and mean of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStats {
    pub field: String,
    pub units: String,
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl FieldStats {
    pub fn of(field: impl Into<String>, array: &UnitArray) -> Self {
        let values = array.values();
        let (min, max, mean) = if values.is_empty() {
            (None, None, None)
        } else {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (Some(min), Some(max), Some(mean))
        };
        Self {
            field: field.into(),
            units: array.units().to_string(),
            count: values.len(),
            min,
            max,
            mean,
        }
    }
}
