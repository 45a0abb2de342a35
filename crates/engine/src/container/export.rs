//! Plain-text export of resolved fields.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{FieldKey, FieldSpec};

use super::SelectionContainer;

impl SelectionContainer {
    /// Write cell centers and `fields` as a tab-separated table.
    ///
    /// The header line starts with `#` and names the columns `x`, `y`, `z`
    /// followed by each field key; every row is one selected cell, values in
    /// scientific notation with 16 decimals. With no fields given, every field already in the
    /// store is written, in key order. Fields must have one value per cell.
    pub fn write_out(&mut self, path: impl AsRef<Path>, fields: &[FieldSpec]) -> Result<()> {
        self.establish()?;
        let keys: Vec<FieldKey> = if fields.is_empty() {
            let mut stored = self.keys();
            stored.sort();
            stored
        } else {
            self.data.determine_fields(fields)?
        };

        let centers = self.fcoords()?;
        let mut columns = Vec::with_capacity(keys.len());
        for key in &keys {
            let array = self.resolved(key)?;
            if array.len() != centers.len() {
                return Err(Error::LengthMismatch {
                    field: key.clone(),
                    expected: centers.len(),
                    actual: array.len(),
                });
            }
            columns.push(array);
        }

        let mut table = String::from("#\tx\ty\tz");
        for key in &keys {
            let _ = write!(table, "\t{key}");
        }
        table.push('\n');
        for (row, center) in centers.iter().enumerate() {
            let cells = center
                .iter()
                .copied()
                .chain(columns.iter().map(|column| column.values()[row]));
            let line: Vec<String> = cells.map(|value| format!("{value:.16e}")).collect();
            table.push_str(&line.join("\t"));
            table.push('\n');
        }

        fs::write(path.as_ref(), table)?;
        debug!(path = %path.as_ref().display(), rows = centers.len(), columns = keys.len(), "fields written");
        Ok(())
    }
}
