//! Time-indexed result tables.
//!
//! Tables are column-major: one vector of values per named column plus the
//! shared `time` column. Columns are looked up by name through a hash index.

use hashbrown::HashMap;
use mbd_types::{Result, SolverError};
use nalgebra::DVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the time column.
pub const TIME_COLUMN: &str = "time";

/// Named columns of values sampled at the output times.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
    time: Vec<f64>,
}

impl TimeTable {
    /// Create an empty table with the given value columns.
    ///
    /// A repeated name keeps its first column for lookups.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        let columns = vec![Vec::new(); names.len()];
        Self {
            names,
            index,
            columns,
            time: Vec::new(),
        }
    }

    /// Build a table from one vector per output time.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::DimensionMismatch`] if the number of rows does
    /// not match the number of times or a row has the wrong length.
    pub fn from_vectors<'a>(
        names: Vec<String>,
        times: &[f64],
        rows: impl IntoIterator<Item = &'a DVector<f64>>,
    ) -> Result<Self> {
        let mut table = Self::new(names);
        let mut count = 0;
        for row in rows {
            if let Some(&t) = times.get(count) {
                table.push_row(t, row.as_slice())?;
            }
            count += 1;
        }
        if count != times.len() {
            return Err(SolverError::dimension_mismatch(
                "table rows",
                times.len(),
                count,
            ));
        }
        Ok(table)
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::DimensionMismatch`] if `values` does not have
    /// one entry per column.
    pub fn push_row(&mut self, time: f64, values: &[f64]) -> Result<()> {
        if values.len() != self.names.len() {
            return Err(SolverError::dimension_mismatch(
                "table row",
                self.names.len(),
                values.len(),
            ));
        }
        for (column, &value) in self.columns.iter_mut().zip(values) {
            column.push(value);
        }
        self.time.push(time);
        Ok(())
    }

    /// Value column names, without `time`.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// All column names, `time` last.
    pub fn header(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(TIME_COLUMN))
    }

    /// Column by name. `"time"` returns the time column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match self.index.get(name) {
            Some(&i) => Some(&self.columns[i]),
            None if name == TIME_COLUMN => Some(&self.time),
            None => None,
        }
    }

    /// The time column.
    #[must_use]
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Value at `row` of column `name`.
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name)?.get(row).copied()
    }

    /// Values of row `row` in column order, without `time`.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<Vec<f64>> {
        if row >= self.time.len() {
            return None;
        }
        Some(self.columns.iter().map(|column| column[row]).collect())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}
