//! Step-indexed analysis history.
//!
//! A run stores one [`StepRecord`] per output time. The history is
//! preallocated from the time grid and only ever grows by one record at the
//! next step index; records are never rewritten. Re-running an analysis
//! builds a fresh history.

use mbd_types::{Result, SolverError};
use nalgebra::DVector;

/// State of the system at one output time.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Generalized coordinates.
    pub q: DVector<f64>,
    /// Generalized velocities.
    pub qd: DVector<f64>,
    /// Generalized accelerations.
    pub qdd: DVector<f64>,
    /// Lagrange multipliers.
    pub lambda: DVector<f64>,
    /// Whether the position corrector converged at this step.
    pub converged: bool,
}

/// Preallocated, index-addressed sequence of step records.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    records: Vec<StepRecord>,
    capacity: usize,
}

impl History {
    /// Create an empty history for `capacity` steps.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Store the record of step `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::HistoryIndex`] unless `index` is the next step
    /// and the history is not full.
    pub fn push(&mut self, index: usize, record: StepRecord) -> Result<()> {
        let expected = self.records.len();
        if index != expected || expected >= self.capacity {
            return Err(SolverError::HistoryIndex {
                index,
                expected,
                capacity: self.capacity,
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Number of stored steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no step has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of steps the history was sized for.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every step of the grid has been stored.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.records.len() == self.capacity
    }

    /// Record of step `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&StepRecord> {
        self.records.get(index)
    }

    /// Most recent record.
    #[must_use]
    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// All records in step order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Iterate over the records in step order.
    pub fn iter(&self) -> std::slice::Iter<'_, StepRecord> {
        self.records.iter()
    }

    /// Steps at which the position corrector hit its iteration cap.
    #[must_use]
    pub fn non_converged_steps(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.converged)
            .map(|(index, _)| index)
            .collect()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
