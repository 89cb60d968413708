//! Error types for multibody analysis.

use std::fmt;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies which linear solve failed.
///
/// Every linear system the drivers build is tagged with a stage so a
/// singular matrix can be traced back to the equation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolveStage {
    /// Newton-Raphson position correction (`J·Δq = −Φ`).
    PositionCorrection,
    /// Velocity solve (`J·qd = −ν`).
    Velocity,
    /// Acceleration solve (`J·qdd = −γ`).
    Acceleration,
    /// Multiplier recovery for fully constrained systems (`Jᵀ·λ = Q − M·qdd`).
    Multipliers,
    /// LU factorization of `Jᵀ` for coordinate partitioning.
    Partition,
    /// Dependent block of the partitioned Jacobian (`Ju`).
    DependentJacobian,
    /// Reduced mass matrix of the independent coordinates (`M̂`).
    ReducedMass,
    /// Augmented mass/constraint (KKT) system.
    Augmented,
    /// Linear solve inside an implicit integrator stage.
    Integrator,
    /// Caller-supplied solve outside the analysis drivers.
    External,
}

impl fmt::Display for SolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PositionCorrection => "position correction",
            Self::Velocity => "velocity",
            Self::Acceleration => "acceleration",
            Self::Multipliers => "lagrange multipliers",
            Self::Partition => "coordinate partition",
            Self::DependentJacobian => "dependent jacobian block",
            Self::ReducedMass => "reduced mass matrix",
            Self::Augmented => "augmented system",
            Self::Integrator => "integrator stage",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during multibody analysis.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    /// A linear system was singular, non-square or had mismatched dimensions.
    #[error("singular system in {stage} solve: {reason}")]
    SingularSystem {
        /// The solve that failed.
        stage: SolveStage,
        /// Description of the failure.
        reason: String,
    },

    /// The time discretization could not be built.
    #[error("invalid time grid: {reason}")]
    InvalidTimeGrid {
        /// Description of the discretization error.
        reason: String,
    },

    /// The adaptive integrator could not advance the reduced system.
    #[error("integration failed at t = {time}: {reason}")]
    IntegrationFailed {
        /// Last successfully integrated time.
        time: f64,
        /// Description of the failure.
        reason: String,
    },

    /// The model's degrees of freedom do not suit the requested analysis.
    #[error("{analysis} analysis requires {expected}, model has nrows = {nrows}, ncols = {ncols}")]
    DofMismatch {
        /// Name of the analysis.
        analysis: &'static str,
        /// Human readable requirement.
        expected: &'static str,
        /// Number of scalar constraint equations.
        nrows: usize,
        /// Number of generalized coordinates.
        ncols: usize,
    },

    /// A vector or matrix had the wrong length or shape.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The quantity being checked.
        what: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// A sparse block fell outside the assembled matrix.
    #[error("block at ({row}, {col}) of shape {rows}x{cols} exceeds {total_rows}x{total_cols} matrix")]
    BlockOutOfRange {
        /// Row offset of the block.
        row: usize,
        /// Column offset of the block.
        col: usize,
        /// Block rows.
        rows: usize,
        /// Block columns.
        cols: usize,
        /// Assembled matrix rows.
        total_rows: usize,
        /// Assembled matrix columns.
        total_cols: usize,
    },

    /// Two sparse blocks covered the same entry.
    #[error("block at ({row}, {col}) overlaps a previously assembled block")]
    BlockOverlap {
        /// Row offset of the offending block.
        row: usize,
        /// Column offset of the offending block.
        col: usize,
    },

    /// A history record was stored out of step order or past the time grid.
    #[error("history rejected step {index}: next step is {expected}, capacity {capacity}")]
    HistoryIndex {
        /// Step index of the rejected record.
        index: usize,
        /// The only index the history accepts next.
        expected: usize,
        /// Number of steps preallocated from the time grid.
        capacity: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Results were requested before an analysis was run.
    #[error("no analysis results available: {reason}")]
    NoResults {
        /// What was requested.
        reason: String,
    },
}

impl SolverError {
    /// Create a singular system error for the given stage.
    #[must_use]
    pub fn singular(stage: SolveStage, reason: impl Into<String>) -> Self {
        Self::SingularSystem {
            stage,
            reason: reason.into(),
        }
    }

    /// Create an invalid time grid error.
    #[must_use]
    pub fn invalid_time_grid(reason: impl Into<String>) -> Self {
        Self::InvalidTimeGrid {
            reason: reason.into(),
        }
    }

    /// Create an integration failure error.
    #[must_use]
    pub fn integration_failed(time: f64, reason: impl Into<String>) -> Self {
        Self::IntegrationFailed {
            time,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Check if this is a singular system error.
    #[must_use]
    pub fn is_singular(&self) -> bool {
        matches!(self, Self::SingularSystem { .. })
    }

    /// The failing solve stage, if this is a singular system error.
    #[must_use]
    pub fn stage(&self) -> Option<SolveStage> {
        match self {
            Self::SingularSystem { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Check if this is a configuration error (including the time grid).
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::InvalidTimeGrid { .. }
        )
    }
}
