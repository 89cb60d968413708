//! Output time discretization.
//!
//! A grid is built from a `(duration, spacing)` pair. When the duration is
//! larger than the spacing, the spacing is a step size and the grid is
//! `0, spacing, 2·spacing, …` strictly below the duration. When the duration
//! is smaller, the spacing is a point count and the grid holds that many
//! uniformly spaced points spanning `[0, duration]`. Equal values are
//! ambiguous and rejected.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::SolverError;

/// Relative slack used when deciding whether `duration / step` is integral.
const RATIO_SLACK: f64 = 1e-9;

/// Output times of an analysis run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeGrid {
    times: Vec<f64>,
    step_size: f64,
}

impl TimeGrid {
    /// Build a grid from a `(duration, spacing)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidTimeGrid`] if `duration == spacing`, if
    /// either value is not positive and finite, or if a point count is not a
    /// whole number of at least two.
    pub fn from_duration(duration: f64, spacing: f64) -> crate::Result<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(SolverError::invalid_time_grid(format!(
                "duration must be positive and finite, got {duration}"
            )));
        }
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(SolverError::invalid_time_grid(format!(
                "spacing must be positive and finite, got {spacing}"
            )));
        }

        if duration > spacing {
            Ok(Self::stepped(duration, spacing))
        } else if duration < spacing {
            Self::counted(duration, spacing)
        } else {
            Err(SolverError::invalid_time_grid(format!(
                "time array is not properly sampled: duration == spacing == {duration}"
            )))
        }
    }

    /// `0, step, 2·step, …` strictly below `duration`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn stepped(duration: f64, step: f64) -> Self {
        let ratio = duration / step;
        let nearest = ratio.round();
        let count = if (ratio - nearest).abs() <= RATIO_SLACK * ratio {
            nearest
        } else {
            ratio.ceil()
        } as usize;

        let times = (0..count).map(|i| i as f64 * step).collect();
        Self {
            times,
            step_size: step,
        }
    }

    /// `count` points spanning `[0, duration]`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn counted(duration: f64, count: f64) -> crate::Result<Self> {
        if count.fract() != 0.0 {
            return Err(SolverError::invalid_time_grid(format!(
                "point count must be a whole number, got {count}"
            )));
        }
        let count = count as usize;
        if count < 2 {
            return Err(SolverError::invalid_time_grid(
                "point count must be at least 2",
            ));
        }

        let step = duration / (count - 1) as f64;
        let mut times: Vec<f64> = (0..count).map(|i| i as f64 * step).collect();
        // Pin the endpoint against accumulated rounding.
        times[count - 1] = duration;

        Ok(Self {
            times,
            step_size: step,
        })
    }

    /// The output times.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Spacing between consecutive output times.
    #[must_use]
    pub const fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Number of output times.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the grid holds no times.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time at step `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    /// Last output time.
    #[must_use]
    pub fn end(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }
}
