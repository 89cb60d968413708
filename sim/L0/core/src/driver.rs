//! The shared stepping loop.
//!
//! Kinematic and dynamic analysis walk the time grid the same way:
//!
//! ```text
//! start(t0)                       one-time setup (dimension checks, partition)
//! correct(q0) → recover           step 0
//! for each next output time t:
//!     guess(previous, t, dt)      predictor
//!     correct(guess)              Newton-Raphson on the (augmented) positions
//!     recover(q)                  velocities, accelerations, multipliers
//!     history.push(step)
//! ```
//!
//! [`run_analysis`] owns that loop; an [`AnalysisStrategy`] supplies the
//! parts that differ.

use mbd_constraint::{NewtonCorrector, NewtonOutcome, PositionSystem};
use mbd_types::{AnalysisConfig, Result, SolverError, TimeGrid};
use nalgebra::DVector;
use tracing::{debug, info};

use crate::assembly::ModelSystem;
use crate::history::{History, StepRecord};
use crate::model::MultibodyModel;

/// The analysis-specific parts of a run.
pub trait AnalysisStrategy {
    /// Analysis name for logs and errors.
    const NAME: &'static str;

    /// A fresh strategy for a run under `config`.
    fn from_config(config: &AnalysisConfig) -> Self
    where
        Self: Sized;

    /// One-time setup before step 0. The system is at the initial time and
    /// coordinates.
    fn start<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        t0: f64,
        q0: &DVector<f64>,
    ) -> Result<()>;

    /// Initial guess for the step at time `t`, `dt` after `previous`.
    ///
    /// Defaults to constant-acceleration extrapolation
    /// `q + qd·dt + ½·qdd·dt²`.
    fn guess<M: MultibodyModel + ?Sized>(
        &mut self,
        _system: &mut ModelSystem<'_, M>,
        previous: &StepRecord,
        _t: f64,
        dt: f64,
    ) -> Result<DVector<f64>> {
        Ok(extrapolate(previous, dt))
    }

    /// Correct a guess onto the position constraints.
    fn correct<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        corrector: &NewtonCorrector,
        guess: DVector<f64>,
    ) -> Result<NewtonOutcome>;

    /// Recover velocities, accelerations and multipliers at the corrected
    /// coordinates.
    fn recover<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        outcome: NewtonOutcome,
    ) -> Result<StepRecord>;
}

/// Constant-acceleration extrapolation of a step record.
#[must_use]
pub fn extrapolate(previous: &StepRecord, dt: f64) -> DVector<f64> {
    &previous.q + &previous.qd * dt + &previous.qdd * (0.5 * dt * dt)
}

/// Walk `grid` with `strategy`, returning one record per output time.
///
/// # Errors
///
/// Returns configuration errors before any stepping, and propagates any
/// fatal failure (singular solves, integrator failure) from the step at
/// which it occurs.
pub fn run_analysis<M, S>(
    model: &mut M,
    strategy: &mut S,
    grid: &TimeGrid,
    config: &AnalysisConfig,
) -> Result<History>
where
    M: MultibodyModel + ?Sized,
    S: AnalysisStrategy,
{
    config.validate()?;
    let t0 = grid
        .get(0)
        .ok_or_else(|| SolverError::invalid_time_grid("time grid is empty"))?;

    let corrector = NewtonCorrector::new(config.newton);
    let mut system = ModelSystem::new(model);
    let mut history = History::with_capacity(grid.len());

    info!(
        analysis = S::NAME,
        steps = grid.len(),
        nrows = system.nrows(),
        ncols = system.ncols(),
        "starting analysis"
    );

    let q0 = system.initial_coordinates()?;
    system.set_time(t0);
    system.set_coordinates(&q0)?;
    strategy.start(&mut system, t0, &q0)?;

    let outcome = strategy.correct(&mut system, &corrector, q0)?;
    let record = strategy.recover(&mut system, outcome)?;
    history.push(0, record)?;

    for (i, window) in grid.times().windows(2).enumerate() {
        let step = i + 1;
        let (t_prev, t) = (window[0], window[1]);
        let dt = t - t_prev;

        system.set_time(t);
        let previous = history.last().ok_or_else(|| SolverError::NoResults {
            reason: format!("no record before step {step}"),
        })?;
        let guess = strategy.guess(&mut system, previous, t, dt)?;

        let outcome = strategy.correct(&mut system, &corrector, guess)?;
        let (iterations, converged) = (outcome.iterations, outcome.converged);

        let record = strategy.recover(&mut system, outcome)?;
        debug!(step, t, iterations, converged, "step accepted");
        history.push(step, record)?;
    }

    info!(
        analysis = S::NAME,
        steps = history.len(),
        non_converged = history.non_converged_steps().len(),
        "analysis complete"
    );
    Ok(history)
}
