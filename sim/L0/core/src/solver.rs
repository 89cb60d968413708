//! Solver facades owning a model and its results.
//!
//! [`KinematicSolver`] and [`DynamicSolver`] wrap [`run_analysis`] with the
//! state a user interacts with: the time grid, the last run's history, the
//! reaction history and the tables built from them.
//!
//! # Example
//!
//! ```ignore
//! use mbd_core::DynamicSolver;
//!
//! let mut solver = DynamicSolver::new(model);
//! solver.set_time_array(2.0, 0.01)?;
//! solver.solve()?;
//! solver.eval_reactions()?;
//!
//! let positions = solver.pos_table()?;
//! let y = positions.column("particle.y");
//! ```

use mbd_constraint::CoordinatePartition;
use mbd_types::{AnalysisConfig, Result, SolverError, TimeGrid};
use nalgebra::DVector;
use tracing::{debug, info};

use crate::assembly::ModelSystem;
use crate::driver::{AnalysisStrategy, run_analysis};
use crate::dynamic::DynamicStrategy;
use crate::history::{History, StepRecord};
use crate::kinematic::KinematicStrategy;
use crate::model::MultibodyModel;
use crate::reactions::{ReactionHistory, joint_reaction, validate_site};
use crate::table::TimeTable;

/// Solver for fully constrained systems.
pub type KinematicSolver<M> = Solver<M, KinematicStrategy>;

/// Solver for systems with degrees of freedom.
pub type DynamicSolver<M> = Solver<M, DynamicStrategy>;

/// A model, its analysis settings and the results of its last run.
#[derive(Debug)]
pub struct Solver<M: MultibodyModel, S: AnalysisStrategy> {
    model: M,
    config: AnalysisConfig,
    strategy: S,
    grid: Option<TimeGrid>,
    history: Option<History>,
    reactions: Option<ReactionHistory>,
}

impl<M: MultibodyModel, S: AnalysisStrategy> Solver<M, S> {
    /// Create a solver with the default configuration.
    pub fn new(model: M) -> Self {
        Self::with_config(model, AnalysisConfig::default())
    }

    /// Create a solver with a custom configuration.
    pub fn with_config(model: M, config: AnalysisConfig) -> Self {
        let strategy = S::from_config(&config);
        Self {
            model,
            config,
            strategy,
            grid: None,
            history: None,
            reactions: None,
        }
    }

    /// Analysis configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next [`Self::solve`].
    pub fn set_config(&mut self, config: AnalysisConfig) {
        self.config = config;
    }

    /// Set the output times from a duration and spacing.
    ///
    /// See [`TimeGrid::from_duration`] for how the pair is interpreted.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidTimeGrid`] for an unusable pair. The
    /// previous grid and results are kept in that case.
    pub fn set_time_array(&mut self, duration: f64, spacing: f64) -> Result<()> {
        let grid = TimeGrid::from_duration(duration, spacing)?;
        debug!(steps = grid.len(), end = grid.end(), "time array set");
        self.set_time_grid(grid);
        Ok(())
    }

    /// Set the output times directly. Results of a previous run are
    /// discarded.
    pub fn set_time_grid(&mut self, grid: TimeGrid) {
        self.grid = Some(grid);
        self.history = None;
        self.reactions = None;
    }

    /// Output times, once set.
    #[must_use]
    pub fn time_grid(&self) -> Option<&TimeGrid> {
        self.grid.as_ref()
    }

    /// Run the analysis over the time grid.
    ///
    /// Previous results, reactions included, are discarded first.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidTimeGrid`] if no time array was set,
    /// and otherwise whatever [`run_analysis`] fails with.
    pub fn solve(&mut self) -> Result<()> {
        let grid = self
            .grid
            .as_ref()
            .ok_or_else(|| SolverError::invalid_time_grid("no time array set"))?;

        self.history = None;
        self.reactions = None;
        self.strategy = S::from_config(&self.config);

        let history = run_analysis(&mut self.model, &mut self.strategy, grid, &self.config)?;
        self.history = Some(history);
        Ok(())
    }

    /// Evaluate the reactions of every site declared by the model at every
    /// stored step.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::NoResults`] before a successful
    /// [`Self::solve`], and [`SolverError::DimensionMismatch`] if a site does
    /// not fit the model.
    pub fn eval_reactions(&mut self) -> Result<()> {
        let (Some(grid), Some(history)) = (&self.grid, &self.history) else {
            return Err(no_results());
        };

        let sites = self.model.reaction_sites();
        let mut system = ModelSystem::new(&mut self.model);
        for site in &sites {
            validate_site(site, system.nrows(), system.ncols())?;
        }

        let names = sites.iter().map(|site| site.name.clone()).collect();
        let mut reactions = ReactionHistory::new(names, history.len());

        for (record, &t) in history.iter().zip(grid.times()) {
            system.restore_state(t, &record.q, &record.qd, &record.qdd, &record.lambda);
            let jacobian = system.constraint_jacobian()?;
            let step = sites
                .iter()
                .map(|site| joint_reaction(site, &jacobian, &record.lambda, &record.q))
                .collect::<Result<Vec<_>>>()?;
            reactions.push(step)?;
        }

        info!(
            sites = sites.len(),
            steps = reactions.len(),
            "joint reactions evaluated"
        );
        self.reactions = Some(reactions);
        Ok(())
    }

    /// History of the last run.
    #[must_use]
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// Reaction history, once evaluated.
    #[must_use]
    pub fn reactions(&self) -> Option<&ReactionHistory> {
        self.reactions.as_ref()
    }

    /// Steps of the last run whose position correction hit the iteration
    /// cap.
    #[must_use]
    pub fn non_converged_steps(&self) -> Vec<usize> {
        self.history
            .as_ref()
            .map(History::non_converged_steps)
            .unwrap_or_default()
    }

    /// Generalized coordinates over time.
    pub fn pos_table(&self) -> Result<TimeTable> {
        self.state_table(|record| &record.q)
    }

    /// Generalized velocities over time.
    pub fn vel_table(&self) -> Result<TimeTable> {
        self.state_table(|record| &record.qd)
    }

    /// Generalized accelerations over time.
    pub fn acc_table(&self) -> Result<TimeTable> {
        self.state_table(|record| &record.qdd)
    }

    /// Joint reactions over time.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::NoResults`] until [`Self::eval_reactions`] has
    /// run.
    pub fn reactions_table(&self) -> Result<TimeTable> {
        let (Some(grid), Some(reactions)) = (&self.grid, &self.reactions) else {
            return Err(SolverError::NoResults {
                reason: "joint reactions have not been evaluated".into(),
            });
        };

        let mut table = TimeTable::new(reactions.column_names());
        for (i, &t) in grid.times().iter().enumerate().take(reactions.len()) {
            if let Some(row) = reactions.row(i) {
                table.push_row(t, &row)?;
            }
        }
        Ok(table)
    }

    /// The model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the model, for changing parameters between runs.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Give the model back.
    pub fn into_model(self) -> M {
        self.model
    }

    fn state_table(&self, select: impl Fn(&StepRecord) -> &DVector<f64>) -> Result<TimeTable> {
        let (Some(grid), Some(history)) = (&self.grid, &self.history) else {
            return Err(no_results());
        };
        TimeTable::from_vectors(
            self.model.coordinate_labels(),
            grid.times(),
            history.iter().map(select),
        )
    }
}

impl<M: MultibodyModel> Solver<M, DynamicStrategy> {
    /// Coordinate partition of the last run.
    #[must_use]
    pub fn partition(&self) -> Option<&CoordinatePartition> {
        self.strategy.partition()
    }

    /// Names of the independent coordinates chosen by the last run.
    #[must_use]
    pub fn independent_coordinates(&self) -> Vec<String> {
        let labels = self.model.coordinate_labels();
        self.partition()
            .map(|partition| {
                partition
                    .independent_labels(&labels)
                    .into_iter()
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn no_results() -> SolverError {
    SolverError::NoResults {
        reason: "no analysis has been run".into(),
    }
}
