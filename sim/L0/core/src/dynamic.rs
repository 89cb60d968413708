//! Dynamic analysis by coordinate partitioning.
//!
//! Systems with `dof = ncols − nrows > 0` are integrated in their independent
//! coordinates `v` only. The dependent coordinates `u` are recovered from the
//! constraints at every output time.
//!
//! # Reduced Equations of Motion
//!
//! With the Jacobian and mass matrix split by the partition,
//!
//! ```text
//! H  = −Ju⁻¹ · Jv
//! M̂  = Mvv + Mvu·H + Hᵀ·(Muv + Muu·H)
//! Q̂  = Qv + Hᵀ·Qu − (Mvu + Hᵀ·Muu) · Ju⁻¹·(−γ)
//! v̈  = M̂⁻¹ · Q̂
//! ```
//!
//! `(M̂, Q̂)` are evaluated at each output time and held fixed while the
//! integrator advances `[v; v̇]` to the next one.
//!
//! # Per-Step Recovery
//!
//! Accelerations and multipliers come from the full augmented system
//!
//! ```text
//! [ M  Jᵀ ] [ qdd ]   [  Q ]
//! [ J  0  ] [  λ  ] = [ −γ ]
//! ```
//!
//! # Partition Lifetime
//!
//! The partition is computed once from the initial configuration. A large
//! motion can make `Ju` singular later in the run. `[J; Sᵀ]` is singular
//! exactly when `Ju` is, so the run stops with a
//! [`SolveStage::PositionCorrection`] error at the first such output time
//! instead of re-partitioning. [`reduced_system`] called directly with a
//! stale partition reports [`SolveStage::DependentJacobian`].

use mbd_constraint::{
    BlockAssembler, CoordinatePartition, NewtonCorrector, NewtonOutcome, SolveStage, solve,
    solve_vector,
};
use mbd_types::{AnalysisConfig, IntegratorConfig, Result, SolverError};
use nalgebra::{DMatrix, DVector};
use tracing::info;

use crate::assembly::{AugmentedSystem, ModelSystem, stack_rows};
use crate::driver::{AnalysisStrategy, extrapolate};
use crate::history::StepRecord;
use crate::integrator::{AdaptiveIntegrator, OdeSystem};
use crate::model::MultibodyModel;

/// Reduced equations of motion with frozen `v̈`.
///
/// State is `[v; v̇]`, so `y' = [v̇; v̈]`.
#[derive(Debug, Clone)]
pub struct ReducedDynamics {
    acceleration: DVector<f64>,
}

impl ReducedDynamics {
    /// Reduced dynamics with independent accelerations `v̈`.
    #[must_use]
    pub fn new(acceleration: DVector<f64>) -> Self {
        Self { acceleration }
    }

    /// Solve `M̂ · v̈ = Q̂`.
    pub fn from_reduced_system(m_hat: &DMatrix<f64>, q_hat: &DVector<f64>) -> Result<Self> {
        let acceleration = solve_vector(m_hat, q_hat, SolveStage::ReducedMass)?;
        Ok(Self::new(acceleration))
    }

    /// Independent accelerations.
    #[must_use]
    pub fn acceleration(&self) -> &DVector<f64> {
        &self.acceleration
    }
}

impl OdeSystem for ReducedDynamics {
    fn derivative(&mut self, _t: f64, y: &DVector<f64>) -> Result<DVector<f64>> {
        let dof = self.acceleration.len();
        let mut dydt = DVector::zeros(2 * dof);
        dydt.rows_mut(0, dof).copy_from(&y.rows(dof, dof));
        dydt.rows_mut(dof, dof).copy_from(&self.acceleration);
        Ok(dydt)
    }
}

/// Reduced mass matrix and force vector of the independent coordinates.
///
/// # Errors
///
/// Returns [`mbd_types::SolverError::SingularSystem`] at
/// [`SolveStage::DependentJacobian`] if `Ju` is singular.
pub fn reduced_system(
    partition: &CoordinatePartition,
    mass: &DMatrix<f64>,
    jacobian: &DMatrix<f64>,
    forces: &DVector<f64>,
    acc_rhs: &DVector<f64>,
) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let (ju, jv) = partition.split_columns(jacobian);
    let (muu, muv, mvu, mvv) = partition.split_mass(mass);
    let (qu, qv) = partition.split_vector(forces);

    let h = -solve(&ju, &jv, SolveStage::DependentJacobian)?;
    let u_acc = solve_vector(&ju, &(-acc_rhs), SolveStage::DependentJacobian)?;

    let ht = h.transpose();
    let m_hat = &mvv + &mvu * &h + &ht * (&muv + &muu * &h);
    let q_hat = &qv + &ht * &qu - (&mvu + &ht * &muu) * u_acc;

    Ok((m_hat, q_hat))
}

/// Solve the augmented system for `(qdd, λ)`.
///
/// # Errors
///
/// Returns [`mbd_types::SolverError::SingularSystem`] at
/// [`SolveStage::Augmented`] if the system is singular.
pub fn augmented_accelerations(
    mass: &DMatrix<f64>,
    jacobian: &DMatrix<f64>,
    forces: &DVector<f64>,
    acc_rhs: &DVector<f64>,
) -> Result<(DVector<f64>, DVector<f64>)> {
    let (nrows, ncols) = jacobian.shape();
    let size = nrows + ncols;

    let mut assembler = BlockAssembler::new(size, size);
    assembler.add_block(0, 0, mass)?;
    if nrows > 0 {
        assembler.add_block(0, ncols, &jacobian.transpose())?;
        assembler.add_block(ncols, 0, jacobian)?;
    }
    let kkt = assembler.build();

    let mut rhs = DVector::zeros(size);
    rhs.rows_mut(0, ncols).copy_from(forces);
    rhs.rows_mut(ncols, nrows).copy_from(&(-acc_rhs));

    let x = solve_vector(&kkt, &rhs, SolveStage::Augmented)?;
    Ok((x.rows(0, ncols).into_owned(), x.rows(ncols, nrows).into_owned()))
}

/// Strategy for systems with degrees of freedom.
#[derive(Debug, Clone)]
pub struct DynamicStrategy {
    config: IntegratorConfig,
    partition: Option<CoordinatePartition>,
    integrator: Option<AdaptiveIntegrator>,
    reduced: Option<ReducedDynamics>,
}

impl DynamicStrategy {
    /// Create a strategy integrating with `config`.
    #[must_use]
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            config,
            partition: None,
            integrator: None,
            reduced: None,
        }
    }

    /// The coordinate partition, once a run has started.
    #[must_use]
    pub fn partition(&self) -> Option<&CoordinatePartition> {
        self.partition.as_ref()
    }

    /// The integrator, once a run has started on a system with degrees of
    /// freedom.
    #[must_use]
    pub fn integrator(&self) -> Option<&AdaptiveIntegrator> {
        self.integrator.as_ref()
    }

    fn partition_ref(&self) -> Result<&CoordinatePartition> {
        self.partition.as_ref().ok_or_else(|| SolverError::NoResults {
            reason: "dynamic analysis has not been started".into(),
        })
    }

    /// Independent velocities the integrator currently holds. Empty for
    /// zero-DOF systems.
    fn independent_velocities(&self) -> DVector<f64> {
        match &self.integrator {
            Some(integrator) => {
                let state = integrator.state();
                let dof = state.len() / 2;
                state.rows(dof, dof).into_owned()
            }
            None => DVector::zeros(0),
        }
    }
}

impl Default for DynamicStrategy {
    fn default() -> Self {
        Self::new(IntegratorConfig::default())
    }
}

impl AnalysisStrategy for DynamicStrategy {
    const NAME: &'static str = "dynamic";

    fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.integrator.clone())
    }

    fn start<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        t0: f64,
        q0: &DVector<f64>,
    ) -> Result<()> {
        let jacobian = system.constraint_jacobian()?.to_dense();
        let partition = CoordinatePartition::from_jacobian(&jacobian)?;

        let labels = system.model().coordinate_labels();
        info!(
            dof = partition.dof(),
            independent = ?partition.independent_labels(&labels),
            "estimated degrees of freedom"
        );

        self.integrator = if partition.dof() > 0 {
            let qd0 = system.initial_velocities()?;
            let dof = partition.dof();
            let mut y0 = DVector::zeros(2 * dof);
            y0.rows_mut(0, dof)
                .copy_from(&partition.gather_independent(q0));
            y0.rows_mut(dof, dof)
                .copy_from(&partition.gather_independent(&qd0));
            Some(AdaptiveIntegrator::new(self.config.clone(), t0, y0))
        } else {
            None
        };
        self.partition = Some(partition);
        self.reduced = None;
        Ok(())
    }

    fn guess<M: MultibodyModel + ?Sized>(
        &mut self,
        _system: &mut ModelSystem<'_, M>,
        previous: &StepRecord,
        t: f64,
        dt: f64,
    ) -> Result<DVector<f64>> {
        let mut guess = extrapolate(previous, dt);

        if let (Some(integrator), Some(reduced), Some(partition)) =
            (&mut self.integrator, &mut self.reduced, &self.partition)
        {
            integrator.integrate_to(reduced, t)?;
            let dof = partition.dof();
            let positions = integrator.state().rows(0, dof).into_owned();
            partition.scatter_independent(&mut guess, &positions);
        }

        Ok(guess)
    }

    fn correct<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        corrector: &NewtonCorrector,
        guess: DVector<f64>,
    ) -> Result<NewtonOutcome> {
        let partition = self.partition_ref()?;
        let mut augmented = AugmentedSystem::new(system, partition);
        corrector.correct(&mut augmented, guess)
    }

    fn recover<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        outcome: NewtonOutcome,
    ) -> Result<StepRecord> {
        let independent_velocities = self.independent_velocities();
        let partition = self.partition_ref()?;

        // Velocities from [J; Sᵀ]·qd = −[ν; −v̇]
        let jacobian = system.constraint_jacobian()?.to_dense();
        let selection_t = partition.selection_matrix().transpose();
        let augmented_jacobian = stack_rows(&jacobian, &selection_t);
        let mut vel_rhs = DVector::zeros(system.ncols());
        vel_rhs
            .rows_mut(0, system.nrows())
            .copy_from(&system.velocity_rhs()?);
        vel_rhs
            .rows_mut(system.nrows(), partition.dof())
            .copy_from(&(-independent_velocities));
        let qd = solve_vector(&augmented_jacobian, &(-vel_rhs), SolveStage::Velocity)?;
        system.set_velocities(&qd);

        // Equations of motion at the corrected state.
        let jacobian = system.constraint_jacobian()?.to_dense();
        let mass = system.mass_matrix()?.to_dense();
        let forces = system.forces()?;
        let acc_rhs = system.acceleration_rhs()?;

        let (qdd, lambda) = augmented_accelerations(&mass, &jacobian, &forces, &acc_rhs)?;
        system.set_accelerations(&qdd);

        let reduced = if partition.dof() > 0 {
            let (m_hat, q_hat) = reduced_system(partition, &mass, &jacobian, &forces, &acc_rhs)?;
            Some(ReducedDynamics::from_reduced_system(&m_hat, &q_hat)?)
        } else {
            None
        };
        self.reduced = reduced;

        Ok(StepRecord {
            q: outcome.coordinates,
            qd,
            qdd,
            lambda,
            converged: outcome.converged,
        })
    }
}
