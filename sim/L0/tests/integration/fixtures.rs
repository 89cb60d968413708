//! Model fixtures shared by the integration tests.
//!
//! Each fixture implements [`MultibodyModel`] by hand, with closed-form
//! constraint equations:
//!
//! - [`CircleParticle`]: planar particle on the unit circle, optionally with
//!   `y` driven along `c·t³` (`dof = 1`, or `0` when driven)
//! - [`SpatialBody`]: one body with Euler-parameter orientation, held at a
//!   driven point with its orientation locked (`dof = 0`)
//! - [`TiltingLine`]: particle on a line through the origin whose normal
//!   turns from `x` to `y`, invalidating the initial partition at `t = 1`

use mbd_core::{MatrixBlock, MultibodyModel, ReactionSite, euler_parameter_matrix};
use nalgebra::{DMatrix, DVector, Matrix3, Matrix3x4, Vector3, Vector4};

/// Standard gravity used by the fixtures.
pub const GRAVITY: f64 = 9.81;

/// Tolerance on `‖Φ(q)‖` for corrected positions under the default
/// Newton tolerance.
pub const POSITION_TOL: f64 = 1e-5;

/// Tolerance on residuals of solved linear systems.
pub const LINEAR_TOL: f64 = 1e-9;

// ============================================================================
// Circle particle
// ============================================================================

/// Unit-mass particle on the circle `x² + y² = 1`.
///
/// Coordinates `[x, y]`. With a driver, a second row holds `y = c·t³`.
#[derive(Debug, Clone)]
pub struct CircleParticle {
    gravity: f64,
    start: (f64, f64),
    driver: Option<f64>,
    t: f64,
    q: DVector<f64>,
    qd: DVector<f64>,
}

impl CircleParticle {
    /// Free particle released at rest from `(1, 0)`.
    pub fn free(gravity: f64) -> Self {
        Self::at(gravity, 1.0, 0.0)
    }

    /// Free particle released at rest from `(x, y)`.
    pub fn at(gravity: f64, x: f64, y: f64) -> Self {
        Self {
            gravity,
            start: (x, y),
            driver: None,
            t: 0.0,
            q: DVector::from_vec(vec![x, y]),
            qd: DVector::zeros(2),
        }
    }

    /// Particle starting at `(1, 0)` with `y = c·t³` imposed.
    pub fn driven(gravity: f64, c: f64) -> Self {
        Self {
            driver: Some(c),
            ..Self::free(gravity)
        }
    }
}

impl MultibodyModel for CircleParticle {
    fn nrows(&self) -> usize {
        if self.driver.is_some() { 2 } else { 1 }
    }

    fn ncols(&self) -> usize {
        2
    }

    fn initial_coordinates(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.start.0, self.start.1])
    }

    fn body_names(&self) -> Vec<String> {
        vec!["particle".into()]
    }

    fn coordinate_labels(&self) -> Vec<String> {
        vec!["particle.x".into(), "particle.y".into()]
    }

    fn set_gen_coordinates(&mut self, q: &DVector<f64>) {
        self.q.copy_from(q);
    }

    fn set_gen_velocities(&mut self, qd: &DVector<f64>) {
        self.qd.copy_from(qd);
    }

    fn set_gen_accelerations(&mut self, _qdd: &DVector<f64>) {}

    fn set_time(&mut self, t: f64) {
        self.t = t;
    }

    fn eval_pos_eq(&mut self) -> Vec<DVector<f64>> {
        let mut blocks = vec![DVector::from_element(
            1,
            self.q[0].powi(2) + self.q[1].powi(2) - 1.0,
        )];
        if let Some(c) = self.driver {
            blocks.push(DVector::from_element(1, self.q[1] - c * self.t.powi(3)));
        }
        blocks
    }

    fn eval_vel_eq(&mut self) -> Vec<DVector<f64>> {
        let mut blocks = vec![DVector::zeros(1)];
        if let Some(c) = self.driver {
            blocks.push(DVector::from_element(1, -3.0 * c * self.t.powi(2)));
        }
        blocks
    }

    fn eval_acc_eq(&mut self) -> Vec<DVector<f64>> {
        let mut blocks = vec![DVector::from_element(
            1,
            2.0 * (self.qd[0].powi(2) + self.qd[1].powi(2)),
        )];
        if let Some(c) = self.driver {
            blocks.push(DVector::from_element(1, -6.0 * c * self.t));
        }
        blocks
    }

    fn eval_frc_eq(&mut self) -> Vec<DVector<f64>> {
        vec![DVector::from_vec(vec![0.0, -self.gravity])]
    }

    fn eval_jac_eq(&mut self) -> Vec<MatrixBlock> {
        let mut blocks = vec![MatrixBlock::row_vector(
            0,
            0,
            &[2.0 * self.q[0], 2.0 * self.q[1]],
        )];
        if self.driver.is_some() {
            blocks.push(MatrixBlock::row_vector(1, 1, &[1.0]));
        }
        blocks
    }

    fn eval_mass_eq(&mut self) -> Vec<DMatrix<f64>> {
        vec![DMatrix::identity(2, 2)]
    }
}

// ============================================================================
// Spatial body
// ============================================================================

/// A single spatial body `[x, y, z, e0, e1, e2, e3]`.
///
/// Constraint rows:
///
/// ```text
/// 0..3  ground   r − (0, 0, c·t²)
/// 3..6  lock     (e1, e2, e3)
/// 6     norm     pᵀp − 1
/// ```
///
/// A constant global torque `n` acts on the body on top of gravity.
#[derive(Debug, Clone)]
pub struct SpatialBody {
    /// Body mass.
    pub mass: f64,
    /// Principal moments of inertia.
    pub inertia: Vector3<f64>,
    /// Coefficient `c` of the lift `z = c·t²`.
    pub lift: f64,
    /// Applied global torque.
    pub torque: Vector3<f64>,
    t: f64,
    q: DVector<f64>,
    qd: DVector<f64>,
    lambda: DVector<f64>,
    reactions_evaluated: usize,
}

impl SpatialBody {
    /// Body of mass 2 lifted with `z = lift·t²` under `torque`.
    pub fn new(lift: f64, torque: Vector3<f64>) -> Self {
        let mut q = DVector::zeros(7);
        q[3] = 1.0;
        Self {
            mass: 2.0,
            inertia: Vector3::new(0.1, 0.2, 0.3),
            lift,
            torque,
            t: 0.0,
            q,
            qd: DVector::zeros(7),
            lambda: DVector::zeros(7),
            reactions_evaluated: 0,
        }
    }

    /// Multipliers last handed over by the solver.
    pub fn lambda(&self) -> &DVector<f64> {
        &self.lambda
    }

    /// Number of times the reaction hook ran.
    pub fn reactions_evaluated(&self) -> usize {
        self.reactions_evaluated
    }

    fn euler_parameters(&self) -> Vector4<f64> {
        Vector4::new(self.q[3], self.q[4], self.q[5], self.q[6])
    }
}

/// `G(p)`, mapping Euler parameter rates to body angular velocity.
fn body_rate_matrix(p: &Vector4<f64>) -> Matrix3x4<f64> {
    let (e0, e1, e2, e3) = (p[0], p[1], p[2], p[3]);
    Matrix3x4::new(
        -e1, e0, e3, -e2, //
        -e2, -e3, e0, e1, //
        -e3, e2, -e1, e0,
    )
}

impl MultibodyModel for SpatialBody {
    fn nrows(&self) -> usize {
        7
    }

    fn ncols(&self) -> usize {
        7
    }

    fn initial_coordinates(&self) -> DVector<f64> {
        DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
    }

    fn body_names(&self) -> Vec<String> {
        vec!["chassis".into()]
    }

    fn set_gen_coordinates(&mut self, q: &DVector<f64>) {
        self.q.copy_from(q);
    }

    fn set_gen_velocities(&mut self, qd: &DVector<f64>) {
        self.qd.copy_from(qd);
    }

    fn set_gen_accelerations(&mut self, _qdd: &DVector<f64>) {}

    fn set_time(&mut self, t: f64) {
        self.t = t;
    }

    fn set_lagrange_multipliers(&mut self, lambda: &DVector<f64>) {
        self.lambda.copy_from(lambda);
    }

    fn eval_pos_eq(&mut self) -> Vec<DVector<f64>> {
        let p = self.euler_parameters();
        vec![
            DVector::from_vec(vec![
                self.q[0],
                self.q[1],
                self.q[2] - self.lift * self.t * self.t,
            ]),
            DVector::from_vec(vec![p[1], p[2], p[3]]),
            DVector::from_element(1, p.norm_squared() - 1.0),
        ]
    }

    fn eval_vel_eq(&mut self) -> Vec<DVector<f64>> {
        vec![
            DVector::from_vec(vec![0.0, 0.0, -2.0 * self.lift * self.t]),
            DVector::zeros(3),
            DVector::zeros(1),
        ]
    }

    fn eval_acc_eq(&mut self) -> Vec<DVector<f64>> {
        let p_dot = self.qd.rows(3, 4);
        vec![
            DVector::from_vec(vec![0.0, 0.0, -2.0 * self.lift]),
            DVector::zeros(3),
            DVector::from_element(1, 2.0 * p_dot.norm_squared()),
        ]
    }

    fn eval_frc_eq(&mut self) -> Vec<DVector<f64>> {
        let p = self.euler_parameters();
        let q_p = 2.0 * euler_parameter_matrix(&p).transpose() * self.torque;
        vec![
            DVector::from_vec(vec![0.0, 0.0, -self.mass * GRAVITY]),
            DVector::from_column_slice(q_p.as_slice()),
        ]
    }

    fn eval_jac_eq(&mut self) -> Vec<MatrixBlock> {
        let p = self.euler_parameters();
        vec![
            MatrixBlock::new(0, 0, DMatrix::identity(3, 3)),
            MatrixBlock::new(3, 4, DMatrix::identity(3, 3)),
            MatrixBlock::row_vector(6, 3, &[2.0 * p[0], 2.0 * p[1], 2.0 * p[2], 2.0 * p[3]]),
        ]
    }

    fn eval_mass_eq(&mut self) -> Vec<DMatrix<f64>> {
        let g = body_rate_matrix(&self.euler_parameters());
        let rotational = 4.0 * g.transpose() * Matrix3::from_diagonal(&self.inertia) * g;

        let mut block = DMatrix::zeros(7, 7);
        block.view_mut((0, 0), (3, 3)).fill_diagonal(self.mass);
        block.view_mut((3, 3), (4, 4)).copy_from(&rotational);
        vec![block]
    }

    fn eval_reactions_eq(&mut self) {
        self.reactions_evaluated += 1;
    }

    fn reaction_sites(&self) -> Vec<ReactionSite> {
        vec![
            ReactionSite::new("ground", 0..3, 0),
            ReactionSite::new("lock", 3..7, 0),
        ]
    }
}

// ============================================================================
// Tilting line
// ============================================================================

/// Unit-mass particle held on the line `(1 − t)·x + t·y = 0`.
///
/// At `t = 0` only `x` appears in the constraint, so `x` is dependent and
/// `y` independent. At `t = 1` the constraint no longer involves `x`.
#[derive(Debug, Clone, Default)]
pub struct TiltingLine {
    t: f64,
    x: f64,
    y: f64,
    xd: f64,
    yd: f64,
}

impl MultibodyModel for TiltingLine {
    fn nrows(&self) -> usize {
        1
    }

    fn ncols(&self) -> usize {
        2
    }

    fn initial_coordinates(&self) -> DVector<f64> {
        DVector::zeros(2)
    }

    fn body_names(&self) -> Vec<String> {
        vec!["bead".into()]
    }

    fn coordinate_labels(&self) -> Vec<String> {
        vec!["bead.x".into(), "bead.y".into()]
    }

    fn set_gen_coordinates(&mut self, q: &DVector<f64>) {
        self.x = q[0];
        self.y = q[1];
    }

    fn set_gen_velocities(&mut self, qd: &DVector<f64>) {
        self.xd = qd[0];
        self.yd = qd[1];
    }

    fn set_gen_accelerations(&mut self, _qdd: &DVector<f64>) {}

    fn set_time(&mut self, t: f64) {
        self.t = t;
    }

    fn eval_pos_eq(&mut self) -> Vec<DVector<f64>> {
        vec![DVector::from_element(
            1,
            (1.0 - self.t) * self.x + self.t * self.y,
        )]
    }

    fn eval_vel_eq(&mut self) -> Vec<DVector<f64>> {
        vec![DVector::from_element(1, self.y - self.x)]
    }

    fn eval_acc_eq(&mut self) -> Vec<DVector<f64>> {
        vec![DVector::from_element(1, 2.0 * (self.yd - self.xd))]
    }

    fn eval_frc_eq(&mut self) -> Vec<DVector<f64>> {
        vec![DVector::zeros(2)]
    }

    fn eval_jac_eq(&mut self) -> Vec<MatrixBlock> {
        vec![MatrixBlock::row_vector(0, 0, &[1.0 - self.t, self.t])]
    }

    fn eval_mass_eq(&mut self) -> Vec<DMatrix<f64>> {
        vec![DMatrix::identity(2, 2)]
    }
}
