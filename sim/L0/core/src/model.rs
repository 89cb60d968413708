//! The model adapter interface.
//!
//! A [`MultibodyModel`] is the only way the drivers see a mechanical system.
//! Models are normally generated from a symbolic description of the
//! assembly; the drivers never look inside them. All state changes go
//! through the `set_*` mutators, and the `eval_*` evaluators are pure
//! functions of the state last set.
//!
//! # Coordinate Layout
//!
//! Spatial bodies contribute seven consecutive coordinates each:
//!
//! ```text
//! [x, y, z, e0, e1, e2, e3]
//! ```
//!
//! the reference point position followed by the Euler parameters of the body
//! orientation. Models that are not made of spatial bodies override
//! [`MultibodyModel::coordinate_labels`].

use std::ops::Range;

use mbd_constraint::MatrixBlock;
use nalgebra::{DMatrix, DVector, Vector3};

/// Suffixes of the seven coordinates of a spatial body.
pub const SPATIAL_COORDINATES: [&str; 7] = ["x", "y", "z", "e0", "e1", "e2", "e3"];

/// Number of generalized coordinates of a spatial body.
pub const SPATIAL_BODY_COORDINATES: usize = 7;

/// A joint whose reaction loads are reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionSite {
    /// Joint name. Reaction columns are named `F_<name>` and `T_<name>`.
    pub name: String,
    /// Constraint rows owned by the joint.
    pub rows: Range<usize>,
    /// First generalized coordinate of the body the load acts on.
    pub body_column: usize,
    /// Joint location in the body frame, relative to the body reference point.
    pub local_arm: Vector3<f64>,
}

impl ReactionSite {
    /// Create a site acting at the body reference point.
    #[must_use]
    pub fn new(name: impl Into<String>, rows: Range<usize>, body_column: usize) -> Self {
        Self {
            name: name.into(),
            rows,
            body_column,
            local_arm: Vector3::zeros(),
        }
    }

    /// Set the joint location in the body frame.
    #[must_use]
    pub fn with_local_arm(mut self, arm: Vector3<f64>) -> Self {
        self.local_arm = arm;
        self
    }
}

/// A constrained multibody system, as seen by the analysis drivers.
///
/// Vector evaluators return ordered blocks that are concatenated into the
/// equation vector. The Jacobian evaluator returns blocks placed at scalar
/// `(row, col)` offsets; the mass evaluator returns square blocks placed
/// consecutively along the diagonal.
pub trait MultibodyModel {
    /// Number of scalar constraint equations.
    fn nrows(&self) -> usize;

    /// Number of generalized coordinates.
    fn ncols(&self) -> usize;

    /// Initial generalized coordinates `q0`.
    fn initial_coordinates(&self) -> DVector<f64>;

    /// Initial generalized velocities. Only the independent entries are used
    /// by dynamic analysis.
    fn initial_velocities(&self) -> DVector<f64> {
        DVector::zeros(self.ncols())
    }

    /// Body names, in coordinate order.
    fn body_names(&self) -> Vec<String>;

    /// One label per generalized coordinate, `<body>.<x|y|z|e0|e1|e2|e3>`.
    fn coordinate_labels(&self) -> Vec<String> {
        self.body_names()
            .iter()
            .flat_map(|body| {
                SPATIAL_COORDINATES
                    .iter()
                    .map(move |suffix| format!("{body}.{suffix}"))
            })
            .collect()
    }

    /// Set the generalized coordinates.
    fn set_gen_coordinates(&mut self, q: &DVector<f64>);

    /// Set the generalized velocities.
    fn set_gen_velocities(&mut self, qd: &DVector<f64>);

    /// Set the generalized accelerations.
    fn set_gen_accelerations(&mut self, qdd: &DVector<f64>);

    /// Set the simulation time.
    fn set_time(&mut self, t: f64);

    /// Set the Lagrange multipliers.
    fn set_lagrange_multipliers(&mut self, _lambda: &DVector<f64>) {}

    /// Position constraint residual blocks `Φ(q, t)`.
    fn eval_pos_eq(&mut self) -> Vec<DVector<f64>>;

    /// Velocity right-hand side blocks `ν`.
    fn eval_vel_eq(&mut self) -> Vec<DVector<f64>>;

    /// Acceleration right-hand side blocks `γ`.
    fn eval_acc_eq(&mut self) -> Vec<DVector<f64>>;

    /// Applied generalized force blocks.
    fn eval_frc_eq(&mut self) -> Vec<DVector<f64>>;

    /// Constraint Jacobian blocks.
    fn eval_jac_eq(&mut self) -> Vec<MatrixBlock>;

    /// Diagonal mass matrix blocks.
    fn eval_mass_eq(&mut self) -> Vec<DMatrix<f64>>;

    /// Refresh any model-side reaction state from the current multipliers.
    fn eval_reactions_eq(&mut self) {}

    /// Joints whose reactions are reported.
    fn reaction_sites(&self) -> Vec<ReactionSite> {
        Vec::new()
    }
}
