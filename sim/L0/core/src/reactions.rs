//! Joint reaction loads.
//!
//! The generalized reaction acting on a body through a joint is
//!
//! ```text
//! Q = −Jᵀ · λ
//! ```
//!
//! restricted to the joint's constraint rows and the body's seven
//! coordinates. The first three entries are the reaction force at the body
//! reference point. The last four are a generalized load on the Euler
//! parameters, mapped back to a global torque with
//!
//! ```text
//! n = ½ · E(p) · Q[3..7]
//! ```
//!
//! and moved to the joint location `u = A(p) · ū`:
//!
//! ```text
//! T = n − ũ · F
//! ```

use mbd_constraint::SparseMatrix;
use mbd_types::{Result, SolverError};
use nalgebra::{DVector, Matrix3, Matrix3x4, Quaternion, UnitQuaternion, Vector3, Vector4};

use crate::model::{ReactionSite, SPATIAL_BODY_COORDINATES};

/// Force and torque transmitted by a joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointReaction {
    /// Reaction force.
    pub force: Vector3<f64>,
    /// Reaction torque about the joint location.
    pub torque: Vector3<f64>,
}

/// Reactions of every site, for every stored step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReactionHistory {
    sites: Vec<String>,
    records: Vec<Vec<JointReaction>>,
}

impl ReactionHistory {
    /// Create an empty history for the named sites.
    #[must_use]
    pub fn new(sites: Vec<String>, steps: usize) -> Self {
        Self {
            sites,
            records: Vec::with_capacity(steps),
        }
    }

    /// Append the reactions of the next step, one per site.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::DimensionMismatch`] if the number of reactions
    /// differs from the number of sites.
    pub fn push(&mut self, reactions: Vec<JointReaction>) -> Result<()> {
        if reactions.len() != self.sites.len() {
            return Err(SolverError::dimension_mismatch(
                "joint reactions",
                self.sites.len(),
                reactions.len(),
            ));
        }
        self.records.push(reactions);
        Ok(())
    }

    /// Site names.
    #[must_use]
    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// Reactions at step `index`, in site order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[JointReaction]> {
        self.records.get(index).map(Vec::as_slice)
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

    /// Table column names: `F_<joint>.<x|y|z>` then `T_<joint>.<x|y|z>` for
    /// each site.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(6 * self.sites.len());
        for site in &self.sites {
            for prefix in ["F", "T"] {
                for axis in ["x", "y", "z"] {
                    names.push(format!("{prefix}_{site}.{axis}"));
                }
            }
        }
        names
    }

    /// Flattened values of step `index`, matching [`Self::column_names`].
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        let record = self.records.get(index)?;
        let mut row = Vec::with_capacity(6 * record.len());
        for reaction in record {
            row.extend(reaction.force.iter());
            row.extend(reaction.torque.iter());
        }
        Some(row)
    }
}

/// `E(p)`, mapping Euler parameter rates to global angular velocity
/// (`ω = 2·E·ṗ`).
#[must_use]
pub fn euler_parameter_matrix(p: &Vector4<f64>) -> Matrix3x4<f64> {
    let (e0, e1, e2, e3) = (p[0], p[1], p[2], p[3]);
    Matrix3x4::new(
        -e1, e0, -e3, e2, //
        -e2, e3, e0, -e1, //
        -e3, -e2, e1, e0,
    )
}

/// Rotation matrix `A(p)` of the Euler parameters `[e0, e1, e2, e3]`.
///
/// The parameters are normalized first.
#[must_use]
pub fn rotation_matrix(p: &Vector4<f64>) -> Matrix3<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(p[0], p[1], p[2], p[3]))
        .to_rotation_matrix()
        .into_inner()
}

/// Skew-symmetric matrix `ũ` with `ũ · b = u × b`.
#[must_use]
pub fn skew(u: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -u[2], u[1], u[2], 0.0, -u[0], -u[1], u[0], 0.0)
}

/// Check that a site fits a model with `nrows` constraints and `ncols`
/// coordinates.
pub fn validate_site(site: &ReactionSite, nrows: usize, ncols: usize) -> Result<()> {
    if site.rows.end > nrows || site.rows.start > site.rows.end {
        return Err(SolverError::dimension_mismatch(
            format!("constraint rows of joint {}", site.name),
            nrows,
            site.rows.end,
        ));
    }
    if site.body_column + SPATIAL_BODY_COORDINATES > ncols {
        return Err(SolverError::dimension_mismatch(
            format!("body coordinates of joint {}", site.name),
            ncols,
            site.body_column + SPATIAL_BODY_COORDINATES,
        ));
    }
    Ok(())
}

/// Reaction of one joint.
///
/// `jacobian` is the assembled constraint Jacobian, `lambda` the full
/// multiplier vector and `q` the generalized coordinates, all at the same
/// step.
///
/// # Errors
///
/// Returns [`SolverError::DimensionMismatch`] if `lambda` or `q` do not match
/// the Jacobian, or the site does not fit it.
pub fn joint_reaction(
    site: &ReactionSite,
    jacobian: &SparseMatrix,
    lambda: &DVector<f64>,
    q: &DVector<f64>,
) -> Result<JointReaction> {
    let (nrows, ncols) = (jacobian.nrows(), jacobian.ncols());
    if lambda.len() != nrows {
        return Err(SolverError::dimension_mismatch(
            "multipliers",
            nrows,
            lambda.len(),
        ));
    }
    if q.len() != ncols {
        return Err(SolverError::dimension_mismatch(
            "generalized coordinates",
            ncols,
            q.len(),
        ));
    }
    validate_site(site, nrows, ncols)?;

    let columns = site.body_column..site.body_column + SPATIAL_BODY_COORDINATES;
    let j_joint = jacobian.dense_block(site.rows.clone(), columns);
    let lambda_joint = lambda.rows(site.rows.start, site.rows.len());

    let generalized = -(j_joint.transpose() * lambda_joint);

    let force = Vector3::new(generalized[0], generalized[1], generalized[2]);
    let p_load = Vector4::new(generalized[3], generalized[4], generalized[5], generalized[6]);

    let p = Vector4::new(
        q[site.body_column + 3],
        q[site.body_column + 4],
        q[site.body_column + 5],
        q[site.body_column + 6],
    );

    let arm = rotation_matrix(&p) * site.local_arm;
    let torque = 0.5 * euler_parameter_matrix(&p) * p_load - skew(&arm) * force;

    Ok(JointReaction { force, torque })
}
