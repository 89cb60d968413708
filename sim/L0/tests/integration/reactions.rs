//! Joint reaction integration tests.
//!
//! The spatial body fixture is lifted along `z = c·t²` against gravity by
//! its "ground" joint while its "lock" joint holds the orientation against
//! an applied torque. The expected reactions follow from statics:
//!
//! ```text
//! F_ground = (0, 0, m·(g + 2c))     T_ground = 0
//! F_lock   = 0                       T_lock   = −n
//! ```

use approx::assert_relative_eq;
use mbd_core::{
    DynamicSolver, KinematicSolver, MatrixBlock, MultibodyModel, ReactionSite, SolverError,
    TIME_COLUMN,
};
use nalgebra::{DMatrix, DVector, Vector3};

use crate::fixtures::{GRAVITY, SpatialBody};

const LIFT: f64 = 0.5;

fn applied_torque() -> Vector3<f64> {
    Vector3::new(0.3, -1.2, 2.0)
}

fn expected_ground_force(body: &SpatialBody) -> f64 {
    body.mass * (GRAVITY + 2.0 * LIFT)
}

#[test]
fn test_reactions_table_columns() {
    let mut solver = KinematicSolver::new(SpatialBody::new(LIFT, applied_torque()));
    solver.set_time_array(1.0, 0.1).unwrap();
    solver.solve().unwrap();
    solver.eval_reactions().unwrap();

    let table = solver.reactions_table().unwrap();
    let header: Vec<&str> = table.header().collect();
    assert_eq!(
        header,
        vec![
            "F_ground.x",
            "F_ground.y",
            "F_ground.z",
            "T_ground.x",
            "T_ground.y",
            "T_ground.z",
            "F_lock.x",
            "F_lock.y",
            "F_lock.z",
            "T_lock.x",
            "T_lock.y",
            "T_lock.z",
            TIME_COLUMN,
        ]
    );
    assert_eq!(table.len(), 10);
    assert_eq!(table.time(), solver.time_grid().unwrap().times());
}

#[test]
fn test_kinematic_reactions_match_statics() {
    let mut solver = KinematicSolver::new(SpatialBody::new(LIFT, applied_torque()));
    solver.set_time_array(1.0, 0.1).unwrap();
    solver.solve().unwrap();
    solver.eval_reactions().unwrap();

    let f_ground = expected_ground_force(solver.model());
    let reactions = solver.reactions().unwrap();
    assert_eq!(reactions.sites(), &["ground".to_string(), "lock".to_string()]);

    for step in 0..reactions.len() {
        let [ground, lock] = reactions.get(step).unwrap() else {
            panic!("expected two sites");
        };
        assert_relative_eq!(ground.force, Vector3::new(0.0, 0.0, f_ground), epsilon = 1e-9);
        assert_relative_eq!(ground.torque, Vector3::zeros(), epsilon = 1e-9);
        assert_relative_eq!(lock.force, Vector3::zeros(), epsilon = 1e-9);
        assert_relative_eq!(lock.torque, -applied_torque(), epsilon = 1e-9);
    }

    // Every stored step was restored on the model, multipliers included.
    let model = solver.model();
    assert_eq!(model.reactions_evaluated(), reactions.len());
    let last = solver.history().unwrap().last().unwrap();
    assert_eq!(model.lambda(), &last.lambda);
}

#[test]
fn test_dynamic_reactions_match_kinematic() {
    let mut kinematic = KinematicSolver::new(SpatialBody::new(LIFT, applied_torque()));
    kinematic.set_time_array(1.0, 0.1).unwrap();
    kinematic.solve().unwrap();
    kinematic.eval_reactions().unwrap();

    let mut dynamic = DynamicSolver::new(SpatialBody::new(LIFT, applied_torque()));
    dynamic.set_time_array(1.0, 0.1).unwrap();
    dynamic.solve().unwrap();
    dynamic.eval_reactions().unwrap();

    let k = kinematic.reactions_table().unwrap();
    let d = dynamic.reactions_table().unwrap();
    for name in k.column_names() {
        let (kc, dc) = (k.column(name).unwrap(), d.column(name).unwrap());
        for (&a, &b) in kc.iter().zip(dc) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_reactions_require_a_run() {
    let mut solver = KinematicSolver::new(SpatialBody::new(LIFT, applied_torque()));
    assert!(matches!(
        solver.eval_reactions(),
        Err(SolverError::NoResults { .. })
    ));

    solver.set_time_array(1.0, 0.1).unwrap();
    solver.solve().unwrap();
    assert!(matches!(
        solver.reactions_table(),
        Err(SolverError::NoResults { .. })
    ));
}

#[test]
fn test_site_outside_model_rejected() {
    /// Declares a site whose rows run past the constraint count.
    struct Misdeclared(SpatialBody);

    impl MultibodyModel for Misdeclared {
        fn nrows(&self) -> usize {
            self.0.nrows()
        }
        fn ncols(&self) -> usize {
            self.0.ncols()
        }
        fn initial_coordinates(&self) -> DVector<f64> {
            self.0.initial_coordinates()
        }
        fn body_names(&self) -> Vec<String> {
            self.0.body_names()
        }
        fn set_gen_coordinates(&mut self, q: &DVector<f64>) {
            self.0.set_gen_coordinates(q);
        }
        fn set_gen_velocities(&mut self, qd: &DVector<f64>) {
            self.0.set_gen_velocities(qd);
        }
        fn set_gen_accelerations(&mut self, qdd: &DVector<f64>) {
            self.0.set_gen_accelerations(qdd);
        }
        fn set_time(&mut self, t: f64) {
            self.0.set_time(t);
        }
        fn eval_pos_eq(&mut self) -> Vec<DVector<f64>> {
            self.0.eval_pos_eq()
        }
        fn eval_vel_eq(&mut self) -> Vec<DVector<f64>> {
            self.0.eval_vel_eq()
        }
        fn eval_acc_eq(&mut self) -> Vec<DVector<f64>> {
            self.0.eval_acc_eq()
        }
        fn eval_frc_eq(&mut self) -> Vec<DVector<f64>> {
            self.0.eval_frc_eq()
        }
        fn eval_jac_eq(&mut self) -> Vec<MatrixBlock> {
            self.0.eval_jac_eq()
        }
        fn eval_mass_eq(&mut self) -> Vec<DMatrix<f64>> {
            self.0.eval_mass_eq()
        }
        fn reaction_sites(&self) -> Vec<ReactionSite> {
            vec![ReactionSite::new("phantom", 5..9, 0)]
        }
    }

    let mut solver = KinematicSolver::new(Misdeclared(SpatialBody::new(LIFT, applied_torque())));
    solver.set_time_array(1.0, 0.1).unwrap();
    solver.solve().unwrap();

    assert!(matches!(
        solver.eval_reactions(),
        Err(SolverError::DimensionMismatch { .. })
    ));
    assert!(solver.reactions().is_none());
}
