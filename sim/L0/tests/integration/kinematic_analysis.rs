//! Kinematic analysis integration tests.
//!
//! These tests run fully constrained models through [`KinematicSolver`]:
//! - Rest state of the circle particle
//! - Driven motion against closed-form positions, velocities and
//!   accelerations
//! - Newton-Raphson convergence of every stored step
//! - Determinism of repeated runs
//! - Non-convergence reported without aborting the run

use approx::assert_relative_eq;
use mbd_core::{AnalysisConfig, KinematicSolver, ModelSystem, NewtonConfig, SolverError};

use crate::fixtures::{CircleParticle, GRAVITY, POSITION_TOL};

fn driven_circle_solver(c: f64, duration: f64, spacing: f64) -> KinematicSolver<CircleParticle> {
    let mut solver = KinematicSolver::new(CircleParticle::driven(GRAVITY, c));
    solver
        .set_time_array(duration, spacing)
        .expect("valid time array");
    solver
}

// ============================================================================
// Circle particle at rest
// ============================================================================

#[test]
fn test_circle_at_rest() {
    let mut solver = driven_circle_solver(0.0, 1.0, 0.1);
    solver.solve().expect("solve should succeed");

    let vel = solver.vel_table().expect("velocity table");
    let acc = solver.acc_table().expect("acceleration table");

    // Equilibrium at t = 0 and for the whole run.
    for row in 0..vel.len() {
        for name in ["particle.x", "particle.y"] {
            assert_relative_eq!(vel.value(row, name).unwrap(), 0.0, epsilon = 1e-12);
            assert_relative_eq!(acc.value(row, name).unwrap(), 0.0, epsilon = 1e-12);
        }
    }

    // The driver carries the weight: Jᵀ·λ = Q with J = [[2, 0], [0, 1]].
    let history = solver.history().expect("history");
    for record in history {
        assert_relative_eq!(record.lambda[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(record.lambda[1], -GRAVITY, epsilon = 1e-12);
    }
}

#[test]
fn test_underconstrained_model_rejected() {
    let mut solver = KinematicSolver::new(CircleParticle::free(GRAVITY));
    solver.set_time_array(1.0, 0.1).expect("valid time array");

    let err = solver.solve().unwrap_err();
    assert!(matches!(
        err,
        SolverError::DofMismatch {
            analysis: "kinematic",
            nrows: 1,
            ncols: 2,
            ..
        }
    ));
    assert!(solver.history().is_none());
}

// ============================================================================
// Driven motion
// ============================================================================

#[test]
fn test_driven_circle_matches_closed_form() {
    let c = 0.1;
    let mut solver = driven_circle_solver(c, 2.0, 0.01);
    solver.solve().expect("solve should succeed");

    let pos = solver.pos_table().expect("position table");
    let vel = solver.vel_table().expect("velocity table");
    let acc = solver.acc_table().expect("acceleration table");
    assert_eq!(pos.len(), 200);

    for row in 0..pos.len() {
        let t = pos.time()[row];
        let y = c * t.powi(3);
        let yd = 3.0 * c * t.powi(2);
        let ydd = 6.0 * c * t;
        let x = (1.0 - y * y).sqrt();
        let xd = -y * yd / x;
        let xdd = -(xd * xd + yd * yd + y * ydd) / x;

        assert_relative_eq!(pos.value(row, "particle.y").unwrap(), y, epsilon = 1e-8);
        assert_relative_eq!(pos.value(row, "particle.x").unwrap(), x, epsilon = 1e-8);
        assert_relative_eq!(vel.value(row, "particle.y").unwrap(), yd, epsilon = 1e-8);
        assert_relative_eq!(vel.value(row, "particle.x").unwrap(), xd, epsilon = 1e-6);
        assert_relative_eq!(acc.value(row, "particle.y").unwrap(), ydd, epsilon = 1e-8);
        assert_relative_eq!(acc.value(row, "particle.x").unwrap(), xdd, epsilon = 1e-6);
    }
}

#[test]
fn test_every_step_satisfies_position_constraints() {
    let mut solver = driven_circle_solver(0.1, 2.0, 0.05);
    solver.solve().expect("solve should succeed");
    assert!(solver.non_converged_steps().is_empty());

    let grid = solver.time_grid().expect("time grid").clone();
    let history = solver.history().expect("history").clone();

    let mut system = ModelSystem::new(solver.model_mut());
    for (record, &t) in history.iter().zip(grid.times()) {
        system.restore_state(t, &record.q, &record.qd, &record.qdd, &record.lambda);
        let residual = system.position_residual().expect("residual");
        assert!(
            residual.norm() < POSITION_TOL,
            "‖Φ‖ = {} at t = {t}",
            residual.norm()
        );
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let mut solver = driven_circle_solver(0.1, 1.0, 0.01);

    solver.solve().expect("first run");
    let first = (
        solver.pos_table().unwrap(),
        solver.vel_table().unwrap(),
        solver.acc_table().unwrap(),
    );

    solver.solve().expect("second run");
    let second = (
        solver.pos_table().unwrap(),
        solver.vel_table().unwrap(),
        solver.acc_table().unwrap(),
    );

    assert_eq!(first, second);

    let mut fresh = driven_circle_solver(0.1, 1.0, 0.01);
    fresh.solve().expect("fresh run");
    assert_eq!(fresh.pos_table().unwrap(), first.0);
}

// ============================================================================
// Newton-Raphson non-convergence
// ============================================================================

#[test]
fn test_non_convergence_is_reported_not_fatal() {
    let newton = NewtonConfig::default()
        .with_tolerance(1e-300)
        .with_max_iterations(1);
    let config = AnalysisConfig::default().newton(newton);

    let mut solver = KinematicSolver::with_config(CircleParticle::driven(GRAVITY, 0.1), config);
    solver.set_time_array(1.0, 0.1).expect("valid time array");
    solver.solve().expect("non-convergence must not abort the run");

    let history = solver.history().expect("history");
    assert_eq!(history.len(), 10);

    // The exact initial configuration needs no correction.
    let skipped = solver.non_converged_steps();
    assert!(!skipped.contains(&0));
    assert!(!skipped.is_empty());
    assert_eq!(skipped, history.non_converged_steps());

    // A single iteration from a good guess stays close to the constraint.
    let last = history.last().expect("last step");
    let radius = last.q.norm();
    assert_relative_eq!(radius, 1.0, epsilon = 1e-3);
}
