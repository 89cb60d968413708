//! Time array construction through the solver API.
//!
//! `set_time_array(duration, spacing)` reads `spacing` as a step size when
//! it is smaller than `duration` and as a point count otherwise.

use approx::assert_relative_eq;
use mbd_core::{DynamicSolver, KinematicSolver, SolverError, TimeGrid};

use crate::fixtures::{CircleParticle, GRAVITY};

#[test]
fn test_step_size_spacing() {
    let grid = TimeGrid::from_duration(2.0, 0.01).unwrap();

    assert_eq!(grid.len(), 200);
    assert_relative_eq!(grid.step_size(), 0.01, epsilon = 1e-15);
    for pair in grid.times().windows(2) {
        assert_relative_eq!(pair[1] - pair[0], 0.01, epsilon = 1e-12);
    }
    assert_eq!(grid.get(0), Some(0.0));
    assert!(grid.end() < 2.0);
}

#[test]
fn test_point_count_spacing() {
    let grid = TimeGrid::from_duration(2.0, 250.0).unwrap();

    assert_eq!(grid.len(), 250);
    assert_eq!(grid.get(0), Some(0.0));
    assert_eq!(grid.end(), 2.0);
    assert_relative_eq!(grid.step_size(), 2.0 / 249.0, epsilon = 1e-15);
}

#[test]
fn test_duration_equal_to_spacing_rejected() {
    let err = TimeGrid::from_duration(1.0, 1.0).unwrap_err();
    assert!(matches!(err, SolverError::InvalidTimeGrid { .. }));
    assert!(err.is_config_error());
}

#[test]
fn test_solver_rejects_bad_time_array_before_stepping() {
    let mut solver = KinematicSolver::new(CircleParticle::driven(GRAVITY, 0.1));
    solver.set_time_array(1.0, 0.1).unwrap();
    solver.solve().unwrap();

    // A rejected array keeps the previous grid and results.
    let err = solver.set_time_array(1.0, 1.0).unwrap_err();
    assert!(matches!(err, SolverError::InvalidTimeGrid { .. }));
    assert_eq!(solver.time_grid().unwrap().len(), 10);
    assert!(solver.history().is_some());

    assert!(solver.set_time_array(f64::NAN, 0.1).is_err());
    assert!(solver.set_time_array(1.0, -0.1).is_err());
}

#[test]
fn test_history_length_follows_point_count() {
    let mut solver = DynamicSolver::new(CircleParticle::free(0.0));
    solver.set_time_array(0.5, 26.0).unwrap();
    solver.solve().unwrap();

    let history = solver.history().unwrap();
    assert_eq!(history.len(), 26);
    assert!(history.is_complete());

    let pos = solver.pos_table().unwrap();
    assert_relative_eq!(*pos.time().last().unwrap(), 0.5, epsilon = 1e-15);
}
