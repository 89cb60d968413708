//! Configuration types for multibody analysis.
//!
//! This module provides configuration types that control how an analysis
//! runs: Newton-Raphson tolerances, the Jacobian refresh policy and the
//! adaptive integrator used by dynamic analysis.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a kinematic or dynamic analysis.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisConfig {
    /// Position correction settings.
    pub newton: NewtonConfig,
    /// Integrator settings (dynamic analysis only).
    pub integrator: IntegratorConfig,
}

impl AnalysisConfig {
    /// Tight tolerances for reference runs.
    #[must_use]
    pub fn precise() -> Self {
        Self {
            newton: NewtonConfig::precise(),
            integrator: IntegratorConfig::precise(),
        }
    }

    /// Loose tolerances for quick previews.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            newton: NewtonConfig::default(),
            integrator: IntegratorConfig::fast(),
        }
    }

    /// Set the Newton-Raphson configuration.
    #[must_use]
    pub fn newton(mut self, newton: NewtonConfig) -> Self {
        self.newton = newton;
        self
    }

    /// Set the integrator configuration.
    #[must_use]
    pub fn integrator(mut self, integrator: IntegratorConfig) -> Self {
        self.integrator = integrator;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        self.newton.validate()?;
        self.integrator.validate()
    }
}

/// Configuration for the Newton-Raphson position corrector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewtonConfig {
    /// Iteration stops once the correction norm `‖Δq‖` falls to this value.
    pub tolerance: f64,

    /// Iteration count after which the corrector gives up and returns its
    /// last guess. Exceeding it is reported, not fatal.
    pub max_iterations: usize,

    /// The Jacobian is re-evaluated on every iteration that is a non-zero
    /// multiple of this period and reused in between.
    pub jacobian_refresh: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 50,
            jacobian_refresh: 5,
        }
    }
}

impl NewtonConfig {
    /// Tighter tolerance with a Jacobian refresh on every other iteration.
    #[must_use]
    pub fn precise() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 100,
            jacobian_refresh: 2,
        }
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the Jacobian refresh period.
    #[must_use]
    pub const fn with_jacobian_refresh(mut self, period: usize) -> Self {
        self.jacobian_refresh = period;
        self
    }

    /// Validate the Newton configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(crate::SolverError::invalid_config(
                "newton tolerance must be positive and finite",
            ));
        }

        if self.max_iterations == 0 {
            return Err(crate::SolverError::invalid_config(
                "newton max_iterations must be at least 1",
            ));
        }

        if self.jacobian_refresh == 0 {
            return Err(crate::SolverError::invalid_config(
                "jacobian_refresh must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Adaptive integration scheme for the reduced equations of motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntegrationMethod {
    /// Linearly implicit Rosenbrock 2(3) pair. L-stable, suited to stiff
    /// suspensions with large spring rates.
    #[default]
    Rosenbrock23,
    /// Explicit Dormand–Prince 5(4) pair for non-stiff systems.
    DormandPrince45,
}

impl IntegrationMethod {
    /// Order of the error estimator, used by the step size controller.
    #[must_use]
    pub const fn error_order(self) -> usize {
        match self {
            Self::Rosenbrock23 => 2,
            Self::DormandPrince45 => 4,
        }
    }
}

/// Configuration for the adaptive integrator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntegratorConfig {
    /// Integration scheme.
    pub method: IntegrationMethod,
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Initial step size. `None` picks one from the first output interval.
    pub initial_step: Option<f64>,
    /// Smallest step size before the integrator reports failure.
    pub min_step: f64,
    /// Largest step size. `None` leaves it unbounded.
    pub max_step: Option<f64>,
    /// Maximum number of internal steps per output interval.
    pub max_steps: usize,
    /// Safety factor applied to the optimal step size.
    pub safety: f64,
    /// Smallest allowed step size ratio between consecutive steps.
    pub min_factor: f64,
    /// Largest allowed step size ratio between consecutive steps.
    pub max_factor: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::default(),
            rtol: 1e-6,
            atol: 1e-9,
            initial_step: None,
            min_step: 1e-12,
            max_step: None,
            max_steps: 10_000,
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 5.0,
        }
    }
}

impl IntegratorConfig {
    /// High-accuracy configuration.
    #[must_use]
    pub fn precise() -> Self {
        Self {
            rtol: 1e-9,
            atol: 1e-12,
            max_steps: 100_000,
            ..Default::default()
        }
    }

    /// Loose tolerances for fast previews.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            rtol: 1e-4,
            atol: 1e-6,
            ..Default::default()
        }
    }

    /// Set the integration method.
    #[must_use]
    pub fn method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    /// Set relative and absolute tolerances.
    #[must_use]
    pub fn tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Set the maximum step size.
    #[must_use]
    pub fn max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    /// Set the maximum number of internal steps per output interval.
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Validate the integrator configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.rtol.is_nan() || self.atol.is_nan() || self.rtol <= 0.0 || self.atol <= 0.0 {
            return Err(crate::SolverError::invalid_config(
                "integrator tolerances must be positive",
            ));
        }

        if self.min_step.is_nan() || self.min_step <= 0.0 {
            return Err(crate::SolverError::invalid_config(
                "min_step must be positive",
            ));
        }

        if let Some(h0) = self.initial_step {
            if !h0.is_finite() || h0 <= 0.0 {
                return Err(crate::SolverError::invalid_config(
                    "initial_step must be positive and finite",
                ));
            }
        }

        if let Some(h_max) = self.max_step {
            if h_max < self.min_step {
                return Err(crate::SolverError::invalid_config(
                    "max_step cannot be smaller than min_step",
                ));
            }
        }

        if self.max_steps == 0 {
            return Err(crate::SolverError::invalid_config(
                "max_steps must be at least 1",
            ));
        }

        if !(self.safety > 0.0 && self.safety <= 1.0) {
            return Err(crate::SolverError::invalid_config(
                "safety factor must be in (0, 1]",
            ));
        }

        if !(self.min_factor > 0.0 && self.min_factor < 1.0 && self.max_factor > 1.0) {
            return Err(crate::SolverError::invalid_config(
                "step factors must satisfy 0 < min_factor < 1 < max_factor",
            ));
        }

        Ok(())
    }
}
