//! Adaptive ODE integration.
//!
//! Dynamic analysis integrates the reduced equations of motion of the
//! independent coordinates between output times. Two embedded pairs are
//! available, selected by [`IntegrationMethod`]:
//!
//! - **Rosenbrock 2(3)**: Linearly implicit, L-stable. One LU factorization of
//!   `W = I − h·d·J` per step. The default, since suspension models tend to
//!   be stiff.
//! - **Dormand–Prince 5(4)**: Explicit, for non-stiff systems.
//!
//! # Step Size Control
//!
//! The local error estimate is measured in the weighted RMS norm
//!
//! ```text
//! ‖e‖ = sqrt( mean( (eᵢ / (atol + rtol·max(|yᵢ|, |ŷᵢ|)))² ) )
//! ```
//!
//! A step is accepted when `‖e‖ ≤ 1`. The next step size is
//! `h · clamp(safety · ‖e‖^(−1/(p+1)), min_factor, max_factor)` where `p` is
//! the order of the error estimate. Steps are clamped so the integrator
//! lands exactly on the requested output time.

use mbd_types::{IntegrationMethod, IntegratorConfig, Result, SolveStage, SolverError};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// A first-order system `y' = f(t, y)`.
pub trait OdeSystem {
    /// Evaluate `f(t, y)`.
    fn derivative(&mut self, t: f64, y: &DVector<f64>) -> Result<DVector<f64>>;
}

impl<F> OdeSystem for F
where
    F: FnMut(f64, &DVector<f64>) -> Result<DVector<f64>>,
{
    fn derivative(&mut self, t: f64, y: &DVector<f64>) -> Result<DVector<f64>> {
        self(t, y)
    }
}

/// Counters accumulated over the life of an integrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegratorStats {
    /// Accepted steps.
    pub accepted: usize,
    /// Rejected steps.
    pub rejected: usize,
    /// Right-hand side evaluations, including finite differences.
    pub evaluations: usize,
}

/// Step-adaptive integrator carrying its state between output times.
#[derive(Debug, Clone)]
pub struct AdaptiveIntegrator {
    config: IntegratorConfig,
    t: f64,
    y: DVector<f64>,
    /// Step size proposed for the next step.
    h: Option<f64>,
    stats: IntegratorStats,
}

impl AdaptiveIntegrator {
    /// Create an integrator at `(t0, y0)`.
    #[must_use]
    pub fn new(config: IntegratorConfig, t0: f64, y0: DVector<f64>) -> Self {
        let h = config.initial_step;
        Self {
            config,
            t: t0,
            y: y0,
            h,
            stats: IntegratorStats::default(),
        }
    }

    /// Current time.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.t
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &DVector<f64> {
        &self.y
    }

    /// Accumulated counters.
    #[must_use]
    pub const fn stats(&self) -> IntegratorStats {
        self.stats
    }

    /// Advance the state to `t_end`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::IntegrationFailed`] carrying the last accepted
    /// time if `t_end` lies in the past, the step size underflows
    /// [`IntegratorConfig::min_step`], or more than
    /// [`IntegratorConfig::max_steps`] steps are needed. Errors raised by
    /// `system` are propagated unchanged.
    pub fn integrate_to<S>(&mut self, system: &mut S, t_end: f64) -> Result<()>
    where
        S: OdeSystem + ?Sized,
    {
        if t_end < self.t {
            return Err(SolverError::integration_failed(
                self.t,
                format!("cannot integrate backwards to t = {t_end}"),
            ));
        }
        if t_end == self.t {
            return Ok(());
        }

        let max_step = self.config.max_step.unwrap_or(f64::INFINITY);
        let exponent = -1.0 / (self.config.method.error_order() as f64 + 1.0);
        let mut h = self
            .h
            .unwrap_or_else(|| 0.01 * (t_end - self.t))
            .min(max_step);
        let mut steps = 0;

        while self.t < t_end {
            if steps >= self.config.max_steps {
                return Err(SolverError::integration_failed(
                    self.t,
                    format!("exceeded {} steps", self.config.max_steps),
                ));
            }
            steps += 1;

            let remaining = t_end - self.t;
            let last = h >= remaining || self.t + h >= t_end;
            let h_try = if last { remaining } else { h };

            let (y_new, error) = match self.config.method {
                IntegrationMethod::Rosenbrock23 => self.rosenbrock23(system, h_try)?,
                IntegrationMethod::DormandPrince45 => self.dormand_prince45(system, h_try)?,
            };
            let err = self.error_norm(&error, &y_new);

            if err <= 1.0 {
                self.t = if last { t_end } else { self.t + h_try };
                self.y = y_new;
                self.stats.accepted += 1;

                let factor = if err == 0.0 {
                    self.config.max_factor
                } else {
                    (self.config.safety * err.powf(exponent))
                        .clamp(self.config.min_factor, self.config.max_factor)
                };
                let proposed = h_try * factor;
                // A step shortened to hit t_end says nothing against the
                // step size used before it.
                h = if last { proposed.max(h) } else { proposed };
                trace!(t = self.t, h_try, err, "integrator step accepted");
            } else {
                self.stats.rejected += 1;
                let factor = if err.is_finite() {
                    (self.config.safety * err.powf(exponent)).clamp(self.config.min_factor, 1.0)
                } else {
                    self.config.min_factor
                };
                h = h_try * factor;
                trace!(t = self.t, h_try, err, "integrator step rejected");

                if h < self.config.min_step {
                    return Err(SolverError::integration_failed(
                        self.t,
                        format!("step size {h:e} fell below the minimum"),
                    ));
                }
            }

            h = h.min(max_step);
        }

        self.h = Some(h);
        Ok(())
    }

    /// Weighted RMS norm of the local error estimate.
    fn error_norm(&self, error: &DVector<f64>, y_new: &DVector<f64>) -> f64 {
        if error.is_empty() {
            return 0.0;
        }
        let sum: f64 = error
            .iter()
            .zip(self.y.iter().zip(y_new.iter()))
            .map(|(e, (y0, y1))| {
                let scale = self.config.atol + self.config.rtol * y0.abs().max(y1.abs());
                (e / scale).powi(2)
            })
            .sum();
        let norm = (sum / error.len() as f64).sqrt();
        if norm.is_nan() {
            f64::INFINITY
        } else {
            norm
        }
    }

    fn eval<S: OdeSystem + ?Sized>(
        &mut self,
        system: &mut S,
        t: f64,
        y: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        self.stats.evaluations += 1;
        system.derivative(t, y)
    }

    // ========================================================================
    // Rosenbrock 2(3)
    // ========================================================================

    /// One step of the Shampine–Reichelt Rosenbrock pair. Returns the new
    /// state and the local error estimate.
    fn rosenbrock23<S: OdeSystem + ?Sized>(
        &mut self,
        system: &mut S,
        h: f64,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let d = 1.0 / (2.0 + std::f64::consts::SQRT_2);
        let e32 = 6.0 + std::f64::consts::SQRT_2;

        let t = self.t;
        let y = self.y.clone();
        let n = y.len();

        let f0 = self.eval(system, t, &y)?;
        let (jacobian, dfdt) = self.finite_difference_jacobian(system, t, &y, &f0)?;

        let w = DMatrix::identity(n, n) - jacobian * (h * d);
        let lu = w.lu();
        let solve = |rhs: DVector<f64>| {
            lu.solve(&rhs).ok_or_else(|| {
                SolverError::singular(SolveStage::Integrator, "W = I - h*d*J is singular")
            })
        };

        let hd_t = &dfdt * (h * d);
        let k1 = solve(&f0 + &hd_t)?;

        let f1 = self.eval(system, t + 0.5 * h, &(&y + &k1 * (0.5 * h)))?;
        let k2 = solve(&f1 - &k1)? + &k1;

        let y_new = &y + &k2 * h;
        let f2 = self.eval(system, t + h, &y_new)?;

        let k3 = solve(&f2 - (&k2 - &f1) * e32 - (&k1 - &f0) * 2.0 + &hd_t)?;

        let error = (&k1 - &k2 * 2.0 + &k3) * (h / 6.0);
        Ok((y_new, error))
    }

    /// Forward-difference `∂f/∂y` and `∂f/∂t`.
    fn finite_difference_jacobian<S: OdeSystem + ?Sized>(
        &mut self,
        system: &mut S,
        t: f64,
        y: &DVector<f64>,
        f0: &DVector<f64>,
    ) -> Result<(DMatrix<f64>, DVector<f64>)> {
        let sqrt_eps = f64::EPSILON.sqrt();
        let n = y.len();
        let mut jacobian = DMatrix::zeros(n, n);

        let mut perturbed = y.clone();
        for j in 0..n {
            let delta = sqrt_eps * y[j].abs().max(1.0);
            perturbed[j] = y[j] + delta;
            let fj = self.eval(system, t, &perturbed)?;
            jacobian.set_column(j, &((fj - f0) / delta));
            perturbed[j] = y[j];
        }

        let dt = sqrt_eps * t.abs().max(1.0);
        let ft = self.eval(system, t + dt, y)?;
        let dfdt = (ft - f0) / dt;

        Ok((jacobian, dfdt))
    }

    // ========================================================================
    // Dormand–Prince 5(4)
    // ========================================================================

    /// One step of the Dormand–Prince pair. Returns the fifth order solution
    /// and the difference to the embedded fourth order solution.
    fn dormand_prince45<S: OdeSystem + ?Sized>(
        &mut self,
        system: &mut S,
        h: f64,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        const C: [f64; 6] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
        const A: [[f64; 6]; 6] = [
            [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
            [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
            [
                19372.0 / 6561.0,
                -25360.0 / 2187.0,
                64448.0 / 6561.0,
                -212.0 / 729.0,
                0.0,
                0.0,
            ],
            [
                9017.0 / 3168.0,
                -355.0 / 33.0,
                46732.0 / 5247.0,
                49.0 / 176.0,
                -5103.0 / 18656.0,
                0.0,
            ],
            [
                35.0 / 384.0,
                0.0,
                500.0 / 1113.0,
                125.0 / 192.0,
                -2187.0 / 6784.0,
                11.0 / 84.0,
            ],
        ];
        // b5 − b4
        const E: [f64; 7] = [
            71.0 / 57600.0,
            0.0,
            -71.0 / 16695.0,
            71.0 / 1920.0,
            -17253.0 / 339_200.0,
            22.0 / 525.0,
            -1.0 / 40.0,
        ];

        let t = self.t;
        let y = self.y.clone();

        let mut k: Vec<DVector<f64>> = Vec::with_capacity(7);
        k.push(self.eval(system, t, &y)?);

        for (stage, (row, c)) in A.iter().zip(C).enumerate() {
            let mut y_stage = y.clone();
            for (kj, &a) in k.iter().zip(row.iter()).take(stage + 1) {
                if a != 0.0 {
                    y_stage.axpy(h * a, kj, 1.0);
                }
            }
            k.push(self.eval(system, t + c * h, &y_stage)?);
        }

        // The last stage is evaluated at the fifth order solution.
        let mut y_new = y.clone();
        for (kj, &b) in k.iter().zip(A[5].iter()) {
            if b != 0.0 {
                y_new.axpy(h * b, kj, 1.0);
            }
        }

        let mut error = DVector::zeros(y.len());
        for (kj, &e) in k.iter().zip(E.iter()) {
            if e != 0.0 {
                error.axpy(h * e, kj, 1.0);
            }
        }

        Ok((y_new, error))
    }
}
