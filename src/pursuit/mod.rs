//! Iterative pursuit of a target view. Given data `D`, projection `P` and a
//! target `T` of the same shape as the view `V = D . P`, each step nudges
//! `P` down the gradient of the mean squared residual `T - V`. The step
//! length is scaled by `1 / ||D||_F^2`; together with a learning rate of at
//! most 1 that keeps every step inside the curvature bound of the quadratic
//! objective, so the residual never grows between steps.

use log::{debug, info};
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};
use rayon::prelude::*;

use crate::error::{PursuitError, Result};
use crate::matrix;
use crate::projection::Projection;

/// Tuning knobs for a pursuit run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PursuitConfig {
    /// Fraction of the safe maximum step taken per iteration. Values above
    /// 1.0 void the no-overshoot guarantee.
    pub learning_rate: f64,
    /// Hard stop for a single `run`.
    pub max_iterations: usize,
    /// Mean-squared-residual level treated as "arrived".
    pub epsilon: f64,
    /// Projection columns are rescaled down to this L2 norm when a step
    /// pushes them past it.
    pub column_norm_cap: f64,
    /// Emit a debug log line every this many iterations; 0 disables.
    pub log_every: usize,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        PursuitConfig {
            learning_rate: 0.1,
            max_iterations: 2_000,
            epsilon: 1e-9,
            column_norm_cap: 4.0,
            log_every: 100,
        }
    }
}

impl PursuitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_column_norm_cap(mut self, cap: f64) -> Self {
        self.column_norm_cap = cap;
        self
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }
}

/// Where a pursuit stands after a step. Hitting the iteration cap is a soft
/// outcome, reported here rather than as an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepStatus {
    InProgress { mse: f64 },
    Converged { iterations: usize, mse: f64 },
    IterationCapReached { mse: f64 },
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::InProgress { .. })
    }

    pub fn mse(&self) -> f64 {
        match *self {
            StepStatus::InProgress { mse }
            | StepStatus::Converged { mse, .. }
            | StepStatus::IterationCapReached { mse } => mse,
        }
    }
}

/// Gradient pursuit driver. Owns the iteration counter so a caller can
/// single-step for animation or loop to termination with [`Pursuit::run`].
pub struct Pursuit {
    config: PursuitConfig,
    iterations: usize,
    last_mse: Option<f64>,
}

impl Pursuit {
    pub fn new(config: PursuitConfig) -> Self {
        Pursuit {
            config,
            iterations: 0,
            last_mse: None,
        }
    }

    pub fn config(&self) -> &PursuitConfig {
        &self.config
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn last_mse(&self) -> Option<f64> {
        self.last_mse
    }

    /// Forgets all progress; the next step starts a fresh run. The
    /// projection is left wherever the last step put it.
    pub fn reset(&mut self) {
        self.iterations = 0;
        self.last_mse = None;
    }

    /// One pursuit iteration. `holdout`, when given, flags rows excluded
    /// from the residual (a test set riding along in the view without
    /// steering it); its length must match the row count.
    ///
    /// The view is recomputed from `D . P` on every call rather than patched
    /// incrementally, so the projection and view can never drift apart.
    pub fn step(
        &mut self,
        data: ArrayView2<f64>,
        projection: &mut Projection,
        target: ArrayView2<f64>,
        holdout: Option<&[bool]>,
    ) -> Result<StepStatus> {
        let view = projection.project_matrix(data)?;
        matrix::ensure_same_shape(view.view(), target)?;
        let rows = data.nrows();
        if let Some(mask) = holdout {
            if mask.len() != rows {
                return Err(PursuitError::shape((rows, 1), (mask.len(), 1)));
            }
        }

        let (residual, included_rows) = masked_residual(target, view.view(), holdout);
        let included_elems = included_rows * view.ncols();
        let mse = if included_elems > 0 {
            matrix::frobenius_norm_sq(residual.view()) / included_elems as f64
        } else {
            0.0
        };

        if mse <= self.config.epsilon {
            debug!(
                "pursuit converged after {} iterations, mse {:.3e}",
                self.iterations, mse
            );
            self.last_mse = Some(mse);
            return Ok(StepStatus::Converged {
                iterations: self.iterations,
                mse,
            });
        }
        if self.iterations >= self.config.max_iterations {
            self.last_mse = Some(mse);
            return Ok(StepStatus::IterationCapReached { mse });
        }

        // dV/dP[a, v] = D[:, a], so the full gradient is D^T . R
        let gradient = data.t().dot(&residual);
        let norm_sq = matrix::frobenius_norm_sq(data);
        if norm_sq > 0.0 {
            let eta = self.config.learning_rate / norm_sq;
            *projection.matrix_mut() += &(gradient * eta);
            matrix::cap_column_norms(projection.matrix_mut(), self.config.column_norm_cap);
        }

        self.iterations += 1;
        self.last_mse = Some(mse);
        if self.config.log_every > 0 && self.iterations % self.config.log_every == 0 {
            debug!("pursuit iteration {}: mse {:.3e}", self.iterations, mse);
        }
        Ok(StepStatus::InProgress { mse })
    }

    /// Steps until the target is reached or the iteration cap trips.
    pub fn run(
        &mut self,
        data: ArrayView2<f64>,
        projection: &mut Projection,
        target: ArrayView2<f64>,
        holdout: Option<&[bool]>,
    ) -> Result<StepStatus> {
        loop {
            let status = self.step(data, projection, target, holdout)?;
            if status.is_terminal() {
                info!(
                    "pursuit finished after {} iterations, mse {:.3e}",
                    self.iterations,
                    status.mse()
                );
                return Ok(status);
            }
        }
    }
}

impl Default for Pursuit {
    fn default() -> Self {
        Self::new(PursuitConfig::default())
    }
}

/// `T - V` with held-out rows zeroed, plus the count of rows that remain.
fn masked_residual(
    target: ArrayView2<f64>,
    view: ArrayView2<f64>,
    holdout: Option<&[bool]>,
) -> (Array2<f64>, usize) {
    let rows = target.nrows();
    let mut residual = target.to_owned();
    let fill_row = |i: usize, mut row: ArrayViewMut1<f64>| {
        if holdout.is_some_and(|mask| mask[i]) {
            row.fill(0.0);
        } else {
            row -= &view.row(i);
        }
    };
    if residual.len() >= matrix::PARALLEL_THRESHOLD {
        residual
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, row)| fill_row(i, row));
    } else {
        for (i, row) in residual.axis_iter_mut(Axis(0)).enumerate() {
            fill_row(i, row);
        }
    }
    let held_out = holdout.map_or(0, |mask| mask.iter().filter(|&&m| m).count());
    (residual, rows - held_out)
}
