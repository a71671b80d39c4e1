use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::debug;

use crate::error::{Result, SpikePursuitError};

/// Which form of the normal equations a [`RidgeSolver`] factorized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RidgeForm {
    /// `(PᵗP + λI₀)` of size `cols x cols`.
    Primal,
    /// `(XcXcᵗ + λI)` of size `rows x rows` over centered non-intercept columns.
    Dual,
}

enum Factor {
    Primal {
        chol: Cholesky<f64, Dyn>,
        predictor: Array2<f64>,
    },
    Dual {
        chol: Cholesky<f64, Dyn>,
        centered: Array2<f64>,
        col_means: Array1<f64>,
    },
}

/// Ridge regression on a predictor whose first column is an unpenalized intercept.
///
/// The normal equations are factorized once at construction; each call to
/// [`RidgeSolver::solve`] only back-substitutes for a new target.
pub struct RidgeSolver {
    factor: Factor,
    cols: usize,
    rows: usize,
}

impl RidgeSolver {
    /// Factorize `(PᵗP + λI₀) w = Pᵗg` for the predictor `P` (rows x cols).
    ///
    /// Picks the primal form when `cols <= rows` and the equivalent dual
    /// (kernel) form otherwise.
    pub fn new(predictor: ArrayView2<f64>, lambda: f64) -> Result<Self> {
        let (rows, cols) = predictor.dim();
        if rows == 0 || cols == 0 {
            return Err(SpikePursuitError::degenerate("empty ridge predictor"));
        }
        if !(lambda >= 0.0) {
            return Err(SpikePursuitError::InvalidConfig(format!(
                "ridge penalty {lambda} must be non-negative"
            )));
        }
        let factor = if cols <= rows {
            Self::primal(predictor, lambda)?
        } else {
            Self::dual(predictor, lambda)?
        };
        debug!(rows, cols, lambda, form = ?Self::form_of(&factor), "Ridge normal equations factorized");
        Ok(Self { factor, cols, rows })
    }

    fn form_of(factor: &Factor) -> RidgeForm {
        match factor {
            Factor::Primal { .. } => RidgeForm::Primal,
            Factor::Dual { .. } => RidgeForm::Dual,
        }
    }

    pub fn form(&self) -> RidgeForm {
        Self::form_of(&self.factor)
    }

    fn primal(predictor: ArrayView2<f64>, lambda: f64) -> Result<Factor> {
        let cols = predictor.ncols();
        let mut gram = predictor.t().dot(&predictor);
        for i in 1..cols {
            gram[[i, i]] += lambda;
        }
        let chol = to_nalgebra(&gram)
            .cholesky()
            .ok_or_else(|| SpikePursuitError::degenerate("ridge normal equations are singular"))?;
        Ok(Factor::Primal {
            chol,
            predictor: predictor.to_owned(),
        })
    }

    fn dual(predictor: ArrayView2<f64>, lambda: f64) -> Result<Factor> {
        let features = predictor.slice(ndarray::s![.., 1..]);
        let col_means = features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(features.ncols()));
        let centered = &features - &col_means.view().insert_axis(Axis(0));
        let mut kernel = centered.dot(&centered.t());
        for i in 0..kernel.nrows() {
            kernel[[i, i]] += lambda;
        }
        let chol = to_nalgebra(&kernel)
            .cholesky()
            .ok_or_else(|| SpikePursuitError::degenerate("ridge kernel system is singular"))?;
        Ok(Factor::Dual {
            chol,
            centered,
            col_means,
        })
    }

    /// Weights (intercept first) for the target `g`.
    pub fn solve(&self, target: ArrayView1<f64>) -> Result<Array1<f64>> {
        if target.len() != self.rows {
            return Err(SpikePursuitError::degenerate(format!(
                "ridge target has {} samples, predictor has {} rows",
                target.len(),
                self.rows
            )));
        }
        match &self.factor {
            Factor::Primal { chol, predictor } => {
                let rhs = predictor.t().dot(&target);
                let w = chol.solve(&DVector::from_iterator(self.cols, rhs.iter().copied()));
                Ok(w.iter().copied().collect())
            }
            Factor::Dual {
                chol,
                centered,
                col_means,
            } => {
                let target_mean = target.mean().unwrap_or(0.0);
                let gc = DVector::from_iterator(self.rows, target.iter().map(|v| v - target_mean));
                let alpha = chol.solve(&gc);
                let alpha = Array1::from_iter(alpha.iter().copied());
                let rest = centered.t().dot(&alpha);
                let intercept = target_mean - col_means.dot(&rest);
                let mut w = Array1::zeros(self.cols);
                w[0] = intercept;
                w.slice_mut(ndarray::s![1..]).assign(&rest);
                Ok(w)
            }
        }
    }
}

fn to_nalgebra(m: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[[i, j]])
}

/// Penalty grid `‖P[:, 1..]‖_F² · scales`.
pub fn lambda_grid(predictor: ArrayView2<f64>, scales: &[f64]) -> Vec<f64> {
    let frob2: f64 = predictor
        .slice(ndarray::s![.., 1..])
        .iter()
        .map(|v| v * v)
        .sum();
    scales.iter().map(|s| frob2 * s).collect()
}

/// Prepend a column of ones to a rows x cols matrix.
pub fn with_intercept(features: ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = features.dim();
    let mut out = Array2::<f64>::ones((rows, cols + 1));
    out.slice_mut(ndarray::s![.., 1..]).assign(&features);
    out
}
