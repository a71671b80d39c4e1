use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SpikePursuitError};

use super::ridge::{lambda_grid, RidgeSolver};

/// Outcome of the (sigma, lambda) search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrossValidation {
    pub sigma_index: usize,
    pub lambda_index: usize,
    /// Held-out squared error, `errors[sigma][lambda]`.
    pub errors: Vec<Vec<f64>>,
}

/// Contiguous k-fold held-out squared error of a ridge fit of `target` on `predictor`.
pub fn held_out_error(
    predictor: ArrayView2<f64>,
    target: ArrayView1<f64>,
    lambda: f64,
    folds: usize,
) -> Result<f64> {
    let rows = predictor.nrows();
    if folds < 2 || folds > rows {
        return Err(SpikePursuitError::InvalidConfig(format!(
            "cannot split {rows} rows into {folds} folds"
        )));
    }

    let mut total = 0.0;
    for fold in 0..folds {
        let start = fold * rows / folds;
        let end = (fold + 1) * rows / folds;
        let train: Vec<usize> = (0..start).chain(end..rows).collect();
        let test: Vec<usize> = (start..end).collect();

        let train_x = predictor.select(Axis(0), &train);
        let train_y = target.select(Axis(0), &train);
        let w = RidgeSolver::new(train_x.view(), lambda)?.solve(train_y.view())?;

        let fitted = predictor.select(Axis(0), &test).dot(&w);
        total += test
            .iter()
            .zip(fitted.iter())
            .map(|(&i, &f)| (target[i] - f).powi(2))
            .sum::<f64>();
    }
    Ok(total)
}

/// Grid search over blur scales and ridge penalties.
///
/// `build_predictor(sigma)` must return the intercept-augmented predictor for
/// that blur scale. Penalties are `‖P‖_F² · lambda_scales` per predictor.
/// Ties keep the first (smallest index) pair.
pub fn cross_validate<F>(
    sigmas: &[f64],
    lambda_scales: &[f64],
    target: ArrayView1<f64>,
    folds: usize,
    mut build_predictor: F,
) -> Result<CrossValidation>
where
    F: FnMut(f64) -> Result<Array2<f64>>,
{
    if sigmas.is_empty() || lambda_scales.is_empty() {
        return Err(SpikePursuitError::InvalidConfig(
            "cross-validation needs at least one sigma and one penalty".into(),
        ));
    }

    let mut errors = Vec::with_capacity(sigmas.len());
    let mut best = (0, 0, f64::INFINITY);
    for (si, &sigma) in sigmas.iter().enumerate() {
        let predictor = build_predictor(sigma)?;
        let lambdas = lambda_grid(predictor.view(), lambda_scales);
        let mut row = Vec::with_capacity(lambdas.len());
        for (li, &lambda) in lambdas.iter().enumerate() {
            let err = held_out_error(predictor.view(), target, lambda, folds)?;
            debug!(sigma, lambda, err, "Cross-validation fold error");
            if err < best.2 {
                best = (si, li, err);
            }
            row.push(err);
        }
        errors.push(row);
    }

    Ok(CrossValidation {
        sigma_index: best.0,
        lambda_index: best.1,
        errors,
    })
}
