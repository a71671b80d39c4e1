use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, warn};

use crate::consts::{
    EXACT_BASIS_MAX_DIM, SUBSPACE_MAX_ITERATIONS, SUBSPACE_OVERSAMPLING, SUBSPACE_SEED,
    SUBSPACE_TOLERANCE,
};
use crate::error::{Result, SpikePursuitError};

/// Low-rank temporal basis of the background pixels, used to regress
/// background fluctuations out of a trace.
#[derive(Clone, Debug)]
pub struct BackgroundSubtractor {
    /// Orthonormal columns (frames x rank), leading singular vectors first.
    basis: Array2<f64>,
}

impl BackgroundSubtractor {
    /// Top-`rank` left singular vectors of `background` (frames x pixels).
    ///
    /// `rank` is clipped to `min(frames, pixels)`.
    pub fn fit(background: ArrayView2<f64>, rank: usize) -> Result<Self> {
        let (frames, pixels) = background.dim();
        if pixels == 0 {
            return Err(SpikePursuitError::degenerate(
                "no background pixels left after censoring",
            ));
        }
        if frames == 0 {
            return Err(SpikePursuitError::degenerate("background has no frames"));
        }
        let rank = rank.min(frames.min(pixels));
        if rank < 1 {
            return Ok(Self {
                basis: Array2::zeros((frames, 0)),
            });
        }
        let basis = leading_left_singular_vectors(background, rank);
        debug!(frames, pixels, rank, "Background basis fitted");
        Ok(Self { basis })
    }

    /// Wrap an existing orthonormal basis.
    pub fn from_basis(basis: Array2<f64>) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> &Array2<f64> {
        &self.basis
    }

    pub fn rank(&self) -> usize {
        self.basis.ncols()
    }

    /// No-intercept least-squares coefficients of `trace` on the basis.
    pub fn coefficients(&self, trace: ArrayView1<f64>) -> Result<Array1<f64>> {
        if trace.len() != self.basis.nrows() {
            return Err(SpikePursuitError::degenerate(format!(
                "trace has {} samples, background basis has {} frames",
                trace.len(),
                self.basis.nrows()
            )));
        }
        Ok(self.basis.t().dot(&trace))
    }

    /// The trace minus its projection onto the basis.
    pub fn subtract(&self, trace: ArrayView1<f64>) -> Result<Array1<f64>> {
        let coef = self.coefficients(trace)?;
        Ok(&trace - &self.basis.dot(&coef))
    }
}

/// Leading left singular vectors, exact for moderate sizes.
fn leading_left_singular_vectors(a: ArrayView2<f64>, rank: usize) -> Array2<f64> {
    let (frames, pixels) = a.dim();
    let u = if frames.min(pixels) <= EXACT_BASIS_MAX_DIM {
        gram_basis(a, rank)
    } else {
        subspace_iteration(a, rank)
    };
    fix_signs(u)
}

/// Top eigenvectors of the smaller Gram matrix.
fn gram_basis(a: ArrayView2<f64>, rank: usize) -> Array2<f64> {
    let (frames, pixels) = a.dim();
    if frames <= pixels {
        let (_, vectors) = sorted_eigen(&a.dot(&a.t()), rank);
        vectors
    } else {
        // Columns A·v are orthogonal; QR normalizes them and completes null directions.
        let (_, vectors) = sorted_eigen(&a.t().dot(&a), rank);
        orthonormalize(&a.dot(&vectors))
    }
}

/// Randomized subspace iteration run until the leading singular values settle.
fn subspace_iteration(a: ArrayView2<f64>, rank: usize) -> Array2<f64> {
    let (frames, pixels) = a.dim();
    let width = (rank + SUBSPACE_OVERSAMPLING.max(rank)).min(frames.min(pixels));

    let mut rng = ChaCha8Rng::seed_from_u64(SUBSPACE_SEED);
    let omega: Array2<f64> = Array2::from_shape_simple_fn((pixels, width), || StandardNormal.sample(&mut rng));

    let mut q = orthonormalize(&a.dot(&omega));
    let mut previous: Option<Vec<f64>> = None;
    let mut converged = false;
    let mut iterations = 0;
    while iterations < SUBSPACE_MAX_ITERATIONS {
        iterations += 1;
        let z = orthonormalize(&a.t().dot(&q));
        q = orthonormalize(&a.dot(&z));

        let b = q.t().dot(&a);
        let (values, _) = sorted_eigen(&b.dot(&b.t()), rank);
        let values: Vec<f64> = values.iter().map(|v| v.max(0.0).sqrt()).collect();
        if let Some(prev) = &previous {
            let scale = values.first().copied().unwrap_or(0.0).max(f64::MIN_POSITIVE);
            let change = values
                .iter()
                .zip(prev)
                .fold(0.0f64, |m, (v, p)| m.max((v - p).abs() / scale));
            if change < SUBSPACE_TOLERANCE {
                converged = true;
                break;
            }
        }
        previous = Some(values);
    }
    if converged {
        debug!(iterations, "Subspace iteration converged");
    } else {
        warn!(iterations, "Subspace iteration stopped before converging");
    }

    // B = QᵗA; eigenvectors of BBᵗ rotate Q onto the singular vectors.
    let b = q.t().dot(&a);
    let (_, rotation) = sorted_eigen(&b.dot(&b.t()), rank);
    q.dot(&rotation)
}

/// The `count` largest eigenpairs of a symmetric matrix, largest first.
fn sorted_eigen(m: &Array2<f64>, count: usize) -> (Vec<f64>, Array2<f64>) {
    let n = m.nrows();
    let eigen = SymmetricEigen::new(DMatrix::from_fn(n, n, |i, j| m[[i, j]]));
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));
    let count = count.min(n);
    let values = order[..count].iter().map(|&k| eigen.eigenvalues[k]).collect();
    let vectors = Array2::from_shape_fn((n, count), |(i, k)| eigen.eigenvectors[(i, order[k])]);
    (values, vectors)
}

/// Flip columns so the largest-magnitude entry of each is positive.
fn fix_signs(mut u: Array2<f64>) -> Array2<f64> {
    for mut col in u.columns_mut() {
        let pivot = col
            .iter()
            .copied()
            .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            col.mapv_inplace(|v| -v);
        }
    }
    u
}

fn orthonormalize(m: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = m.dim();
    let qr = DMatrix::from_fn(rows, cols, |i, j| m[[i, j]]).qr();
    let q = qr.q();
    Array2::from_shape_fn((rows, q.ncols()), |(i, j)| q[(i, j)])
}
