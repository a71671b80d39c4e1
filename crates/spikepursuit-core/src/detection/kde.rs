use rayon::prelude::*;

use crate::error::{Result, SpikePursuitError};
use crate::stats::mean_stddev;

/// Minimum grid length evaluated in parallel.
const PARALLEL_GRID_THRESHOLD: usize = 512;

/// One-dimensional Gaussian kernel density estimate with Scott's bandwidth.
#[derive(Clone, Debug)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// Bandwidth is `n^(-1/5)` times the sample standard deviation (ddof = 1).
    pub fn scott(samples: &[f64]) -> Result<Self> {
        if samples.len() < 2 {
            return Err(SpikePursuitError::degenerate(format!(
                "density estimate needs at least 2 samples, got {}",
                samples.len()
            )));
        }
        let (_, sd) = mean_stddev(samples, 1);
        if !(sd > 0.0) || !sd.is_finite() {
            return Err(SpikePursuitError::degenerate(
                "density estimate of zero-variance samples",
            ));
        }
        let factor = (samples.len() as f64).powf(-0.2);
        Ok(Self {
            samples: samples.to_vec(),
            bandwidth: factor * sd,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Density at a single point.
    pub fn density(&self, x: f64) -> f64 {
        let inv_bw = 1.0 / self.bandwidth;
        let norm = inv_bw / ((2.0 * std::f64::consts::PI).sqrt() * self.samples.len() as f64);
        self.samples
            .iter()
            .map(|&s| {
                let z = (x - s) * inv_bw;
                (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            * norm
    }

    /// Density over a grid, order preserved.
    pub fn evaluate(&self, grid: &[f64]) -> Vec<f64> {
        if grid.len() >= PARALLEL_GRID_THRESHOLD {
            grid.par_iter().map(|&x| self.density(x)).collect()
        } else {
            grid.iter().map(|&x| self.density(x)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::linspace;

    #[test]
    fn scott_bandwidth() {
        let samples = [0.0, 1.0, 2.0, 3.0];
        let kde = GaussianKde::scott(&samples).unwrap();
        let sd = (5.0f64 / 3.0).sqrt();
        assert!((kde.bandwidth() - sd * 4f64.powf(-0.2)).abs() < 1e-12);
    }

    #[test]
    fn density_integrates_to_one() {
        let samples = [-1.0, 0.0, 0.5, 2.0];
        let kde = GaussianKde::scott(&samples).unwrap();
        let grid = linspace(-10.0, 12.0, 4001);
        let dx = grid[1] - grid[0];
        let area: f64 = kde.evaluate(&grid).iter().sum::<f64>() * dx;
        assert!((area - 1.0).abs() < 1e-6, "area {area}");
    }

    #[test]
    fn rejects_degenerate_samples() {
        assert!(GaussianKde::scott(&[1.0]).is_err());
        assert!(GaussianKde::scott(&[2.0, 2.0, 2.0]).is_err());
    }
}
