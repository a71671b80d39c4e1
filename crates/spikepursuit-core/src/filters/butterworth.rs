use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use num_complex::Complex;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{Result, SpikePursuitError};

/// Transfer-function coefficients of a digital IIR filter, `a[0] == 1`.
#[derive(Clone, Debug)]
pub struct IirCoeffs {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl IirCoeffs {
    /// Butterworth high-pass of the given order.
    ///
    /// `wn` is the cutoff as a fraction of the Nyquist frequency, in (0, 1).
    /// Designed through the analog prototype, a low-pass to high-pass
    /// transform and the bilinear transform with pre-warping.
    pub fn butterworth_highpass(order: usize, wn: f64) -> Result<Self> {
        if order == 0 {
            return Err(SpikePursuitError::InvalidConfig(
                "filter order must be at least 1".into(),
            ));
        }
        if !(wn > 0.0 && wn < 1.0) {
            return Err(SpikePursuitError::InvalidConfig(format!(
                "normalized cutoff {wn} must lie in (0, 1)"
            )));
        }

        let n = order as f64;
        let prototype: Vec<Complex<f64>> = (0..order)
            .map(|i| {
                let m = -(n - 1.0) + 2.0 * i as f64;
                -Complex::new(0.0, std::f64::consts::PI * m / (2.0 * n)).exp()
            })
            .collect();

        // Pre-warped analog cutoff for fs = 2.
        let fs2 = 4.0;
        let warped = fs2 * (std::f64::consts::PI * wn / 2.0).tan();

        // Low-pass -> high-pass: poles p -> wo / p, zeros at the origin.
        let hp_poles: Vec<Complex<f64>> = prototype.iter().map(|&p| warped / p).collect();
        let prod_neg_p = hp_poles
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, &p| acc * (-p));
        let k_hp = (Complex::new(1.0, 0.0) / prod_neg_p).re;

        // Bilinear transform: zeros at the origin map to z = 1.
        let z_poles: Vec<Complex<f64>> = hp_poles
            .iter()
            .map(|&p| (fs2 + p) / (fs2 - p))
            .collect();
        let denom = hp_poles
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
        let k = k_hp * (Complex::new(fs2.powi(order as i32), 0.0) / denom).re;

        let z_zeros = vec![Complex::new(1.0, 0.0); order];
        let b: Vec<f64> = poly(&z_zeros).iter().map(|c| k * c.re).collect();
        let a: Vec<f64> = poly(&z_poles).iter().map(|c| c.re).collect();
        Ok(Self { b, a })
    }

    fn taps(&self) -> usize {
        self.a.len().max(self.b.len())
    }

    /// Initial state for a step response, as in the steady state of a unit input.
    fn steady_state(&self) -> Result<Vec<f64>> {
        let n = self.taps();
        let m = n - 1;
        let a = padded(&self.a, n);
        let b = padded(&self.b, n);

        // (I - companion(a)^T) zi = b[1:] - a[1:] * b[0]
        let lhs = DMatrix::from_fn(m, m, |r, c| {
            let identity = if r == c { 1.0 } else { 0.0 };
            let companion_t = if c == 0 {
                -a[r + 1]
            } else if r + 1 == c {
                1.0
            } else {
                0.0
            };
            identity - companion_t
        });
        let rhs = DVector::from_fn(m, |r, _| b[r + 1] - a[r + 1] * b[0]);
        let zi = lhs.lu().solve(&rhs).ok_or_else(|| {
            SpikePursuitError::degenerate("singular filter steady-state system")
        })?;
        Ok(zi.iter().copied().collect())
    }

    /// Direct form II transposed filtering with initial state `zi`.
    fn lfilter(&self, x: &[f64], zi: &[f64]) -> Vec<f64> {
        let n = self.taps();
        let a = padded(&self.a, n);
        let b = padded(&self.b, n);
        let mut z = zi.to_vec();
        let mut y = Vec::with_capacity(x.len());
        for &xn in x {
            let yn = b[0] * xn + z.first().copied().unwrap_or(0.0);
            for i in 0..n.saturating_sub(2) {
                z[i] = b[i + 1] * xn + z[i + 1] - a[i + 1] * yn;
            }
            if n >= 2 {
                z[n - 2] = b[n - 1] * xn - a[n - 1] * yn;
            }
            y.push(yn);
        }
        y
    }

    /// Zero-phase forward-backward filtering with odd extension of
    /// `3 * (taps - 1)` samples at each end.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>> {
        let pad = 3 * (self.taps() - 1);
        let len = x.len();
        if len <= pad {
            return Err(SpikePursuitError::degenerate(format!(
                "trace of {len} samples is too short for a filter padding of {pad}"
            )));
        }

        let mut ext = Vec::with_capacity(len + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * x[0] - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=pad).map(|i| 2.0 * x[len - 1] - x[len - 1 - i]));

        let zi = self.steady_state()?;
        let scaled = |s: f64| zi.iter().map(|&z| z * s).collect::<Vec<_>>();

        let mut forward = self.lfilter(&ext, &scaled(ext[0]));
        forward.reverse();
        let mut backward = self.lfilter(&forward, &scaled(forward[0]));
        backward.reverse();

        Ok(backward[pad..pad + len].to_vec())
    }
}

fn padded(coeffs: &[f64], n: usize) -> Vec<f64> {
    let mut v = coeffs.to_vec();
    v.resize(n, 0.0);
    v
}

/// Monic polynomial coefficients (highest power first) with the given roots.
fn poly(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for &r in roots {
        let mut next = coeffs.clone();
        next.push(Complex::new(0.0, 0.0));
        for i in 1..next.len() {
            next[i] -= r * coeffs[i - 1];
        }
        coeffs = next;
    }
    coeffs
}

/// Zero-phase Butterworth high-pass of a single trace.
pub fn highpass(trace: &[f64], cutoff_hz: f64, sample_rate: f64, order: usize) -> Result<Vec<f64>> {
    let coeffs = IirCoeffs::butterworth_highpass(order, cutoff_hz / (sample_rate / 2.0))?;
    coeffs.filtfilt(trace)
}

/// Zero-phase Butterworth high-pass of every pixel column of a frames x pixels matrix.
pub fn highpass_video(
    data: &Array2<f64>,
    cutoff_hz: f64,
    sample_rate: f64,
    order: usize,
) -> Result<Array2<f64>> {
    let coeffs = IirCoeffs::butterworth_highpass(order, cutoff_hz / (sample_rate / 2.0))?;
    let (frames, pixels) = data.dim();

    let filter_column = |col: usize| -> Result<Vec<f64>> {
        let column: Vec<f64> = data.column(col).to_vec();
        coeffs.filtfilt(&column)
    };

    let columns: Vec<Vec<f64>> = if pixels >= PARALLEL_PIXEL_THRESHOLD {
        (0..pixels)
            .into_par_iter()
            .map(filter_column)
            .collect::<Result<_>>()?
    } else {
        (0..pixels).map(filter_column).collect::<Result<_>>()?
    };

    let mut result = Array2::<f64>::zeros((frames, pixels));
    for (col, values) in columns.into_iter().enumerate() {
        for (row, v) in values.into_iter().enumerate() {
            result[[row, col]] = v;
        }
    }
    Ok(result)
}
