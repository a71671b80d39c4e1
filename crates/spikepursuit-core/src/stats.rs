//! Small descriptive statistics shared by the estimators.

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Mean and standard deviation with `ddof` delta degrees of freedom.
pub fn mean_stddev(data: &[f64], ddof: usize) -> (f64, f64) {
    let n = data.len();
    if n <= ddof {
        return (mean(data), f64::NAN);
    }
    let m = mean(data);
    let var = data.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / (n - ddof) as f64;
    (m, var.sqrt())
}

/// Mean of `data` at the given indices.
pub fn mean_at(data: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return f64::NAN;
    }
    indices.iter().map(|&i| data[i]).sum::<f64>() / indices.len() as f64
}

fn sorted(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Median (average of the two middle values for even lengths).
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let s = sorted(data);
    let n = s.len();
    if n % 2 == 1 {
        s[n / 2]
    } else {
        0.5 * (s[n / 2 - 1] + s[n / 2])
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in percent and clamped to `[0, 100]`.
pub fn percentile(data: &[f64], q: f64) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let s = sorted(data);
    let q = q.clamp(0.0, 100.0);
    let pos = q / 100.0 * (s.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    s[lo] + frac * (s[hi] - s[lo])
}

/// Index of the first maximum.
pub fn argmax(data: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in data.iter().enumerate() {
        if v > data[best] {
            best = i;
        }
    }
    best
}

/// Evenly spaced samples over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Signal-to-noise ratio of a denoised trace: mean at spikes over the
/// standard deviation everywhere else.
pub fn spike_snr(trace: &[f64], spikes: &[usize]) -> f64 {
    let mut is_spike = vec![false; trace.len()];
    for &s in spikes {
        is_spike[s] = true;
    }
    let signal = mean_at(trace, spikes);
    let rest: Vec<f64> = trace
        .iter()
        .zip(&is_spike)
        .filter(|(_, &s)| !s)
        .map(|(&v, _)| v)
        .collect();
    let (_, noise) = mean_stddev(&rest, 0);
    signal / noise
}
