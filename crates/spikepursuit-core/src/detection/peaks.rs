/// Indices of strict local maxima of `x`.
///
/// Flat peaks resolve to the midpoint of the plateau (rounded down). The first
/// and last samples are never peaks.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Heights of `x` at the given indices.
pub fn heights(x: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks.iter().map(|&p| x[p]).collect()
}

/// Local maxima whose height is at least `min_height`.
pub fn peaks_above(x: &[f64], min_height: f64) -> Vec<usize> {
    local_maxima(x)
        .into_iter()
        .filter(|&p| x[p] >= min_height)
        .collect()
}
