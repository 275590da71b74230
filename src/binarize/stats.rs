/// Scales the median absolute deviation to a normal standard deviation.
pub const MAD_SCALE: f64 = 1.4826;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation around the median (unscaled).
pub fn mad(values: &[f64]) -> f64 {
    let med = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// `median + k * 1.4826 * MAD`.
pub fn robust_threshold(values: &[f64], k: f64) -> f64 {
    median(values) + k * MAD_SCALE * mad(values)
}

#[cfg(test)]
#[path = "../../tests/src_inline/binarize/stats.rs"]
mod tests;
