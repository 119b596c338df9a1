/// Rescale to [0, 1] by min and max. A constant series (including an empty
/// or all-zero one) is returned unchanged.
pub fn min_max(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if values.is_empty() || range == 0.0 {
        return values.to_vec();
    }
    values.iter().map(|&v| (v - min) / range).collect()
}

/// Arithmetic mean, 0 for an empty series.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
}
