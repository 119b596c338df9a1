/// Magnitude-weighted mean frequency of each frame, in Hz. Frames without
/// energy have a centroid of 0.
pub fn spectral_centroid(magnitudes: &[Vec<f32>], frequencies: &[f32]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            if total > f32::MIN_POSITIVE {
                frame
                    .iter()
                    .zip(frequencies)
                    .map(|(&mag, &freq)| freq * mag)
                    .sum::<f32>()
                    / total
            } else {
                0.0
            }
        })
        .collect()
}
