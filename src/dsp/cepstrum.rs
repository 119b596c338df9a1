use super::mel::{power_to_db, DbReference};

/// Orthonormal DCT-II basis, `n_coeffs × n_inputs`.
pub fn dct_matrix(n_coeffs: usize, n_inputs: usize) -> Vec<Vec<f32>> {
    let n = n_inputs as f64;
    (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_inputs)
                .map(|i| {
                    let angle = std::f64::consts::PI * k as f64 * (2 * i + 1) as f64 / (2.0 * n);
                    (scale * angle.cos()) as f32
                })
                .collect()
        })
        .collect()
}

/// Cepstral coefficients from mel power (`bands × frames`), returned as
/// `n_coeffs × frames`.
///
/// The mel energies are taken to dB against a unit reference before the
/// DCT. A grid without any energy yields all-zero coefficients.
pub fn mfcc(mel_power: &[Vec<f32>], n_coeffs: usize, top_db: f32) -> Vec<Vec<f32>> {
    let n_frames = mel_power.first().map_or(0, |row| row.len());
    let silent = mel_power.iter().flatten().all(|&p| p <= 0.0);
    if silent {
        return vec![vec![0.0; n_frames]; n_coeffs];
    }

    let log_mel = power_to_db(mel_power, DbReference::Value(1.0), top_db);
    let basis = dct_matrix(n_coeffs, mel_power.len());

    basis
        .iter()
        .map(|weights| {
            (0..n_frames)
                .map(|t| {
                    weights
                        .iter()
                        .zip(&log_mel)
                        .map(|(w, band)| w * band[t])
                        .sum()
                })
                .collect()
        })
        .collect()
}
