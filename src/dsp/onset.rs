//! Onset strength via spectral flux on the log-mel spectrogram.

/// Positive frame-to-frame increase of log-mel energy, averaged over bands.
///
/// `log_mel` is `bands × frames` in dB. The difference at lag 1 is
/// half-wave rectified, then the envelope is shifted right by
/// `1 + n_fft / (2 * hop_length)` frames so a peak lines up with the frame
/// whose window center sits on the onset. The result has one value per
/// frame; the leading frames are zero.
pub fn onset_strength(log_mel: &[Vec<f32>], n_fft: usize, hop_length: usize) -> Vec<f32> {
    let n_frames = log_mel.first().map_or(0, |row| row.len());
    let n_bands = log_mel.len();
    if n_frames == 0 || n_bands == 0 {
        return vec![0.0; n_frames];
    }

    let lag = 1;
    let pad = lag + n_fft / (2 * hop_length);

    let flux = (lag..n_frames).map(|t| {
        let rising: f32 = log_mel
            .iter()
            .map(|band| (band[t] - band[t - lag]).max(0.0))
            .sum();
        rising / n_bands as f32
    });

    std::iter::repeat(0.0)
        .take(pad)
        .chain(flux)
        .take(n_frames)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_matches_frames_and_leading_pad_is_zero() {
        let log_mel = vec![vec![-50.0, -40.0, -30.0, -20.0, -10.0, 0.0]; 4];
        let env = onset_strength(&log_mel, 2048, 512);
        assert_eq!(env.len(), 6);
        assert_eq!(&env[..3], &[0.0, 0.0, 0.0]);
        assert!(env[3..].iter().all(|&v| (v - 10.0).abs() < 1e-6));
    }

    #[test]
    fn only_rising_energy_counts() {
        // band 0 rises by 20 dB, band 1 falls by 20 dB at the same step
        let log_mel = vec![
            vec![-60.0, -60.0, -40.0, -40.0, -40.0, -40.0, -40.0],
            vec![-40.0, -40.0, -60.0, -60.0, -60.0, -60.0, -60.0],
        ];
        let env = onset_strength(&log_mel, 2048, 512);
        // diff index 1 (frame 1 → 2) lands at output frame 1 + 3
        assert!((env[4] - 10.0).abs() < 1e-6);
        assert!(env.iter().enumerate().all(|(i, &v)| i == 4 || v == 0.0));
    }

    #[test]
    fn flat_input_has_no_onsets() {
        let log_mel = vec![vec![-100.0; 44]; 128];
        assert!(onset_strength(&log_mel, 2048, 512).iter().all(|&v| v == 0.0));
    }
}
