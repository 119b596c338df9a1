use super::stft::{centered_frames, PadMode};

/// Amplitudes at or below this count as zero for sign changes.
const ZERO_THRESHOLD: f32 = 1e-10;

/// Per-frame root-mean-square over centered, zero-padded frames.
pub fn rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    centered_frames(samples, frame_length, hop_length, PadMode::Zero)
        .iter()
        .map(|frame| (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt())
        .collect()
}

/// Fraction of adjacent sample pairs that change sign, per centered frame.
///
/// Frames are edge-padded so a constant offset at the ends does not create
/// spurious crossings. Near-zero samples count as zero, and zero is positive.
pub fn zero_crossing_rate(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    centered_frames(samples, frame_length, hop_length, PadMode::Edge)
        .iter()
        .map(|frame| {
            if frame.len() < 2 {
                return 0.0;
            }
            let negative = |s: f32| s < -ZERO_THRESHOLD;
            let crossings = frame
                .windows(2)
                .filter(|w| negative(w[0]) != negative(w[1]))
                .count();
            crossings as f32 / (frame.len() - 1) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn frame_counts_match_centered_formula() {
        for n in [1usize, 100, 512, 2047, 2048, 22050, 30000] {
            let samples = vec![0.1; n];
            let expected = 1 + (n + 2048 - 2048) / 512;
            assert_eq!(rms(&samples, 2048, 512).len(), expected, "n = {}", n);
            assert_eq!(zero_crossing_rate(&samples, 2048, 512).len(), expected, "n = {}", n);
        }
    }

    #[test]
    fn rms_of_constant_and_sine() {
        let constant = vec![0.5; 8192];
        let values = rms(&constant, 2048, 512);
        // fully covered frames
        assert!((values[4] - 0.5).abs() < 1e-6);
        // first frame is half padding
        assert!((values[0] - (0.25f32 / 2.0).sqrt()).abs() < 1e-4);

        let sine: Vec<f32> = (0..22050)
            .map(|i| (2.0 * PI * 441.0 * i as f32 / 22050.0).sin())
            .collect();
        let values = rms(&sine, 2048, 512);
        assert!((values[20] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-2);
    }

    #[test]
    fn zcr_is_a_fraction() {
        let alternating: Vec<f32> = (0..4096)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let values = zero_crossing_rate(&alternating, 2048, 512);
        assert!(values.iter().all(|&z| (0.0..=1.0).contains(&z)));
        assert!((values[4] - 1.0).abs() < 1e-6);

        let noiseish: Vec<f32> = (0..10000).map(|i| ((i * 7919) % 13) as f32 - 6.0).collect();
        assert!(zero_crossing_rate(&noiseish, 2048, 512)
            .iter()
            .all(|&z| (0.0..=1.0).contains(&z)));
    }

    #[test]
    fn silence_has_no_crossings() {
        let values = zero_crossing_rate(&vec![0.0; 22050], 2048, 512);
        assert!(values.iter().all(|&z| z == 0.0));

        // tiny dither below the threshold is treated as silence
        let dither: Vec<f32> = (0..4096).map(|i| if i % 2 == 0 { 1e-12 } else { -1e-12 }).collect();
        assert!(zero_crossing_rate(&dither, 2048, 512).iter().all(|&z| z == 0.0));
    }

    #[test]
    fn sine_crossing_rate() {
        // 441 Hz → 882 crossings per second
        let sine: Vec<f32> = (0..22050)
            .map(|i| (2.0 * PI * 441.0 * i as f32 / 22050.0 + 0.3).sin())
            .collect();
        let values = zero_crossing_rate(&sine, 2048, 512);
        let expected = 882.0 / 22050.0;
        assert!((values[20] - expected).abs() < 0.005);
    }
}
