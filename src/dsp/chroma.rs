use super::mel::transpose;

pub const N_CHROMA: usize = 12;

pub const PITCH_CLASSES: [&str; N_CHROMA] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Center of the octave weighting (octaves above A0/16).
const CENTER_OCTAVE: f64 = 5.0;
const OCTAVE_WIDTH: f64 = 2.0;

/// Pitch-class filterbank over STFT bins, `12 × (n_fft/2 + 1)`, row 0 = C.
///
/// Each bin is placed at its fractional semitone position relative to A440
/// and spread over nearby pitch classes by a Gaussian one bin-width wide, so
/// bins straddling a semitone boundary share their energy.
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize) -> Vec<Vec<f32>> {
    let n_chroma = N_CHROMA as f64;
    let a0_sixteenth = 440.0 / 16.0;

    // Fractional chroma position of every bin except DC
    let mut frqbins: Vec<f64> = (1..n_fft)
        .map(|i| {
            let f = i as f64 * sample_rate as f64 / n_fft as f64;
            n_chroma * (f / a0_sixteenth).log2()
        })
        .collect();
    // DC sits 1.5 octaves below bin 1
    frqbins.insert(0, frqbins[0] - 1.5 * n_chroma);

    let binwidth: Vec<f64> = frqbins
        .windows(2)
        .map(|w| (w[1] - w[0]).max(1.0))
        .chain(std::iter::once(1.0))
        .collect();

    let half = (n_chroma / 2.0).round();
    let mut wts: Vec<Vec<f64>> = (0..N_CHROMA)
        .map(|c| {
            frqbins
                .iter()
                .zip(&binwidth)
                .map(|(&fb, &bw)| {
                    let d = (fb - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
                    (-0.5 * (2.0 * d / bw).powi(2)).exp()
                })
                .collect()
        })
        .collect();

    // Unit L2 norm per FFT bin
    for j in 0..n_fft {
        let norm = wts.iter().map(|row| row[j] * row[j]).sum::<f64>().sqrt();
        if norm > f64::MIN_POSITIVE {
            for row in wts.iter_mut() {
                row[j] /= norm;
            }
        }
    }

    // Favour the middle of the audible range
    for (j, &fb) in frqbins.iter().enumerate() {
        let octave_weight = (-0.5 * ((fb / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        for row in wts.iter_mut() {
            row[j] *= octave_weight;
        }
    }

    // Rows are A-based until here; rotate so C comes first
    wts.rotate_left(3);

    let n_bins = n_fft / 2 + 1;
    wts.into_iter()
        .map(|row| row[..n_bins].iter().map(|&w| w as f32).collect())
        .collect()
}

/// Chromagram from per-frame power spectra, `12 × frames`. Every frame is
/// scaled so its strongest pitch class is 1; silent frames stay zero.
pub fn chromagram(power: &[Vec<f32>], filterbank: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let per_frame: Vec<Vec<f32>> = power
        .iter()
        .map(|frame| {
            let mut chroma: Vec<f32> = filterbank
                .iter()
                .map(|row| row.iter().zip(frame).map(|(w, p)| w * p).sum())
                .collect();
            let peak = chroma.iter().copied().fold(0.0f32, f32::max);
            if peak > f32::MIN_POSITIVE {
                for c in chroma.iter_mut() {
                    *c /= peak;
                }
            }
            chroma
        })
        .collect();

    transpose(&per_frame, N_CHROMA)
}
