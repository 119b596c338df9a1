//! Mel filterbank and decibel conversion.
//!
//! The mel scale is the Slaney variant: linear below 1 kHz (200/3 Hz per
//! mel), logarithmic above. Filters are triangles between neighbouring mel
//! centers, scaled to unit area so wide high-frequency bands do not dominate.

use rayon::prelude::*;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

/// Smallest power considered before taking logarithms.
pub const AMIN: f32 = 1e-10;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// One triangular filter, stored as its non-zero span over FFT bins.
#[derive(Clone, Debug)]
struct MelFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct MelFilterbank {
    filters: Vec<MelFilter>,
    n_bins: usize,
}

impl MelFilterbank {
    /// `n_mels` bands spanning `fmin..fmax` Hz over an `n_fft`-point spectrum.
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Self {
        let n_bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..n_bins)
            .map(|i| i as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let min_mel = hz_to_mel(fmin);
        let max_mel = hz_to_mel(fmax);
        let mel_f: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let filters = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (mel_f[m], mel_f[m + 1], mel_f[m + 2]);
                let enorm = 2.0 / (right - left);
                let dense: Vec<f32> = fft_freqs
                    .iter()
                    .map(|&f| {
                        let lower = (f - left) / (center - left);
                        let upper = (right - f) / (right - center);
                        (lower.min(upper).max(0.0) * enorm) as f32
                    })
                    .collect();

                let start_bin = dense.iter().position(|&w| w > 0.0).unwrap_or(0);
                let end_bin = dense.iter().rposition(|&w| w > 0.0).map_or(start_bin, |i| i + 1);
                if end_bin <= start_bin {
                    log::warn!("Mel band {} covers no FFT bins (n_fft too small?)", m);
                }
                MelFilter {
                    start_bin,
                    weights: dense[start_bin..end_bin].to_vec(),
                }
            })
            .collect();

        Self { filters, n_bins }
    }

    pub fn num_bands(&self) -> usize {
        self.filters.len()
    }

    /// Project per-frame power spectra onto the mel bands. Returns
    /// `bands × frames`.
    pub fn apply(&self, power: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let per_frame: Vec<Vec<f32>> = power
            .par_iter()
            .map(|frame| {
                debug_assert_eq!(frame.len(), self.n_bins);
                self.filters
                    .iter()
                    .map(|filter| {
                        frame[filter.start_bin..filter.start_bin + filter.weights.len()]
                            .iter()
                            .zip(&filter.weights)
                            .map(|(p, w)| p * w)
                            .sum()
                    })
                    .collect()
            })
            .collect();

        transpose(&per_frame, self.filters.len())
    }

    #[cfg(test)]
    fn dense_row(&self, band: usize) -> Vec<f32> {
        let filter = &self.filters[band];
        let mut row = vec![0.0; self.n_bins];
        row[filter.start_bin..filter.start_bin + filter.weights.len()]
            .copy_from_slice(&filter.weights);
        row
    }
}

/// `frames × rows` → `rows × frames`.
pub fn transpose(per_frame: &[Vec<f32>], rows: usize) -> Vec<Vec<f32>> {
    (0..rows)
        .map(|r| per_frame.iter().map(|frame| frame[r]).collect())
        .collect()
}

/// Reference level for [`power_to_db`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DbReference {
    /// Fixed reference power
    Value(f32),
    /// The loudest cell of the grid maps to 0 dB
    Max,
}

/// `10 * log10(max(AMIN, S) / max(AMIN, ref))`, floored at `top_db` below
/// the loudest cell.
pub fn power_to_db(grid: &[Vec<f32>], reference: DbReference, top_db: f32) -> Vec<Vec<f32>> {
    let ref_value = match reference {
        DbReference::Value(v) => v.abs(),
        DbReference::Max => grid
            .iter()
            .flat_map(|row| row.iter().copied())
            .fold(0.0f32, f32::max),
    };
    let ref_db = 10.0 * ref_value.max(AMIN).log10();

    let mut db: Vec<Vec<f32>> = grid
        .iter()
        .map(|row| row.iter().map(|&p| 10.0 * p.max(AMIN).log10() - ref_db).collect())
        .collect();

    let peak = db
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - top_db;
    for row in db.iter_mut() {
        for v in row.iter_mut() {
            *v = v.max(floor);
        }
    }
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 100.0, 440.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn filterbank_shape_and_coverage() {
        let fb = MelFilterbank::new(22050, 2048, 128, 0.0, 11025.0);
        assert_eq!(fb.num_bands(), 128);
        for band in 0..128 {
            let row = fb.dense_row(band);
            assert_eq!(row.len(), 1025);
            assert!(row.iter().all(|&w| w >= 0.0));
            assert!(row.iter().any(|&w| w > 0.0), "band {} is empty", band);
        }
        // Triangles climb toward higher frequencies
        let peak_bin = |band: usize| {
            let row = fb.dense_row(band);
            row.iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap()
        };
        assert!(peak_bin(10) < peak_bin(60));
        assert!(peak_bin(60) < peak_bin(120));
    }

    #[test]
    fn apply_projects_to_bands() {
        let fb = MelFilterbank::new(22050, 2048, 40, 0.0, 11025.0);
        let frames = vec![vec![1.0; 1025], vec![0.0; 1025], vec![2.0; 1025]];
        let mel = fb.apply(&frames);
        assert_eq!(mel.len(), 40);
        assert!(mel.iter().all(|row| row.len() == 3));
        for row in &mel {
            assert_eq!(row[1], 0.0);
            assert!((row[2] - 2.0 * row[0]).abs() <= 1e-5 * row[2].abs().max(1.0));
        }
    }

    #[test]
    fn max_reference_puts_peak_at_zero_db() {
        let grid = vec![vec![1.0, 10.0], vec![100.0, 0.0]];
        let db = power_to_db(&grid, DbReference::Max, 80.0);
        assert!((db[1][0] - 0.0).abs() < 1e-5);
        assert!((db[0][1] + 10.0).abs() < 1e-4);
        assert!((db[0][0] + 20.0).abs() < 1e-4);
        // zero power is clipped by top_db
        assert!((db[1][1] + 80.0).abs() < 1e-4);
        assert!(db.iter().flatten().all(|&v| v <= 0.0));
    }

    #[test]
    fn fixed_reference() {
        let grid = vec![vec![1.0, 0.01]];
        let db = power_to_db(&grid, DbReference::Value(1.0), 80.0);
        assert!((db[0][0]).abs() < 1e-6);
        assert!((db[0][1] + 20.0).abs() < 1e-4);
    }

    #[test]
    fn silent_grid_is_finite() {
        let grid = vec![vec![0.0; 4]; 3];
        let db = power_to_db(&grid, DbReference::Max, 80.0);
        assert!(db.iter().flatten().all(|&v| v == 0.0));
    }
}
