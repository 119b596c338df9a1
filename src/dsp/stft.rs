use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::AnalysisError;

/// Magnitude spectra of a centered, Hann-windowed STFT.
#[derive(Clone, Debug)]
pub struct SpectralFrames {
    pub n_fft: usize,
    pub hop_length: usize,
    /// One spectrum per frame, `n_fft / 2 + 1` bins each
    magnitudes: Vec<Vec<f32>>,
}

impl SpectralFrames {
    pub fn num_frames(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn magnitude(&self) -> &[Vec<f32>] {
        &self.magnitudes
    }

    /// |X|² per bin, per frame.
    pub fn power(&self) -> Vec<Vec<f32>> {
        self.magnitudes
            .iter()
            .map(|frame| frame.iter().map(|m| m * m).collect())
            .collect()
    }
}

/// Periodic Hann window, `0.5 - 0.5 cos(2πi / size)`.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
        })
        .collect()
}

/// Frame count of a centered transform over `len` samples.
pub fn num_centered_frames(len: usize, n_fft: usize, hop_length: usize) -> usize {
    let padded = len + 2 * (n_fft / 2);
    1 + (padded - n_fft) / hop_length
}

/// How the signal is extended past its ends before centered framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    Zero,
    Edge,
}

/// Pad by `n_fft / 2` on both sides and cut into overlapping frames, each
/// centered on sample `t * hop_length`.
pub fn centered_frames(
    samples: &[f32],
    n_fft: usize,
    hop_length: usize,
    mode: PadMode,
) -> Vec<Vec<f32>> {
    let pad = n_fft / 2;
    let (first, last) = match mode {
        PadMode::Zero => (0.0, 0.0),
        PadMode::Edge => (
            samples.first().copied().unwrap_or(0.0),
            samples.last().copied().unwrap_or(0.0),
        ),
    };

    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, first);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + 2 * pad, last);

    let n_frames = num_centered_frames(samples.len(), n_fft, hop_length);
    (0..n_frames)
        .map(|t| {
            let start = t * hop_length;
            padded[start..start + n_fft].to_vec()
        })
        .collect()
}

pub fn stft(
    samples: &[f32],
    n_fft: usize,
    hop_length: usize,
) -> Result<SpectralFrames, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::EmptySignal);
    }

    let hann = hann_window(n_fft);
    let frames = centered_frames(samples, n_fft, hop_length, PadMode::Zero);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
    let n_bins = n_fft / 2 + 1;

    let magnitudes: Vec<Vec<f32>> = frames
        .into_par_iter()
        .map(|frame| {
            let mut buffer: Vec<Complex<f32>> = frame
                .iter()
                .zip(hann.iter())
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut buffer);
            buffer[..n_bins].iter().map(|c| c.norm()).collect()
        })
        .collect();

    log::debug!(
        "STFT: {} frames x {} bins (n_fft={}, hop={})",
        magnitudes.len(),
        n_bins,
        n_fft,
        hop_length
    );

    Ok(SpectralFrames {
        n_fft,
        hop_length,
        magnitudes,
    })
}

/// Center frequency of each STFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}
