//! Tempo estimation and dynamic-programming beat tracking over an onset
//! strength envelope.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::stft::hann_window;

/// Tempo reported when the onset envelope carries no energy at all.
pub const SILENCE_TEMPO: f32 = 0.0;

/// Std-dev of the log-normal tempo prior, in octaves.
const TEMPO_STD_OCTAVES: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoParams {
    /// Center of the tempo prior in BPM
    pub start_bpm: f32,
    /// Tempi at or above this are never chosen
    pub max_tempo: f32,
    /// Autocorrelation window in seconds
    pub ac_size: f32,
    /// Penalty weight for beat intervals that stray from the period
    pub tightness: f32,
}

impl Default for TempoParams {
    fn default() -> Self {
        Self {
            start_bpm: 120.0,
            max_tempo: 320.0,
            ac_size: 8.0,
            tightness: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BeatTrack {
    pub tempo: f32,
    /// Beat positions as frame indices, ascending
    pub beats: Vec<usize>,
}

/// Estimate tempo and beat frames. `frame_rate` is onset frames per second.
pub fn beat_track(onset_env: &[f32], frame_rate: f64, params: &TempoParams) -> BeatTrack {
    if onset_env.iter().all(|&v| v == 0.0) {
        log::debug!("Onset envelope is silent; tempo defaults to {}", SILENCE_TEMPO);
        return BeatTrack {
            tempo: SILENCE_TEMPO,
            beats: Vec::new(),
        };
    }

    let tempo = estimate_tempo(onset_env, frame_rate, params);
    let beats = track_beats(onset_env, tempo, frame_rate, params.tightness as f64);
    BeatTrack {
        tempo: tempo as f32,
        beats,
    }
}

/// Dominant tempo from the time-averaged autocorrelation tempogram, weighted
/// by a log-normal prior around `start_bpm`.
pub fn estimate_tempo(onset_env: &[f32], frame_rate: f64, params: &TempoParams) -> f64 {
    let win_length = ((params.ac_size as f64 * frame_rate) as usize).max(2);
    let tempogram = mean_tempogram(onset_env, win_length);

    let start = params.start_bpm as f64;
    let max_tempo = params.max_tempo as f64;

    let mut best: Option<(usize, f64)> = None;
    for (lag, &ac) in tempogram.iter().enumerate().skip(1) {
        let bpm = lag_to_bpm(lag, frame_rate);
        if bpm >= max_tempo {
            continue;
        }
        let prior = (-0.5 * ((bpm.log2() - start.log2()) / TEMPO_STD_OCTAVES).powi(2)).exp();
        if prior <= 0.0 {
            continue;
        }
        // FFT round-off can leave tiny negative correlations
        let score = (1e6 * ac.max(0.0)).ln_1p() + prior.ln();
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((lag, score));
        }
    }

    match best {
        Some((lag, _)) => {
            let bpm = lag_to_bpm(lag, frame_rate);
            log::debug!("Tempo: lag {} frames -> {:.2} BPM", lag, bpm);
            bpm
        }
        None => {
            log::warn!(
                "No admissible tempo lag (window {} frames); using {} BPM",
                win_length,
                start
            );
            start
        }
    }
}

fn lag_to_bpm(lag: usize, frame_rate: f64) -> f64 {
    60.0 * frame_rate / lag as f64
}

/// Autocorrelation of a Hann-windowed sliding window over the onset
/// envelope, each frame peak-normalized, averaged over all frames.
fn mean_tempogram(onset_env: &[f32], win_length: usize) -> Vec<f64> {
    let n = onset_env.len();
    let pad = win_length / 2;
    let padded = linear_ramp_pad(onset_env, pad);
    let window = hann_window(win_length);

    let fft_len = (2 * win_length - 1).next_power_of_two();
    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let frames: Vec<Vec<f32>> = (0..n)
        .into_par_iter()
        .map(|t| {
            let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_len];
            for (i, (&x, &w)) in padded[t..t + win_length].iter().zip(&window).enumerate() {
                buffer[i] = Complex::new(x * w, 0.0);
            }
            forward.process(&mut buffer);
            for c in buffer.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            inverse.process(&mut buffer);

            let mut ac: Vec<f32> = buffer[..win_length]
                .iter()
                .map(|c| c.re / fft_len as f32)
                .collect();
            let peak = ac.iter().fold(0.0f32, |m, v| m.max(v.abs()));
            if peak > f32::MIN_POSITIVE {
                for v in ac.iter_mut() {
                    *v /= peak;
                }
            }
            ac
        })
        .collect();

    let mut mean = vec![0.0f64; win_length];
    for ac in &frames {
        for (m, &v) in mean.iter_mut().zip(ac) {
            *m += v as f64;
        }
    }
    for m in mean.iter_mut() {
        *m /= n.max(1) as f64;
    }
    mean
}

/// Pad both ends with a straight ramp from zero to the edge value.
fn linear_ramp_pad(x: &[f32], pad: usize) -> Vec<f32> {
    let first = x.first().copied().unwrap_or(0.0);
    let last = x.last().copied().unwrap_or(0.0);
    let mut out = Vec::with_capacity(x.len() + 2 * pad);
    out.extend((0..pad).map(|j| first * j as f32 / pad as f32));
    out.extend_from_slice(x);
    out.extend((0..pad).map(|j| last * (pad - 1 - j) as f32 / pad as f32));
    out
}

/// Place beats by dynamic programming: each frame's cumulative score is its
/// local onset score plus the best predecessor score, penalised by
/// `tightness * ln(interval / period)²`.
pub fn track_beats(onset_env: &[f32], bpm: f64, frame_rate: f64, tightness: f64) -> Vec<usize> {
    if onset_env.is_empty() || !(bpm > 0.0) {
        return Vec::new();
    }
    let period = ((60.0 * frame_rate / bpm).round() as usize).max(1);

    let local = local_score(&normalize_onsets(onset_env), period);
    let (backlink, cumscore) = beat_dp(&local, period, tightness);

    let Some(tail) = last_beat(&cumscore) else {
        return Vec::new();
    };

    let mut beats = Vec::new();
    let mut n = tail as isize;
    while n >= 0 {
        beats.push(n as usize);
        n = backlink[n as usize];
    }
    beats.reverse();

    trim_beats(&local, beats)
}

/// Scale to unit sample standard deviation.
fn normalize_onsets(onset_env: &[f32]) -> Vec<f64> {
    let n = onset_env.len();
    let mean = onset_env.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let std = if n > 1 {
        (onset_env
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64)
            .sqrt()
    } else {
        0.0
    };
    onset_env
        .iter()
        .map(|&v| v as f64 / (std + f64::MIN_POSITIVE))
        .collect()
}

/// Onsets smoothed by a Gaussian spanning one period either side.
fn local_score(onsets: &[f64], period: usize) -> Vec<f64> {
    let p = period as isize;
    let window: Vec<f64> = (-p..=p)
        .map(|j| (-0.5 * (j as f64 * 32.0 / period as f64).powi(2)).exp())
        .collect();

    let n = onsets.len() as isize;
    (0..n)
        .map(|i| {
            (-p..=p)
                .filter_map(|j| {
                    let k = i - j;
                    (0..n)
                        .contains(&k)
                        .then(|| onsets[k as usize] * window[(j + p) as usize])
                })
                .sum()
        })
        .collect()
}

fn beat_dp(local: &[f64], period: usize, tightness: f64) -> (Vec<isize>, Vec<f64>) {
    let n = local.len();
    let mut backlink = vec![-1isize; n];
    let mut cumscore = vec![0.0f64; n];

    let score_thresh = 0.01 * local.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let nearest = round_half_even_half(period).max(1);
    let farthest = 2 * period;
    let log_period = (period as f64).ln();
    let mut first_beat = true;

    for (i, &score_i) in local.iter().enumerate() {
        let mut best_score = f64::NEG_INFINITY;
        let mut beat_location: isize = -1;

        if i >= nearest {
            let lowest = i.saturating_sub(farthest);
            for loc in (lowest..=i - nearest).rev() {
                let interval = (i - loc) as f64;
                let score = cumscore[loc] - tightness * (interval.ln() - log_period).powi(2);
                if score > best_score {
                    best_score = score;
                    beat_location = loc as isize;
                }
            }
        }

        cumscore[i] = if beat_location >= 0 {
            score_i + best_score
        } else {
            score_i
        };

        if first_beat && score_i < score_thresh {
            backlink[i] = -1;
        } else {
            backlink[i] = beat_location;
            first_beat = false;
        }
    }

    (backlink, cumscore)
}

/// `period / 2` rounded half-to-even.
fn round_half_even_half(period: usize) -> usize {
    let m = period / 2;
    if period % 2 == 0 || m % 2 == 0 {
        m
    } else {
        m + 1
    }
}

/// Last local maximum of the cumulative score that reaches half the median
/// of all local maxima.
fn last_beat(cumscore: &[f64]) -> Option<usize> {
    let n = cumscore.len();
    let is_peak = |i: usize| {
        let prev = if i == 0 { cumscore[0] } else { cumscore[i - 1] };
        let next = if i + 1 == n { cumscore[i] } else { cumscore[i + 1] };
        cumscore[i] > prev && cumscore[i] >= next
    };

    let peaks: Vec<usize> = (0..n).filter(|&i| is_peak(i)).collect();
    if peaks.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = peaks.iter().map(|&i| cumscore[i]).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    let threshold = 0.5 * median;

    peaks.into_iter().rev().find(|&i| cumscore[i] >= threshold)
}

/// Drop weak beats at the start and end, where the smoothed local score
/// falls below half its RMS.
fn trim_beats(local: &[f64], beats: Vec<usize>) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    let scores: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let n = scores.len();
    let smooth: Vec<f64> = (0..n)
        .map(|i| {
            let prev = if i > 0 { scores[i - 1] } else { 0.0 };
            let next = if i + 1 < n { scores[i + 1] } else { 0.0 };
            0.5 * prev + scores[i] + 0.5 * next
        })
        .collect();

    let threshold = 0.5 * (smooth.iter().map(|v| v * v).sum::<f64>() / n as f64).sqrt();
    let first = smooth.iter().position(|&v| v > threshold);
    let last = smooth.iter().rposition(|&v| v > threshold);
    match (first, last) {
        (Some(first), Some(last)) => beats[first..=last].to_vec(),
        _ => Vec::new(),
    }
}
