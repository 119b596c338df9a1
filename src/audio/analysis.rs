use std::path::Path;
use std::time::Instant;

use super::decode::{AudioLoader, Waveform};
use super::features::{FeatureBundle, FeatureGrid};
use crate::config::AnalysisConfig;
use crate::dsp::beat::{beat_track, TempoParams};
use crate::dsp::cepstrum::mfcc;
use crate::dsp::chroma::{chroma_filterbank, chromagram};
use crate::dsp::mel::{power_to_db, DbReference, MelFilterbank};
use crate::dsp::normalize::min_max;
use crate::dsp::onset::onset_strength;
use crate::dsp::spectral::spectral_centroid;
use crate::dsp::stft::{fft_frequencies, stft};
use crate::dsp::temporal::{rms, zero_crossing_rate};
use crate::error::Result;

/// Pipeline steps, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Spectrum,
    MelSpectrogram,
    Timbre,
    Onsets,
    Tempo,
    PitchContent,
    Brightness,
    Volume,
    Transitions,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Spectrum,
        Stage::MelSpectrogram,
        Stage::Timbre,
        Stage::Onsets,
        Stage::Tempo,
        Stage::PitchContent,
        Stage::Brightness,
        Stage::Volume,
        Stage::Transitions,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Spectrum => "spectrum",
            Stage::MelSpectrogram => "mel spectrogram",
            Stage::Timbre => "timbre",
            Stage::Onsets => "onset strength",
            Stage::Tempo => "tempo & beats",
            Stage::PitchContent => "pitch content",
            Stage::Brightness => "brightness",
            Stage::Volume => "volume",
            Stage::Transitions => "transitions",
        }
    }
}

/// Hooks for progress display. Called on the analysis thread, in stage order.
pub trait AnalysisObserver {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage) {}
}

pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {}

/// Runs the feature-extraction pipeline with a fixed configuration.
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(
        &self,
        waveform: &Waveform,
        observer: &dyn AnalysisObserver,
    ) -> Result<FeatureBundle> {
        let cfg = &self.config;
        let samples = waveform.samples();
        let sr = waveform.sample_rate();

        log::info!(
            "Analyzing {} samples @ {}Hz ({:.1}s), n_fft={}, hop={}",
            samples.len(),
            sr,
            waveform.duration(),
            cfg.n_fft,
            cfg.hop_length
        );

        let spectrum = run_stage(observer, Stage::Spectrum, || {
            stft(samples, cfg.n_fft, cfg.hop_length)
        })?;
        let power = spectrum.power();

        let mel_power = run_stage(observer, Stage::MelSpectrogram, || {
            let fb = MelFilterbank::new(sr, cfg.n_fft, cfg.n_mels, 0.0, sr as f64 / 2.0);
            fb.apply(&power)
        });
        let mel_db = power_to_db(&mel_power, DbReference::Max, cfg.top_db);

        let timbre = run_stage(observer, Stage::Timbre, || {
            mfcc(&mel_power, cfg.n_mfcc, cfg.top_db)
        });

        let onsets = run_stage(observer, Stage::Onsets, || {
            let log_mel = power_to_db(&mel_power, DbReference::Value(1.0), cfg.top_db);
            onset_strength(&log_mel, cfg.n_fft, cfg.hop_length)
        });

        let track = run_stage(observer, Stage::Tempo, || {
            let params = TempoParams {
                start_bpm: cfg.start_bpm,
                max_tempo: cfg.max_tempo,
                ac_size: cfg.ac_size,
                tightness: cfg.tightness,
            };
            let frame_rate = sr as f64 / cfg.hop_length as f64;
            beat_track(&onsets, frame_rate, &params)
        });
        log::info!("Tempo: {:.1} BPM, {} beats", track.tempo, track.beats.len());

        let pitch_content = run_stage(observer, Stage::PitchContent, || {
            chromagram(&power, &chroma_filterbank(sr, cfg.n_fft))
        });

        let brightness = run_stage(observer, Stage::Brightness, || {
            spectral_centroid(spectrum.magnitude(), &fft_frequencies(sr, cfg.n_fft))
        });

        let volume = run_stage(observer, Stage::Volume, || {
            min_max(&rms(samples, cfg.n_fft, cfg.hop_length))
        });

        let transitions = run_stage(observer, Stage::Transitions, || {
            zero_crossing_rate(samples, cfg.n_fft, cfg.hop_length)
        });

        Ok(FeatureBundle {
            sample_rate: sr,
            hop_length: cfg.hop_length,
            mel_spectrogram: FeatureGrid::from_rows(mel_db),
            tempo: track.tempo,
            beats: track.beats,
            pitch_content: FeatureGrid::from_rows(pitch_content),
            timbre: FeatureGrid::from_rows(timbre),
            brightness,
            volume,
            onsets,
            transitions,
        })
    }
}

fn run_stage<T>(observer: &dyn AnalysisObserver, stage: Stage, f: impl FnOnce() -> T) -> T {
    observer.stage_started(stage);
    let start = Instant::now();
    let out = f();
    log::debug!("{} done in {:.1?}", stage.label(), start.elapsed());
    observer.stage_finished(stage);
    out
}

/// Load `path` at the analyzer's sample rate and extract every feature.
pub fn analyze_file(
    loader: &impl AudioLoader,
    path: &Path,
    analyzer: &Analyzer,
    observer: &dyn AnalysisObserver,
) -> Result<FeatureBundle> {
    let waveform = loader.load(path, analyzer.config().sample_rate)?;
    analyzer.analyze(&waveform, observer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::beat::SILENCE_TEMPO;
    use crate::dsp::chroma::PITCH_CLASSES;
    use crate::error::AnalysisError;
    use std::cell::RefCell;
    use std::f32::consts::PI;

    const SR: u32 = 22050;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<(Stage, bool)>>,
    }

    impl AnalysisObserver for Recorder {
        fn stage_started(&self, stage: Stage) {
            self.events.borrow_mut().push((stage, false));
        }
        fn stage_finished(&self, stage: Stage) {
            self.events.borrow_mut().push((stage, true));
        }
    }

    struct FixedLoader(Vec<f32>);

    impl AudioLoader for FixedLoader {
        fn load(&self, _path: &Path, target_rate: u32) -> Result<Waveform> {
            Waveform::new(self.0.clone(), target_rate)
        }
    }

    struct MissingLoader;

    impl AudioLoader for MissingLoader {
        fn load(&self, path: &Path, _target_rate: u32) -> Result<Waveform> {
            Err(AnalysisError::NotFound { path: path.to_path_buf() })
        }
    }

    fn analyzer() -> Analyzer {
        Analyzer::new(AnalysisConfig::default()).unwrap()
    }

    fn sine(freq: f32, seconds: f32) -> Waveform {
        let n = (SR as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / SR as f32).sin())
            .collect();
        Waveform::new(samples, SR).unwrap()
    }

    fn click_track(bpm: f32, seconds: f32) -> Waveform {
        let n = (SR as f32 * seconds) as usize;
        let spacing = (60.0 / bpm * SR as f32) as usize;
        let click_len = 400;
        let mut samples = vec![0.0f32; n];
        for start in (0..n).step_by(spacing) {
            for i in 0..click_len.min(n - start) {
                let decay = (-(i as f32) / 80.0).exp();
                samples[start + i] = decay * (2.0 * PI * 1500.0 * i as f32 / SR as f32).sin();
            }
        }
        Waveform::new(samples, SR).unwrap()
    }

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn every_series_shares_the_frame_axis() {
        let bundle = analyzer().analyze(&sine(440.0, 1.0), &NoopObserver).unwrap();
        let frames = 1 + 22050 / 512;
        assert_eq!(bundle.num_frames(), frames);
        assert_eq!(bundle.mel_spectrogram.rows(), 128);
        assert_eq!(bundle.pitch_content.rows(), 12);
        assert_eq!(bundle.timbre.rows(), 13);
        assert_eq!(bundle.pitch_content.frames(), frames);
        assert_eq!(bundle.timbre.frames(), frames);
        assert_eq!(bundle.brightness.len(), frames);
        assert_eq!(bundle.volume.len(), frames);
        assert_eq!(bundle.onsets.len(), frames);
        assert_eq!(bundle.transitions.len(), frames);
    }

    #[test]
    fn silence_degrades_gracefully() {
        let silence = Waveform::new(vec![0.0; SR as usize], SR).unwrap();
        let bundle = analyzer().analyze(&silence, &NoopObserver).unwrap();

        assert_eq!(bundle.tempo, SILENCE_TEMPO);
        assert!(bundle.beats.is_empty());
        assert!(bundle.mel_spectrogram.values().iter().all(|&v| v == 0.0));
        assert!(bundle.pitch_content.values().iter().all(|&v| v == 0.0));
        assert!(bundle.timbre.values().iter().all(|&v| v == 0.0));
        assert!(bundle.brightness.iter().all(|&v| v == 0.0));
        assert!(bundle.onsets.iter().all(|&v| v == 0.0));

        let summary = bundle.summary();
        assert_eq!(summary.mean_volume, 0.0);
        assert_eq!(summary.mean_transitions, 0.0);
    }

    #[test]
    fn a440_brightness_and_pitch_class() {
        let bundle = analyzer().analyze(&sine(440.0, 1.0), &NoopObserver).unwrap();

        let n = bundle.brightness.len();
        let mut inner: Vec<f32> = bundle.brightness[4..n - 4].to_vec();
        inner.sort_by(|a, b| a.total_cmp(b));
        let median = inner[inner.len() / 2];
        assert!((median - 440.0).abs() < 30.0, "median centroid {}", median);

        let chroma_means: Vec<f32> = (0..12)
            .map(|c| bundle.pitch_content.row(c).iter().sum::<f32>())
            .collect();
        assert_eq!(PITCH_CLASSES[argmax(&chroma_means)], "A");
    }

    #[test]
    fn mel_db_peaks_at_zero() {
        let bundle = analyzer().analyze(&sine(440.0, 1.0), &NoopObserver).unwrap();
        let (lo, hi) = bundle.mel_spectrogram.range();
        assert!(hi.abs() < 1e-4);
        assert!(lo >= -80.0 - 1e-3);
    }

    #[test]
    fn volume_is_normalized() {
        let bundle = analyzer().analyze(&sine(440.0, 1.0), &NoopObserver).unwrap();
        let lo = bundle.volume.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = bundle.volume.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(lo, 0.0);
        assert_eq!(hi, 1.0);
        assert!(bundle.transitions.iter().all(|&z| (0.0..=1.0).contains(&z)));
    }

    #[test]
    fn click_track_tempo_and_beats() {
        let bundle = analyzer().analyze(&click_track(120.0, 10.0), &NoopObserver).unwrap();
        assert!((110.0..130.0).contains(&bundle.tempo), "tempo {}", bundle.tempo);
        assert!(bundle.beats.len() >= 10, "{} beats", bundle.beats.len());
        for pair in bundle.beats.windows(2) {
            let gap = pair[1] - pair[0];
            assert!((19..=24).contains(&gap), "beat gap {}", gap);
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let wave = click_track(100.0, 4.0);
        let a = analyzer().analyze(&wave, &NoopObserver).unwrap();
        let b = analyzer().analyze(&wave, &NoopObserver).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn observer_sees_every_stage_in_order() {
        let recorder = Recorder::default();
        analyzer().analyze(&sine(220.0, 0.5), &recorder).unwrap();
        let events = recorder.events.into_inner();
        let expected: Vec<(Stage, bool)> = Stage::ALL
            .iter()
            .flat_map(|&s| [(s, false), (s, true)])
            .collect();
        assert_eq!(events, expected);
    }

    #[test]
    fn missing_file_fails_before_any_stage() {
        let recorder = Recorder::default();
        let err = analyze_file(&MissingLoader, Path::new("nope.wav"), &analyzer(), &recorder)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound { .. }));
        assert!(recorder.events.borrow().is_empty());
    }

    #[test]
    fn injected_loader_feeds_the_pipeline() {
        let loader = FixedLoader(vec![0.25; 4096]);
        let bundle = analyze_file(&loader, Path::new("fixed"), &analyzer(), &NoopObserver).unwrap();
        assert_eq!(bundle.sample_rate, SR);
        assert_eq!(bundle.num_frames(), 1 + 4096 / 512);
    }

    #[test]
    fn single_sample_waveform() {
        let wave = Waveform::new(vec![0.5], SR).unwrap();
        let bundle = analyzer().analyze(&wave, &NoopObserver).unwrap();
        assert_eq!(bundle.num_frames(), 1);
        assert_eq!(bundle.volume, vec![bundle.volume[0]]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = AnalysisConfig { n_mels: 0, ..Default::default() };
        assert!(matches!(Analyzer::new(cfg), Err(AnalysisError::InvalidConfig(_))));
    }
}
