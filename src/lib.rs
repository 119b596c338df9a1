//! Music feature extraction: tempo, beats, mel spectrogram, chroma, cepstral
//! timbre, brightness, loudness, onset strength and zero-crossing rate from a
//! single audio file.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod render;
pub mod report;

pub use audio::analysis::{analyze_file, AnalysisObserver, Analyzer, NoopObserver, Stage};
pub use audio::decode::{AudioLoader, SymphoniaLoader, Waveform};
pub use audio::features::{FeatureBundle, FeatureGrid, FeatureName, FeatureValue, Summary};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
