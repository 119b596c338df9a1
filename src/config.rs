use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Parameters of the feature-extraction pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// STFT window length in samples
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    #[serde(default = "default_n_mfcc")]
    pub n_mfcc: usize,
    /// Dynamic range floor below the peak, in dB
    #[serde(default = "default_top_db")]
    pub top_db: f32,
    /// Center of the tempo prior (BPM)
    #[serde(default = "default_start_bpm")]
    pub start_bpm: f32,
    /// Beat tracker penalty for deviating from the estimated period
    #[serde(default = "default_tightness")]
    pub tightness: f32,
    #[serde(default = "default_max_tempo")]
    pub max_tempo: f32,
    /// Autocorrelation window for tempo estimation, in seconds
    #[serde(default = "default_ac_size")]
    pub ac_size: f32,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_plot_width")]
    pub plot_width: u32,
    #[serde(default = "default_plot_height")]
    pub plot_height: u32,
    #[serde(default)]
    pub font: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            n_mels: default_n_mels(),
            n_mfcc: default_n_mfcc(),
            top_db: default_top_db(),
            start_bpm: default_start_bpm(),
            tightness: default_tightness(),
            max_tempo: default_max_tempo(),
            ac_size: default_ac_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
            font: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: &str| Err(AnalysisError::InvalidConfig(msg.to_string()));

        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive");
        }
        if self.n_fft < 2 {
            return invalid("n_fft must be at least 2");
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return invalid("hop_length must be in 1..=n_fft");
        }
        if self.n_mels == 0 {
            return invalid("n_mels must be positive");
        }
        if self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return invalid("n_mfcc must be in 1..=n_mels");
        }
        if !(self.top_db > 0.0) {
            return invalid("top_db must be positive");
        }
        if !(self.start_bpm > 0.0 && self.max_tempo > 0.0 && self.ac_size > 0.0) {
            return invalid("start_bpm, max_tempo and ac_size must be positive");
        }
        if !(self.tightness >= 0.0) {
            return invalid("tightness must not be negative");
        }
        Ok(())
    }

    /// Analysis frames per second.
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_length as f32
    }
}

fn default_sample_rate() -> u32 { 22050 }
fn default_n_fft() -> usize { 2048 }
fn default_hop_length() -> usize { 512 }
fn default_n_mels() -> usize { 128 }
fn default_n_mfcc() -> usize { 13 }
fn default_top_db() -> f32 { 80.0 }
fn default_start_bpm() -> f32 { 120.0 }
fn default_tightness() -> f32 { 100.0 }
fn default_max_tempo() -> f32 { 320.0 }
fn default_ac_size() -> f32 { 8.0 }
fn default_plot_width() -> u32 { 1500 }
fn default_plot_height() -> u32 { 1000 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Explicit path first, then `tonalis.toml` in the working directory, then
/// the per-user config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("tonalis.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("tonalis").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("tonalis").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.analysis, AnalysisConfig::default());
        assert_eq!(cfg.output.plot_width, 1500);
        assert!(cfg.output.directory.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [analysis]
            sample_rate = 44100
            n_mels = 64

            [output]
            directory = "plots"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.sample_rate, 44100);
        assert_eq!(cfg.analysis.n_mels, 64);
        assert_eq!(cfg.analysis.n_fft, 2048);
        assert_eq!(cfg.output.directory, Some(PathBuf::from("plots")));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_parameters() {
        let cfg = AnalysisConfig { n_mfcc: 200, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(AnalysisError::InvalidConfig(_))));

        let cfg = AnalysisConfig { hop_length: 0, ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = AnalysisConfig { sample_rate: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn frame_rate_from_hop() {
        let cfg = AnalysisConfig::default();
        assert!((cfg.frame_rate() - 43.066406).abs() < 1e-3);
    }
}
