use clap::Parser;
use std::path::PathBuf;

use tonalis::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "tonalis",
    about = "Extract tempo, beats, timbre and other musical features from an audio file"
)]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Directory for the analysis plot
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Analysis sample rate in Hz; input is resampled to it [default: 22050]
    #[arg(short, long)]
    pub sample_rate: Option<u32>,

    /// Skip writing the analysis plot
    #[arg(long)]
    pub no_plot: bool,

    /// Config file (default: tonalis.toml, then ~/.config/tonalis/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write every extracted feature to this JSON file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// TTF font for plot panel titles
    #[arg(long)]
    pub font: Option<PathBuf>,
}

impl Cli {
    /// Fold `cfg` and the command line together. Anything given on the
    /// command line wins; the rest falls back to the config file.
    pub fn merge_config(&mut self, cfg: &mut Config) {
        if let Some(rate) = self.sample_rate {
            cfg.analysis.sample_rate = rate;
        }
        if self.output.is_none() {
            self.output = cfg.output.directory.take();
        }
        if self.font.is_none() {
            self.font = cfg.output.font.take();
        }
    }
}
