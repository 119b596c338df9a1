mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use cli::Cli;
use tonalis::config::{self, Config};
use tonalis::render::plot::{plot_path, save_plot, PlotOptions};
use tonalis::render::text::TextOverlay;
use tonalis::report::{print_summary, ProgressObserver};
use tonalis::{analyze_file, Analyzer, FeatureBundle, SymphoniaLoader};

const TITLE_FONT_SIZE: f32 = 16.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();
    let mut cfg = Config::default();

    if let Some(path) = config::find_config(cli.config.as_deref()) {
        match config::load_config(&path) {
            Ok(loaded) => {
                log::info!("Loaded config from {}", path.display());
                cfg = loaded;
            }
            Err(e) if cli.config.is_some() => return Err(e),
            Err(e) => log::warn!("Ignoring config: {:#}", e),
        }
    }
    cli.merge_config(&mut cfg);

    log::info!("Starting analysis of: {}", cli.input.display());
    log::info!(
        "Sample rate: {}Hz ({:.2} frames/s)",
        cfg.analysis.sample_rate,
        cfg.analysis.frame_rate()
    );

    let analyzer = Analyzer::new(cfg.analysis.clone()).context("Invalid analysis settings")?;
    let progress = ProgressObserver::new();
    let bundle = analyze_file(&SymphoniaLoader, &cli.input, &analyzer, &progress)
        .with_context(|| format!("Analysis failed for {}", cli.input.display()))?;
    progress.finish();

    print_summary(&bundle.summary());

    if let Some(ref json_path) = cli.json {
        write_json(&bundle, json_path)?;
        println!("Features written to: {}", json_path.display());
    }

    if !cli.no_plot {
        let options = PlotOptions {
            width: cfg.output.plot_width,
            height: cfg.output.plot_height,
        };
        match write_plot(&bundle, &cli, options) {
            Ok(path) => println!("\nAnalysis plots saved to: {}", path.display()),
            Err(e) => log::error!("Plot not written: {:#}", e),
        }
    }

    Ok(())
}

fn write_json(bundle: &FeatureBundle, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), bundle)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote features to {}", path.display());
    Ok(())
}

fn write_plot(
    bundle: &FeatureBundle,
    cli: &Cli,
    options: PlotOptions,
) -> Result<std::path::PathBuf> {
    if let Some(ref dir) = cli.output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let font = match cli.font {
        Some(ref path) => match TextOverlay::from_file(path, TITLE_FONT_SIZE) {
            Ok(font) => Some(font),
            Err(e) => {
                log::warn!("Plot titles disabled: {:#}", e);
                None
            }
        },
        None => None,
    };

    let path = plot_path(&cli.input, cli.output.as_deref());
    save_plot(bundle, &path, options, font.as_ref())?;
    Ok(path)
}
