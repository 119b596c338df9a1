//! Console presentation: the summary table and a per-stage progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

use crate::audio::analysis::{AnalysisObserver, Stage};
use crate::audio::features::Summary;

const INNER_WIDTH: usize = 40;

/// Boxed table of the summary values.
pub fn format_summary(summary: &Summary) -> String {
    let beats = match summary.first_beat {
        Some(t) => format!("Beats: {} (first at {:.2} s)", summary.beat_count, t),
        None => format!("Beats: {}", summary.beat_count),
    };
    let rows = [
        format!("Tempo: {:.1} BPM", summary.tempo),
        beats,
        format!("Average Volume: {:.3}", summary.mean_volume),
        format!("Average Brightness: {:.1} Hz", summary.mean_brightness),
        format!("Signal Complexity: {:.3}", summary.mean_transitions),
    ];

    let width = rows
        .iter()
        .map(|r| r.chars().count() + 1)
        .max()
        .unwrap_or(0)
        .max(INNER_WIDTH);

    let mut out = String::new();
    out.push_str(&format!("╔{}╗\n", "═".repeat(width)));
    for row in &rows {
        out.push_str(&format!("║ {:<w$}║\n", row, w = width - 1));
    }
    out.push_str(&format!("╚{}╝", "═".repeat(width)));
    out
}

pub fn print_summary(summary: &Summary) {
    println!("\nMusic Analysis Results:");
    println!("{}", format_summary(summary));
}

/// Advances one step per finished pipeline stage. Hidden when stderr is not
/// a terminal.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let len = Stage::ALL.len() as u64;
        let bar = if std::io::stderr().is_terminal() {
            ProgressBar::new(len)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("analysis complete");
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisObserver for ProgressObserver {
    fn stage_started(&self, stage: Stage) {
        self.bar.set_message(stage.label());
    }

    fn stage_finished(&self, _stage: Stage) {
        self.bar.inc(1);
    }
}
