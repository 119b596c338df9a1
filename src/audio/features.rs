use serde::Serialize;

use crate::dsp::normalize::mean;

/// Dense `rows × frames` matrix, row-major.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureGrid {
    rows: usize,
    frames: usize,
    data: Vec<f32>,
}

impl FeatureGrid {
    /// Build from one `Vec` per row. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        let frames = rows.first().map_or(0, |r| r.len());
        debug_assert!(rows.iter().all(|r| r.len() == frames));
        let n_rows = rows.len();
        let data = rows.into_iter().flatten().collect();
        Self {
            rows: n_rows,
            frames,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.frames..(r + 1) * self.frames]
    }

    pub fn get(&self, r: usize, t: usize) -> f32 {
        self.data[r * self.frames + t]
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// (min, max) over all cells, `(0, 0)` when empty.
    pub fn range(&self) -> (f32, f32) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// Everything one analysis produces. Time-indexed entries share the
/// `hop_length` frame axis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureBundle {
    pub sample_rate: u32,
    pub hop_length: usize,
    /// Mel band energies in dB relative to the loudest cell
    pub mel_spectrogram: FeatureGrid,
    /// Beats per minute, 0 for silent input
    pub tempo: f32,
    /// Beat positions as frame indices
    pub beats: Vec<usize>,
    /// 12 pitch classes, C first, each frame peak-normalized
    pub pitch_content: FeatureGrid,
    /// Cepstral coefficients
    pub timbre: FeatureGrid,
    /// Spectral centroid in Hz
    pub brightness: Vec<f32>,
    /// RMS loudness rescaled to [0, 1]
    pub volume: Vec<f32>,
    pub onsets: Vec<f32>,
    /// Zero-crossing rate
    pub transitions: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureName {
    MelSpectrogram,
    Tempo,
    Beats,
    PitchContent,
    Timbre,
    Brightness,
    Volume,
    Onsets,
    Transitions,
}

impl FeatureName {
    pub const ALL: [FeatureName; 9] = [
        FeatureName::MelSpectrogram,
        FeatureName::Tempo,
        FeatureName::Beats,
        FeatureName::PitchContent,
        FeatureName::Timbre,
        FeatureName::Brightness,
        FeatureName::Volume,
        FeatureName::Onsets,
        FeatureName::Transitions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::MelSpectrogram => "mel_spectrogram",
            FeatureName::Tempo => "tempo",
            FeatureName::Beats => "beats",
            FeatureName::PitchContent => "pitch_content",
            FeatureName::Timbre => "timbre",
            FeatureName::Brightness => "brightness",
            FeatureName::Volume => "volume",
            FeatureName::Onsets => "onsets",
            FeatureName::Transitions => "transitions",
        }
    }
}

impl std::fmt::Display for FeatureName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of a single bundle entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FeatureValue<'a> {
    Grid(&'a FeatureGrid),
    Series(&'a [f32]),
    Scalar(f32),
    Frames(&'a [usize]),
}

/// Scalar digest for console reporting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub tempo: f32,
    pub mean_volume: f32,
    pub mean_brightness: f32,
    pub mean_transitions: f32,
    pub beat_count: usize,
    /// Time of the first beat in seconds
    pub first_beat: Option<f32>,
}

impl FeatureBundle {
    pub fn get(&self, name: FeatureName) -> FeatureValue<'_> {
        match name {
            FeatureName::MelSpectrogram => FeatureValue::Grid(&self.mel_spectrogram),
            FeatureName::Tempo => FeatureValue::Scalar(self.tempo),
            FeatureName::Beats => FeatureValue::Frames(&self.beats),
            FeatureName::PitchContent => FeatureValue::Grid(&self.pitch_content),
            FeatureName::Timbre => FeatureValue::Grid(&self.timbre),
            FeatureName::Brightness => FeatureValue::Series(&self.brightness),
            FeatureName::Volume => FeatureValue::Series(&self.volume),
            FeatureName::Onsets => FeatureValue::Series(&self.onsets),
            FeatureName::Transitions => FeatureValue::Series(&self.transitions),
        }
    }

    /// Number of frames on the shared time axis.
    pub fn num_frames(&self) -> usize {
        self.mel_spectrogram.frames()
    }

    /// Start time of frame `t` in seconds.
    pub fn frame_time(&self, t: usize) -> f32 {
        (t * self.hop_length) as f32 / self.sample_rate as f32
    }

    pub fn beat_times(&self) -> Vec<f32> {
        self.beats.iter().map(|&b| self.frame_time(b)).collect()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            tempo: self.tempo,
            mean_volume: mean(&self.volume),
            mean_brightness: mean(&self.brightness),
            mean_transitions: mean(&self.transitions),
            beat_count: self.beats.len(),
            first_beat: self.beat_times().first().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> FeatureBundle {
        let grid = |rows: usize| FeatureGrid::from_rows(vec![vec![0.0; 4]; rows]);
        FeatureBundle {
            sample_rate: 22050,
            hop_length: 512,
            mel_spectrogram: grid(128),
            tempo: 120.0,
            beats: vec![1, 3],
            pitch_content: grid(12),
            timbre: grid(13),
            brightness: vec![100.0, 200.0, 300.0, 400.0],
            volume: vec![0.0, 1.0, 0.5, 0.5],
            onsets: vec![0.0; 4],
            transitions: vec![0.1, 0.1, 0.2, 0.2],
        }
    }

    #[test]
    fn grid_rows_and_cells() {
        let grid = FeatureGrid::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.frames(), 3);
        assert_eq!(grid.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(grid.get(0, 2), 3.0);
        assert_eq!(grid.range(), (1.0, 6.0));
    }

    #[test]
    fn names_are_distinct() {
        let names: std::collections::HashSet<&str> =
            FeatureName::ALL.iter().map(|n| n.as_str()).collect();
        assert_eq!(names.len(), FeatureName::ALL.len());
        assert_eq!(FeatureName::PitchContent.to_string(), "pitch_content");
    }

    #[test]
    fn lookup_by_name() {
        let b = bundle();
        assert_eq!(b.get(FeatureName::Tempo), FeatureValue::Scalar(120.0));
        assert_eq!(b.get(FeatureName::Beats), FeatureValue::Frames(&[1, 3]));
        match b.get(FeatureName::PitchContent) {
            FeatureValue::Grid(g) => assert_eq!(g.rows(), 12),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn summary_means() {
        let s = bundle().summary();
        assert_eq!(s.tempo, 120.0);
        assert!((s.mean_volume - 0.5).abs() < 1e-6);
        assert!((s.mean_brightness - 250.0).abs() < 1e-4);
        assert!((s.mean_transitions - 0.15).abs() < 1e-6);
        assert_eq!(s.beat_count, 2);
        assert!((s.first_beat.unwrap() - 512.0 / 22050.0).abs() < 1e-7);
    }

    #[test]
    fn beat_times_use_hop() {
        let times = bundle().beat_times();
        assert!((times[0] - 512.0 / 22050.0).abs() < 1e-7);
        assert!((times[1] - 1536.0 / 22050.0).abs() < 1e-7);
    }

    #[test]
    fn serializes_with_canonical_names() {
        let json = serde_json::to_value(bundle()).unwrap();
        for name in FeatureName::ALL {
            assert!(json.get(name.as_str()).is_some(), "missing {}", name);
        }
    }
}
