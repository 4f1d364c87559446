// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use crate::target::RollGeometry;

pub mod error;
mod task;

pub use error::ConfigError;
pub use task::{
    ClassificationTask, ClusterTask, CompoundTask, CountTask, FilterTask, Task, TranscriptionTask,
};

/// The YAML representation of a dataset: the shared segment geometry plus the
/// task that decides which example generator is built from it.
#[derive(Deserialize, Clone, Debug)]
pub struct DatasetConfig {
    /// The sample rate every track is expected to have.
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,
    /// The duration of one segment.
    #[serde(default = "default_segment_seconds")]
    segment_seconds: f64,
    /// The number of target frames per second.
    #[serde(default = "default_frames_per_second")]
    frames_per_second: u32,
    /// The MIDI note mapped to pitch index 0.
    #[serde(default = "default_begin_note")]
    begin_note: u8,
    /// The number of pitch classes in a roll.
    #[serde(default = "default_classes_num")]
    classes_num: usize,
    /// Whether notes are held through sustain pedal intervals.
    #[serde(default = "default_extend_pedal")]
    extend_pedal: bool,
    /// Semitone shift applied to every note before encoding.
    #[serde(default)]
    note_shift: i32,
    /// Seed for the per-example random generators.
    #[serde(default = "default_seed")]
    seed: u64,
    /// Worker threads used for batch construction. Defaults to the CPU count.
    threads: Option<usize>,
    /// The file extension of tracks in the track store.
    #[serde(default = "default_track_extension")]
    track_extension: String,
    /// The dataset variant to build.
    task: Task,
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_segment_seconds() -> f64 {
    10.0
}

fn default_frames_per_second() -> u32 {
    100
}

fn default_begin_note() -> u8 {
    21
}

fn default_classes_num() -> usize {
    88
}

fn default_extend_pedal() -> bool {
    true
}

fn default_seed() -> u64 {
    1234
}

fn default_track_extension() -> String {
    "wav".to_string()
}

impl DatasetConfig {
    /// Deserializes a file from the path into a dataset configuration and validates it.
    pub fn deserialize(path: &Path) -> Result<DatasetConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<DatasetConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if !(self.segment_seconds.is_finite() && self.segment_seconds > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "segment_seconds must be positive, got {}",
                self.segment_seconds
            )));
        }
        if self.frames_per_second == 0 {
            return Err(ConfigError::Invalid(
                "frames_per_second must be positive".into(),
            ));
        }
        if self.classes_num == 0 {
            return Err(ConfigError::Invalid("classes_num must be positive".into()));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be positive".into()));
        }
        self.task.validate()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn segment_seconds(&self) -> f64 {
        self.segment_seconds
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    /// The number of samples in one segment.
    pub fn segment_samples(&self) -> usize {
        crate::target::floor_tolerant(self.segment_seconds * f64::from(self.sample_rate))
    }

    /// The frame/pitch geometry of the rolls produced for one segment.
    pub fn roll_geometry(&self) -> RollGeometry {
        RollGeometry::new(
            self.segment_seconds,
            self.frames_per_second,
            self.begin_note,
            self.classes_num,
        )
    }

    pub fn extend_pedal(&self) -> bool {
        self.extend_pedal
    }

    pub fn note_shift(&self) -> i32 {
        self.note_shift
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Worker threads for batch construction.
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn track_extension(&self) -> &str {
        &self.track_extension
    }

    pub fn task(&self) -> &Task {
        &self.task
    }
}

#[cfg(test)]
impl DatasetConfig {
    /// Creates a config with default geometry for the given task (test only).
    pub fn for_task(task: Task) -> DatasetConfig {
        DatasetConfig {
            sample_rate: default_sample_rate(),
            segment_seconds: default_segment_seconds(),
            frames_per_second: default_frames_per_second(),
            begin_note: default_begin_note(),
            classes_num: default_classes_num(),
            extend_pedal: default_extend_pedal(),
            note_shift: 0,
            seed: default_seed(),
            threads: Some(2),
            track_extension: default_track_extension(),
            task,
        }
    }

    /// Overrides the segment geometry (test only).
    pub fn with_geometry(
        mut self,
        sample_rate: u32,
        segment_seconds: f64,
        frames_per_second: u32,
    ) -> DatasetConfig {
        self.sample_rate = sample_rate;
        self.segment_seconds = segment_seconds;
        self.frames_per_second = frames_per_second;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::PathBuf;

    use config::{Config, File, FileFormat};

    use super::{ConfigError, DatasetConfig, Task};

    fn parse(yaml: &str) -> Result<DatasetConfig, Box<dyn Error>> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<DatasetConfig>()?)
    }

    #[test]
    fn defaults() -> Result<(), Box<dyn Error>> {
        let config = parse(
            r#"
            task:
              type: transcription
              waveform_dir: /data/waveforms
              programs: ["0", "percussion"]
            "#,
        )?;
        config.validate()?;

        assert_eq!(16000, config.sample_rate());
        assert_eq!(160000, config.segment_samples());
        assert_eq!(1001, config.roll_geometry().frames_num());
        assert!(config.extend_pedal());
        assert_eq!(1234, config.seed());
        assert_eq!("wav", config.track_extension());
        match config.task() {
            Task::Transcription(task) => {
                assert_eq!(PathBuf::from("/data/waveforms"), *task.waveform_dir());
                assert!(task.midi_events_dir().is_none());
                assert_eq!(vec!["0", "percussion"], *task.programs());
            }
            _ => panic!("expected transcription task"),
        }
        Ok(())
    }

    #[test]
    fn overridden_geometry() -> Result<(), Box<dyn Error>> {
        let config = parse(
            r#"
            sample_rate: 8000
            segment_seconds: 2
            frames_per_second: 50
            threads: 3
            task:
              type: count
              waveform_dir: /w
              notes_dir: /n
              max_instruments: 4
            "#,
        )?;
        config.validate()?;

        assert_eq!(16000, config.segment_samples());
        assert_eq!(101, config.roll_geometry().frames_num());
        assert_eq!(3, config.threads());
        Ok(())
    }

    #[test]
    fn rejects_zero_segment() -> Result<(), Box<dyn Error>> {
        let config = parse(
            r#"
            segment_seconds: 0
            task:
              type: classification
              waveform_dir: /w
              plugin_labels: [piano]
            "#,
        )?;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn reads_from_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dataset.yaml");
        std::fs::write(
            &path,
            r#"
task:
  type: filter
  waveform_dir: /w
  notes_dir: /n
  stems_dir: /s
  plugin_labels: [piano, bass]
"#,
        )?;

        let config = DatasetConfig::deserialize(&path)?;
        assert!(matches!(config.task(), Task::Filter(_)));
        Ok(())
    }
}
