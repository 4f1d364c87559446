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
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array1;
use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::audio::{EncodedTrackStore, SegmentLoader, TrackStore, WavTrackStore};
use crate::collate::Example;
use crate::config::DatasetConfig;
use crate::error::DataError;
use crate::target::TargetEncoder;

mod classification;
mod cluster;
mod compound;
mod count;
mod filter;
mod transcription;

pub use classification::ClassificationDataset;
pub use cluster::ClusterDataset;
pub use compound::{CompoundDataset, CompoundDescriptor};
pub use count::{CountDataset, CountEncoding};
pub use filter::FilterDataset;
pub use transcription::TranscriptionDataset;

/// Builds one training example from a descriptor.
///
/// Implementations are pure functions of the descriptor, their configuration
/// and the supplied random generator, so examples can be built on any thread.
pub trait ExampleSource: Send + Sync {
    type Descriptor: Descriptor;

    fn example(
        &self,
        descriptor: &Self::Descriptor,
        rng: &mut StdRng,
    ) -> Result<Example, DataError>;

    /// The tracks and archives `example` will read for this descriptor.
    fn requirements(&self, descriptor: &Self::Descriptor) -> Vec<Requirement>;
}

/// Identifies one example as requested by the sampler.
pub trait Descriptor: DeserializeOwned + Debug + Send + Sync {
    /// A short human-readable form used in logs and reports.
    fn describe(&self) -> String;

    /// Mixed into the batch seed to give every example its own generator.
    fn seed_key(&self) -> u64 {
        fnv1a(self.describe().as_bytes())
    }
}

/// Something that must exist for an example to be built.
pub enum Requirement {
    /// A track that must be readable with a window starting at `start_time`.
    Track {
        loader: SegmentLoader,
        split: String,
        track_id: String,
        start_time: f64,
    },
    /// An archive file.
    Archive { kind: &'static str, path: PathBuf },
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
    })
}

/// A window of a track: `(split, track_id, start_time)`.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "SegmentRepr")]
pub struct SegmentDescriptor {
    pub split: String,
    pub track_id: String,
    pub start_time: f64,
}

impl SegmentDescriptor {
    pub fn new(split: &str, track_id: &str, start_time: f64) -> SegmentDescriptor {
        SegmentDescriptor {
            split: split.to_string(),
            track_id: track_id.to_string(),
            start_time,
        }
    }
}

/// Segment descriptors are written either as `[split, track_id, start_time]`
/// or as a map with those fields.
#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentRepr {
    List(String, String, f64),
    Map {
        split: String,
        track_id: String,
        start_time: f64,
    },
}

impl From<SegmentRepr> for SegmentDescriptor {
    fn from(repr: SegmentRepr) -> SegmentDescriptor {
        match repr {
            SegmentRepr::List(split, track_id, start_time)
            | SegmentRepr::Map {
                split,
                track_id,
                start_time,
            } => SegmentDescriptor {
                split,
                track_id,
                start_time,
            },
        }
    }
}

impl Descriptor for SegmentDescriptor {
    fn describe(&self) -> String {
        format!("{}/{}@{}", self.split, self.track_id, self.start_time)
    }
}

/// A single note of one plugin in a track.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct NoteDescriptor {
    pub split: String,
    pub audio_name: String,
    pub plugin_name: String,
    pub start: f64,
    pub end: f64,
    pub pitch: u8,
    pub velocity: u8,
}

impl Descriptor for NoteDescriptor {
    fn describe(&self) -> String {
        format!(
            "{}/{}@{} {} pitch {}",
            self.split, self.audio_name, self.start, self.plugin_name, self.pitch
        )
    }
}

/// The store for the configured track extension: indexed WAV reads for WAV
/// files, full decoding for everything else.
pub(crate) fn track_store(root: &Path, extension: &str) -> Arc<dyn TrackStore> {
    if extension.eq_ignore_ascii_case("wav") {
        Arc::new(WavTrackStore::with_extension(root.to_path_buf(), extension))
    } else {
        Arc::new(EncodedTrackStore::new(root.to_path_buf(), extension))
    }
}

pub(crate) fn segment_loader(config: &DatasetConfig, root: &Path) -> SegmentLoader {
    SegmentLoader::new(
        track_store(root, config.track_extension()),
        config.sample_rate(),
        config.segment_samples(),
    )
}

pub(crate) fn target_encoder(config: &DatasetConfig) -> TargetEncoder {
    TargetEncoder::new(
        config.roll_geometry(),
        config.extend_pedal(),
        config.note_shift(),
    )
}

/// A one-hot vector over `labels` for `label`.
pub(crate) fn one_hot(labels: &[String], label: &str) -> Result<Array1<f32>, DataError> {
    let index = labels
        .iter()
        .position(|l| l == label)
        .ok_or_else(|| DataError::UnknownLabel(label.to_string()))?;
    let mut target = Array1::zeros(labels.len());
    target[index] = 1.0;
    Ok(target)
}

pub(crate) fn track_requirement(
    loader: &SegmentLoader,
    split: &str,
    track_id: &str,
    start_time: f64,
) -> Requirement {
    Requirement::Track {
        loader: loader.clone(),
        split: split.to_string(),
        track_id: track_id.to_string(),
        start_time,
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use config::{Config, File, FileFormat};
    use ndarray::array;

    use super::{fnv1a, one_hot, Descriptor, NoteDescriptor, SegmentDescriptor};
    use crate::error::DataError;

    #[test]
    fn segment_descriptors_parse_from_lists_and_maps() -> Result<(), Box<dyn Error>> {
        let descriptors: Vec<SegmentDescriptor> = serde_yml::from_str(
            r#"
            - [train, Track00255.h5, 4.0]
            - split: test
              track_id: Track00001
              start_time: 12.5
            "#,
        )?;
        assert_eq!(
            vec![
                SegmentDescriptor::new("train", "Track00255.h5", 4.0),
                SegmentDescriptor::new("test", "Track00001", 12.5),
            ],
            descriptors
        );
        Ok(())
    }

    #[test]
    fn note_descriptors_parse_from_config() -> Result<(), Box<dyn Error>> {
        let descriptor = Config::builder()
            .add_source(File::from_str(
                r#"
                split: train
                audio_name: Track00121
                plugin_name: nylon_guitar2
                start: 73.1091
                end: 73.1827
                pitch: 50
                velocity: 121
                "#,
                FileFormat::Yaml,
            ))
            .build()?
            .try_deserialize::<NoteDescriptor>()?;
        assert_eq!("nylon_guitar2", descriptor.plugin_name);
        assert_eq!(50, descriptor.pitch);
        Ok(())
    }

    #[test]
    fn seed_keys_differ_per_descriptor() {
        let a = SegmentDescriptor::new("train", "Track00001", 0.0);
        let b = SegmentDescriptor::new("train", "Track00001", 10.0);
        assert_eq!(a.seed_key(), a.clone().seed_key());
        assert_ne!(a.seed_key(), b.seed_key());
        assert_eq!(0xcbf29ce484222325, fnv1a(&[]));
    }

    #[test]
    fn one_hot_targets() -> Result<(), DataError> {
        let labels = vec!["piano".to_string(), "bass".to_string()];
        assert_eq!(array![0.0f32, 1.0], one_hot(&labels, "bass")?);
        assert!(matches!(
            one_hot(&labels, "choir"),
            Err(DataError::UnknownLabel(_))
        ));
        Ok(())
    }
}
