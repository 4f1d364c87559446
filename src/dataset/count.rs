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
use std::path::PathBuf;

use ndarray::{array, Array1};
use rand::rngs::StdRng;
use serde::Deserialize;

use super::{segment_loader, track_requirement, ExampleSource, Requirement, SegmentDescriptor};
use crate::archive::{note_archive_path, NoteArchive};
use crate::audio::SegmentLoader;
use crate::collate::Example;
use crate::config::{ConfigError, CountTask, DatasetConfig};
use crate::error::DataError;

/// How the instrument count is written to the `target` tensor.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountEncoding {
    /// `[count]`.
    #[default]
    Scalar,
    /// A one-hot vector of length `max_instruments`.
    OneHot,
}

/// The number of stems playing in a segment.
pub struct CountDataset {
    loader: SegmentLoader,
    notes_dir: PathBuf,
    segment_seconds: f64,
    max_instruments: usize,
    encoding: CountEncoding,
}

impl CountDataset {
    pub fn new(config: &DatasetConfig, task: &CountTask) -> Result<CountDataset, ConfigError> {
        task.validate()?;
        Ok(CountDataset {
            loader: segment_loader(config, task.waveform_dir()),
            notes_dir: task.notes_dir().clone(),
            segment_seconds: config.segment_seconds(),
            max_instruments: task.max_instruments(),
            encoding: task.encoding(),
        })
    }
}

impl ExampleSource for CountDataset {
    type Descriptor = SegmentDescriptor;

    fn example(
        &self,
        descriptor: &SegmentDescriptor,
        _: &mut StdRng,
    ) -> Result<Example, DataError> {
        let start = descriptor.start_time;
        let segment = self
            .loader
            .load(&descriptor.split, &descriptor.track_id, start)?;
        let archive_path = note_archive_path(&self.notes_dir, &descriptor.track_id);
        let archive = NoteArchive::open(&archive_path)?;

        // Counts saturate one below the number of classes.
        let count = archive
            .active_stems(start, start + self.segment_seconds)
            .len()
            .min(self.max_instruments - 1);
        let target = match self.encoding {
            CountEncoding::Scalar => array![count as f32],
            CountEncoding::OneHot => {
                let mut target = Array1::zeros(self.max_instruments);
                target[count] = 1.0;
                target
            }
        };

        let mut example = Example::new();
        example.insert("waveform", segment.waveform);
        example.insert_scalar("valid_length", segment.valid_length as f32);
        example.insert("target", target);
        Ok(example)
    }

    fn requirements(&self, descriptor: &SegmentDescriptor) -> Vec<Requirement> {
        vec![
            track_requirement(
                &self.loader,
                &descriptor.split,
                &descriptor.track_id,
                descriptor.start_time,
            ),
            Requirement::Archive {
                kind: "note archive",
                path: note_archive_path(&self.notes_dir, &descriptor.track_id),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::Path;

    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    use super::{CountDataset, CountEncoding};
    use crate::config::{ConfigError, CountTask, DatasetConfig, Task};
    use crate::dataset::{ExampleSource, SegmentDescriptor};
    use crate::testutil::{stem, write_json, write_track};

    fn dataset(
        root: &Path,
        max_instruments: usize,
        encoding: CountEncoding,
    ) -> Result<CountDataset, Box<dyn Error>> {
        let waveforms = root.join("waveforms");
        let notes = root.join("notes");
        write_track(
            &waveforms,
            "train",
            "Track00001",
            vec![vec![0.1f32; 400]],
            100,
        )?;
        write_json(
            &notes.join("Track00001.json"),
            &json!({
                "S00": stem("piano", 0, &[(60, 0.5, 1.0)]),
                "S01": stem("drums", 0, &[(36, 1.5, 1.6)]),
                "S02": stem("bass", 33, &[(40, 3.0, 3.5)]),
                "S03": stem("strings", 48, &[(72, 0.0, 3.0)]),
            }),
        )?;

        let task = CountTask::new(waveforms, notes, max_instruments, encoding);
        let config = DatasetConfig::for_task(Task::Count(task.clone()))
            .with_geometry(100, 2.0, 10);
        Ok(CountDataset::new(&config, &task)?)
    }

    fn target(dataset: &CountDataset, start: f64) -> Result<Vec<f32>, Box<dyn Error>> {
        let example = dataset.example(
            &SegmentDescriptor::new("train", "Track00001", start),
            &mut StdRng::seed_from_u64(0),
        )?;
        let target = example.get("target").ok_or("no target")?;
        Ok(target.iter().cloned().collect())
    }

    #[test]
    fn counts_active_stems() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let dataset = dataset(dir.path(), 10, CountEncoding::Scalar)?;

        assert_eq!(vec![3.0], target(&dataset, 0.0)?);
        assert_eq!(vec![2.0], target(&dataset, 2.0)?);
        assert_eq!(vec![0.0], target(&dataset, 10.0)?);
        Ok(())
    }

    #[test]
    fn counts_saturate() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let dataset = dataset(dir.path(), 3, CountEncoding::OneHot)?;

        assert_eq!(array![0.0f32, 0.0, 1.0].to_vec(), target(&dataset, 0.0)?);
        assert_eq!(array![1.0f32, 0.0, 0.0].to_vec(), target(&dataset, 10.0)?);
        Ok(())
    }

    #[test]
    fn zero_instruments_is_rejected() {
        let task = CountTask::new("w".into(), "n".into(), 0, CountEncoding::OneHot);
        let config = DatasetConfig::for_task(Task::Count(task.clone()));

        assert!(matches!(
            CountDataset::new(&config, &task),
            Err(ConfigError::Invalid(_))
        ));
    }
}
