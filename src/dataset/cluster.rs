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

use rand::rngs::StdRng;
use tracing::debug;

use super::{
    segment_loader, target_encoder, track_requirement, Descriptor, ExampleSource, Requirement,
    SegmentDescriptor,
};
use crate::archive::{note_archive_path, NoteArchive};
use crate::audio::SegmentLoader;
use crate::collate::Example;
use crate::config::{ClusterTask, ConfigError, DatasetConfig};
use crate::error::DataError;
use crate::select::{SelectionPolicy, StemRolls};
use crate::target::TargetEncoder;

/// The mixture rolls of every stem in a segment plus per-instrument rolls for
/// the stems chosen by the selection policy.
pub struct ClusterDataset {
    loader: SegmentLoader,
    notes_dir: PathBuf,
    encoder: TargetEncoder,
    policy: SelectionPolicy,
}

impl ClusterDataset {
    pub fn new(config: &DatasetConfig, task: &ClusterTask) -> Result<ClusterDataset, ConfigError> {
        task.validate()?;
        Ok(ClusterDataset {
            loader: segment_loader(config, task.waveform_dir()),
            notes_dir: task.notes_dir().clone(),
            encoder: target_encoder(config),
            policy: task.selection().clone(),
        })
    }
}

impl ExampleSource for ClusterDataset {
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

        let stems: Vec<StemRolls> = archive
            .stems()
            .iter()
            .map(|stem| {
                let targets = self.encoder.encode_notes(start, &stem.notes, &[]);
                StemRolls {
                    key: stem.key.clone(),
                    program: stem.program,
                    onset_roll: targets.onset_roll,
                    frame_roll: targets.frame_roll,
                }
            })
            .collect();

        let geometry = self.encoder.geometry();
        let selection = self
            .policy
            .select(&stems, (geometry.frames_num(), geometry.classes_num()));
        debug!(
            descriptor = descriptor.describe(),
            stems = stems.len(),
            selected = ?selection.keys,
            "Selected instrument stems."
        );

        let mut example = Example::new();
        example.insert("waveform", segment.waveform);
        example.insert_scalar("valid_length", segment.valid_length as f32);
        example.insert("mixture_onset_roll", selection.mixture_onset_roll);
        example.insert("mixture_frame_roll", selection.mixture_frame_roll);
        example.insert("sep_onset_rolls", selection.onset_rolls);
        example.insert("sep_frame_rolls", selection.frame_rolls);
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

    use ndarray::{s, Axis};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    use super::ClusterDataset;
    use crate::config::{ClusterTask, DatasetConfig, Task};
    use crate::dataset::{ExampleSource, SegmentDescriptor};
    use crate::select::{Grouping, Ranking, SelectionPolicy};
    use crate::testutil::{stem, write_json, write_track};

    #[test]
    fn selects_the_most_active_stems() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let waveforms = dir.path().join("waveforms");
        let notes = dir.path().join("notes");
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
                "S00": stem("piano", 0, &[(60, 2.0, 2.5)]),
                "S01": stem("drums", 0, &[(36, 9.0, 9.5)]),
                "S02": stem("bass", 33, &[(40, 2.0, 3.0)]),
                "S03": stem("strings", 48, &[(72, 1.0, 2.4)]),
            }),
        )?;

        let task = ClusterTask::new(
            waveforms,
            notes,
            SelectionPolicy::new(3, Ranking::Activity, Grouping::PerStem)?,
        );
        let config = DatasetConfig::for_task(Task::Cluster(task.clone()))
            .with_geometry(100, 2.0, 10);
        let dataset = ClusterDataset::new(&config, &task)?;

        let example = dataset.example(
            &SegmentDescriptor::new("train", "Track00001", 2.0),
            &mut StdRng::seed_from_u64(0),
        )?;

        let sep = example.get("sep_frame_rolls").ok_or("no sep rolls")?;
        assert_eq!(&[3, 21, 88], sep.shape());
        // bass (11 frames), piano (6 frames), strings held over the start (5 frames).
        assert_eq!(11.0, sep.index_axis(Axis(0), 0).sum());
        assert_eq!(6.0, sep.index_axis(Axis(0), 1).sum());
        assert_eq!(5.0, sep.index_axis(Axis(0), 2).sum());
        assert_eq!(1.0, sep[[0, 0, 40 - 21]]);

        let onsets = example.get("sep_onset_rolls").ok_or("no sep onsets")?;
        assert_eq!(0.0, onsets.slice(s![2, .., ..]).sum());

        let mixture = example.get("mixture_frame_roll").ok_or("no mixture")?;
        assert_eq!(22.0, mixture.sum());
        let mixture = example.get("mixture_onset_roll").ok_or("no mixture")?;
        assert_eq!(2.0, mixture.sum());
        Ok(())
    }
}
