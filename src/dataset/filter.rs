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
use rand::seq::SliceRandom;
use tracing::debug;

use super::{
    one_hot, segment_loader, target_encoder, track_requirement, Descriptor, ExampleSource,
    Requirement, SegmentDescriptor,
};
use crate::archive::{note_archive_path, stem_archive_path, EventArchive, NoteArchive};
use crate::audio::SegmentLoader;
use crate::collate::Example;
use crate::config::{ConfigError, DatasetConfig, FilterTask};
use crate::error::DataError;
use crate::target::TargetEncoder;

/// Per-stem event archives hold their log under this program.
const STEM_PROGRAM: &str = "0";

/// One instrument playing in the segment, picked at random: its plugin as a
/// one-hot target and its own transcription rolls.
pub struct FilterDataset {
    loader: SegmentLoader,
    notes_dir: PathBuf,
    stems_dir: PathBuf,
    plugin_labels: Vec<String>,
    encoder: TargetEncoder,
}

impl FilterDataset {
    pub fn new(config: &DatasetConfig, task: &FilterTask) -> Result<FilterDataset, ConfigError> {
        task.validate()?;
        Ok(FilterDataset {
            loader: segment_loader(config, task.waveform_dir()),
            notes_dir: task.notes_dir().clone(),
            stems_dir: task.stems_dir().clone(),
            plugin_labels: task.plugin_labels().clone(),
            encoder: target_encoder(config),
        })
    }
}

impl ExampleSource for FilterDataset {
    type Descriptor = SegmentDescriptor;

    fn example(
        &self,
        descriptor: &SegmentDescriptor,
        rng: &mut StdRng,
    ) -> Result<Example, DataError> {
        let SegmentDescriptor {
            split,
            track_id,
            start_time,
        } = descriptor;

        let segment = self.loader.load(split, track_id, *start_time)?;
        let archive = NoteArchive::open(&note_archive_path(&self.notes_dir, track_id))?;

        let end = start_time + self.encoder.geometry().segment_seconds();
        let active = archive.active_stems(*start_time, end);
        // With nothing playing, fall back to the first stem.
        let index = active.choose(rng).copied().unwrap_or(0);
        let stem = archive.stems().get(index).ok_or_else(|| {
            DataError::InvalidDescriptor(format!("{} has no stems", descriptor.describe()))
        })?;
        debug!(
            descriptor = descriptor.describe(),
            stem = stem.key,
            plugin = stem.plugin_name,
            active = active.len(),
            "Picked stem."
        );

        let events_path = stem_archive_path(&self.stems_dir, split, track_id, &stem.key);
        let events = EventArchive::open(&events_path)?;
        let events = events.program(STEM_PROGRAM)?;
        let encoded = self
            .encoder
            .process(*start_time, &events.midi_event_time, &events.midi_event)?;

        let mut example = Example::new();
        example.insert("waveform", segment.waveform);
        example.insert_scalar("valid_length", segment.valid_length as f32);
        let plugin_target = one_hot(&self.plugin_labels, &stem.plugin_name)?;
        example.insert("plugin_target", plugin_target);
        for (name, roll) in encoded.targets.into_entries() {
            example.insert(name, roll);
        }
        Ok(example)
    }

    fn requirements(&self, descriptor: &SegmentDescriptor) -> Vec<Requirement> {
        let SegmentDescriptor {
            split,
            track_id,
            start_time,
        } = descriptor;
        let notes = note_archive_path(&self.notes_dir, track_id);

        let mut requirements = vec![
            track_requirement(&self.loader, split, track_id, *start_time),
            Requirement::Archive {
                kind: "note archive",
                path: notes.clone(),
            },
        ];
        // Stem keys come from the note archive; a missing one is reported above.
        if let Ok(archive) = NoteArchive::open(&notes) {
            for stem in archive.stems() {
                requirements.push(Requirement::Archive {
                    kind: "stem event archive",
                    path: stem_archive_path(&self.stems_dir, split, track_id, &stem.key),
                });
            }
        }
        requirements
    }
}
