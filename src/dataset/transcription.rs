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

use super::{
    segment_loader, target_encoder, track_requirement, ExampleSource, Requirement,
    SegmentDescriptor,
};
use crate::archive::{event_archive_path, EventArchive};
use crate::audio::{Segment, SegmentLoader};
use crate::collate::Example;
use crate::config::{ConfigError, DatasetConfig, TranscriptionTask};
use crate::error::DataError;
use crate::target::TargetEncoder;

/// A segment's waveform plus the rolls of every configured program, keyed
/// `<program>_<roll>`.
pub struct TranscriptionDataset {
    loader: SegmentLoader,
    midi_events_dir: Option<PathBuf>,
    programs: Vec<String>,
    encoder: TargetEncoder,
}

impl TranscriptionDataset {
    pub fn new(
        config: &DatasetConfig,
        task: &TranscriptionTask,
    ) -> Result<TranscriptionDataset, ConfigError> {
        task.validate()?;
        Ok(TranscriptionDataset {
            loader: segment_loader(config, task.waveform_dir()),
            midi_events_dir: task.midi_events_dir().cloned(),
            programs: task.programs().clone(),
            encoder: target_encoder(config),
        })
    }

    /// Loads the segment and encodes the program rolls without merging them,
    /// so the waveform can be mixed before it becomes a tensor.
    pub(super) fn segment_and_rolls(
        &self,
        descriptor: &SegmentDescriptor,
    ) -> Result<(Segment, Example), DataError> {
        let SegmentDescriptor {
            split,
            track_id,
            start_time,
        } = descriptor;

        let segment = self.loader.load(split, track_id, *start_time)?;
        let mut rolls = Example::new();
        if let Some(dir) = &self.midi_events_dir {
            let archive = EventArchive::open(&event_archive_path(dir, split, track_id))?;
            for program in &self.programs {
                let events = archive.program(program)?;
                let encoded = self.encoder.process(
                    *start_time,
                    &events.midi_event_time,
                    &events.midi_event,
                )?;
                for (name, roll) in encoded.targets.into_entries() {
                    rolls.insert(format!("{}_{}", program, name), roll);
                }
            }
        }

        Ok((segment, rolls))
    }
}

impl ExampleSource for TranscriptionDataset {
    type Descriptor = SegmentDescriptor;

    fn example(
        &self,
        descriptor: &SegmentDescriptor,
        _: &mut StdRng,
    ) -> Result<Example, DataError> {
        let (segment, mut example) = self.segment_and_rolls(descriptor)?;
        example.insert("waveform", segment.waveform);
        example.insert_scalar("valid_length", segment.valid_length as f32);
        Ok(example)
    }

    fn requirements(&self, descriptor: &SegmentDescriptor) -> Vec<Requirement> {
        let mut requirements = vec![track_requirement(
            &self.loader,
            &descriptor.split,
            &descriptor.track_id,
            descriptor.start_time,
        )];
        if let Some(dir) = &self.midi_events_dir {
            requirements.push(Requirement::Archive {
                kind: "event archive",
                path: event_archive_path(dir, &descriptor.split, &descriptor.track_id),
            });
        }
        requirements
    }
}
