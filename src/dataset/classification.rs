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
use rand::rngs::StdRng;

use super::{one_hot, segment_loader, track_requirement, ExampleSource, NoteDescriptor, Requirement};
use crate::audio::SegmentLoader;
use crate::collate::Example;
use crate::config::{ClassificationTask, ConfigError, DatasetConfig};
use crate::error::DataError;
use crate::target::{single_note_onset_roll, RollGeometry};

/// Single-note instrument classification: a window centered on one note, a
/// triangular onset roll marking the note, and a one-hot plugin target.
pub struct ClassificationDataset {
    loader: SegmentLoader,
    plugin_labels: Vec<String>,
    geometry: RollGeometry,
}

impl ClassificationDataset {
    pub fn new(
        config: &DatasetConfig,
        task: &ClassificationTask,
    ) -> Result<ClassificationDataset, ConfigError> {
        task.validate()?;
        Ok(ClassificationDataset {
            loader: segment_loader(config, task.waveform_dir()),
            plugin_labels: task.plugin_labels().clone(),
            geometry: config.roll_geometry(),
        })
    }
}

impl ExampleSource for ClassificationDataset {
    type Descriptor = NoteDescriptor;

    fn example(&self, descriptor: &NoteDescriptor, _: &mut StdRng) -> Result<Example, DataError> {
        let target = one_hot(&self.plugin_labels, &descriptor.plugin_name)?;
        let onset_roll = single_note_onset_roll(&self.geometry, descriptor.pitch).ok_or_else(|| {
            DataError::InvalidDescriptor(format!("pitch {} is out of range", descriptor.pitch))
        })?;
        let segment =
            self.loader
                .load_centered(&descriptor.split, &descriptor.audio_name, descriptor.start)?;

        let mut example = Example::new();
        example.insert("waveform", segment.waveform);
        example.insert("onset_roll", onset_roll);
        example.insert("target", target);
        Ok(example)
    }

    fn requirements(&self, descriptor: &NoteDescriptor) -> Vec<Requirement> {
        vec![track_requirement(
            &self.loader,
            &descriptor.split,
            &descriptor.audio_name,
            descriptor.start,
        )]
    }
}
