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
use serde::Deserialize;
use tracing::debug;

use super::{Descriptor, ExampleSource, Requirement, SegmentDescriptor, TranscriptionDataset};
use crate::audio::Segment;
use crate::collate::Example;
use crate::config::{CompoundTask, ConfigError, DatasetConfig};
use crate::error::DataError;
use crate::mix::{mix, MixInput};

/// One segment descriptor per component dataset, in dataset order.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct CompoundDescriptor(pub Vec<SegmentDescriptor>);

impl Descriptor for CompoundDescriptor {
    fn describe(&self) -> String {
        self.0
            .iter()
            .map(Descriptor::describe)
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Several transcription datasets mixed into a single waveform.
///
/// The rolls of every component are kept under their own keys. The reference
/// waveform is rescaled to the loudness of the target waveform and summed with
/// the pass-through waveforms.
pub struct CompoundDataset {
    datasets: Vec<TranscriptionDataset>,
    reference: usize,
    loudness_target: usize,
    pass_through: Vec<usize>,
}

impl CompoundDataset {
    pub fn new(
        config: &DatasetConfig,
        task: &CompoundTask,
    ) -> Result<CompoundDataset, ConfigError> {
        task.validate()?;
        Ok(CompoundDataset {
            datasets: task
                .datasets()
                .iter()
                .map(|task| TranscriptionDataset::new(config, task))
                .collect::<Result<_, _>>()?,
            reference: task.reference(),
            loudness_target: task.loudness_target(),
            pass_through: task.pass_through(),
        })
    }

    fn check_arity(&self, descriptor: &CompoundDescriptor) -> Result<(), DataError> {
        if descriptor.0.len() != self.datasets.len() {
            return Err(DataError::InvalidDescriptor(format!(
                "{} segments for {} datasets",
                descriptor.0.len(),
                self.datasets.len()
            )));
        }
        Ok(())
    }
}

fn input(segment: &Segment) -> MixInput<'_> {
    MixInput {
        waveform: segment.waveform.view(),
        valid_length: segment.valid_length,
    }
}

impl ExampleSource for CompoundDataset {
    type Descriptor = CompoundDescriptor;

    fn example(
        &self,
        descriptor: &CompoundDescriptor,
        _: &mut StdRng,
    ) -> Result<Example, DataError> {
        self.check_arity(descriptor)?;

        let mut merged = Example::new();
        let mut segments = Vec::with_capacity(self.datasets.len());
        for (dataset, segment) in self.datasets.iter().zip(&descriptor.0) {
            let (segment, rolls) = dataset.segment_and_rolls(segment)?;
            segments.push(segment);
            merged.merge(rolls)?;
        }

        let pass_through: Vec<MixInput> = self
            .pass_through
            .iter()
            .map(|&i| input(&segments[i]))
            .collect();
        let reference = input(&segments[self.reference]);
        let target = input(&segments[self.loudness_target]);
        let (waveform, ratio) = mix(reference, target, &pass_through);
        debug!(
            descriptor = descriptor.describe(),
            ratio, "Mixed compound waveform."
        );

        merged.insert("waveform", waveform);
        Ok(merged)
    }

    fn requirements(&self, descriptor: &CompoundDescriptor) -> Vec<Requirement> {
        self.datasets
            .iter()
            .zip(&descriptor.0)
            .flat_map(|(dataset, segment)| dataset.requirements(segment))
            .collect()
    }
}
