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

use serde::Deserialize;

use super::ConfigError;
use crate::dataset::CountEncoding;
use crate::select::SelectionPolicy;

/// The dataset variant to build and the stores it reads from.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Waveform plus per-program transcription targets.
    Transcription(TranscriptionTask),
    /// Several transcription datasets mixed into one waveform.
    Compound(CompoundTask),
    /// Single-note instrument classification.
    Classification(ClassificationTask),
    /// Mixture rolls plus per-instrument rolls chosen by a selection policy.
    Cluster(ClusterTask),
    /// The number of instruments playing in a segment.
    Count(CountTask),
    /// One randomly chosen playing instrument and its targets.
    Filter(FilterTask),
}

impl Task {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Task::Transcription(task) => task.validate(),
            Task::Compound(task) => task.validate(),
            Task::Classification(task) => task.validate(),
            // Selection policies are checked when they are built.
            Task::Cluster(_) => Ok(()),
            Task::Count(task) => task.validate(),
            Task::Filter(task) => task.validate(),
        }
    }
}

fn validate_labels(labels: &[String]) -> Result<(), ConfigError> {
    if labels.is_empty() {
        return Err(ConfigError::Invalid(
            "plugin_labels must not be empty".into(),
        ));
    }
    for (i, label) in labels.iter().enumerate() {
        if labels[..i].contains(label) {
            return Err(ConfigError::Invalid(format!(
                "plugin label '{}' is listed twice",
                label
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize, Clone, Debug)]
pub struct TranscriptionTask {
    /// Root of the track store, one subdirectory per split.
    waveform_dir: PathBuf,
    /// Root of the event archives. Without it only the waveform is produced.
    midi_events_dir: Option<PathBuf>,
    /// The program groups to encode, e.g. "0", "33", "percussion".
    #[serde(default)]
    programs: Vec<String>,
}

impl TranscriptionTask {
    pub fn new(
        waveform_dir: PathBuf,
        midi_events_dir: Option<PathBuf>,
        programs: Vec<String>,
    ) -> TranscriptionTask {
        TranscriptionTask {
            waveform_dir,
            midi_events_dir,
            programs,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.midi_events_dir.is_some() && self.programs.is_empty() {
            return Err(ConfigError::Invalid(
                "programs must be set when midi_events_dir is given".into(),
            ));
        }
        Ok(())
    }

    pub fn waveform_dir(&self) -> &PathBuf {
        &self.waveform_dir
    }

    pub fn midi_events_dir(&self) -> Option<&PathBuf> {
        self.midi_events_dir.as_ref()
    }

    pub fn programs(&self) -> &Vec<String> {
        &self.programs
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct CompoundTask {
    /// The component datasets, addressed by position.
    datasets: Vec<TranscriptionTask>,
    /// The dataset whose waveform is rescaled.
    reference: usize,
    /// The dataset whose loudness the reference is matched to.
    loudness_target: usize,
    /// The datasets added to the mixture unscaled. Defaults to every dataset
    /// other than the reference and the loudness target.
    pass_through: Option<Vec<usize>>,
}

impl CompoundTask {
    pub fn new(
        datasets: Vec<TranscriptionTask>,
        reference: usize,
        loudness_target: usize,
        pass_through: Option<Vec<usize>>,
    ) -> CompoundTask {
        CompoundTask {
            datasets,
            reference,
            loudness_target,
            pass_through,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let count = self.datasets.len();
        if count == 0 {
            return Err(ConfigError::Invalid("compound task has no datasets".into()));
        }
        let out_of_range = |index: usize| index >= count;
        if out_of_range(self.reference) || out_of_range(self.loudness_target) {
            return Err(ConfigError::Invalid(format!(
                "reference {} and loudness_target {} must be below {}",
                self.reference, self.loudness_target, count
            )));
        }
        if let Some(pass_through) = &self.pass_through {
            if let Some(index) = pass_through
                .iter()
                .find(|&&i| out_of_range(i) || i == self.reference)
            {
                return Err(ConfigError::Invalid(format!(
                    "pass_through index {} is out of range or the reference",
                    index
                )));
            }
        }
        self.datasets.iter().try_for_each(|task| task.validate())
    }

    pub fn datasets(&self) -> &Vec<TranscriptionTask> {
        &self.datasets
    }

    pub fn reference(&self) -> usize {
        self.reference
    }

    pub fn loudness_target(&self) -> usize {
        self.loudness_target
    }

    /// The datasets mixed in without scaling.
    pub fn pass_through(&self) -> Vec<usize> {
        match &self.pass_through {
            Some(pass_through) => pass_through.clone(),
            None => (0..self.datasets.len())
                .filter(|&i| i != self.reference && i != self.loudness_target)
                .collect(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ClassificationTask {
    waveform_dir: PathBuf,
    /// Plugin names; the position of a name is its class index.
    plugin_labels: Vec<String>,
}

impl ClassificationTask {
    pub fn new(waveform_dir: PathBuf, plugin_labels: Vec<String>) -> ClassificationTask {
        ClassificationTask {
            waveform_dir,
            plugin_labels,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        validate_labels(&self.plugin_labels)
    }

    pub fn waveform_dir(&self) -> &PathBuf {
        &self.waveform_dir
    }

    pub fn plugin_labels(&self) -> &Vec<String> {
        &self.plugin_labels
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ClusterTask {
    waveform_dir: PathBuf,
    notes_dir: PathBuf,
    selection: SelectionPolicy,
}

impl ClusterTask {
    pub fn new(
        waveform_dir: PathBuf,
        notes_dir: PathBuf,
        selection: SelectionPolicy,
    ) -> ClusterTask {
        ClusterTask {
            waveform_dir,
            notes_dir,
            selection,
        }
    }

    /// Selection policies are checked when they are built.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    pub fn waveform_dir(&self) -> &PathBuf {
        &self.waveform_dir
    }

    pub fn notes_dir(&self) -> &PathBuf {
        &self.notes_dir
    }

    pub fn selection(&self) -> &SelectionPolicy {
        &self.selection
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct CountTask {
    waveform_dir: PathBuf,
    notes_dir: PathBuf,
    /// One more than the largest count that is reported.
    max_instruments: usize,
    #[serde(default)]
    encoding: CountEncoding,
}

impl CountTask {
    pub fn new(
        waveform_dir: PathBuf,
        notes_dir: PathBuf,
        max_instruments: usize,
        encoding: CountEncoding,
    ) -> CountTask {
        CountTask {
            waveform_dir,
            notes_dir,
            max_instruments,
            encoding,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_instruments == 0 {
            return Err(ConfigError::Invalid(
                "max_instruments must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn waveform_dir(&self) -> &PathBuf {
        &self.waveform_dir
    }

    pub fn notes_dir(&self) -> &PathBuf {
        &self.notes_dir
    }

    pub fn max_instruments(&self) -> usize {
        self.max_instruments
    }

    pub fn encoding(&self) -> CountEncoding {
        self.encoding
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct FilterTask {
    waveform_dir: PathBuf,
    notes_dir: PathBuf,
    /// Root of the per-stem event archives.
    stems_dir: PathBuf,
    plugin_labels: Vec<String>,
}

impl FilterTask {
    pub fn new(
        waveform_dir: PathBuf,
        notes_dir: PathBuf,
        stems_dir: PathBuf,
        plugin_labels: Vec<String>,
    ) -> FilterTask {
        FilterTask {
            waveform_dir,
            notes_dir,
            stems_dir,
            plugin_labels,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        validate_labels(&self.plugin_labels)
    }

    pub fn waveform_dir(&self) -> &PathBuf {
        &self.waveform_dir
    }

    pub fn notes_dir(&self) -> &PathBuf {
        &self.notes_dir
    }

    pub fn stems_dir(&self) -> &PathBuf {
        &self.stems_dir
    }

    pub fn plugin_labels(&self) -> &Vec<String> {
        &self.plugin_labels
    }
}
