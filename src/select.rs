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
use std::cmp::Reverse;

use ndarray::{Array2, Array3, Axis, Zip};
use serde::Deserialize;

use crate::config::ConfigError;
use crate::error::DataError;
use crate::target::{NoteEvent, TargetEncoder};

/// How candidates are ordered before the first `slots` are taken.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    /// Most active first, ties in archive order.
    #[default]
    Activity,
    /// The first candidates with any activity, in archive order.
    FirstActive,
    /// Candidates in their fixed order, silent ones included.
    Fixed,
}

/// A range of MIDI programs routed to one output slot.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramBucket {
    pub low: u8,
    pub high: u8,
    pub slot: usize,
}

impl ProgramBucket {
    fn contains(&self, program: u8) -> bool {
        self.low <= program && program <= self.high
    }
}

/// How stems are turned into selection candidates.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grouping {
    /// Every stem is its own candidate.
    #[default]
    PerStem,
    /// One candidate per slot; stems whose program falls in a bucket are
    /// merged into that bucket's slot, all others into `default_slot`.
    ProgramBuckets {
        buckets: Vec<ProgramBucket>,
        #[serde(default)]
        default_slot: usize,
    },
}

/// Ranking plus grouping over a fixed number of output slots.
///
/// Policies are validated when built, so every bucket routes to an existing slot.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "PolicyRepr")]
pub struct SelectionPolicy {
    slots: usize,
    ranking: Ranking,
    grouping: Grouping,
}

#[derive(Deserialize)]
struct PolicyRepr {
    /// The number of output slots.
    slots: usize,
    #[serde(default)]
    ranking: Ranking,
    #[serde(default)]
    grouping: Grouping,
}

impl TryFrom<PolicyRepr> for SelectionPolicy {
    type Error = ConfigError;

    fn try_from(repr: PolicyRepr) -> Result<SelectionPolicy, ConfigError> {
        SelectionPolicy::new(repr.slots, repr.ranking, repr.grouping)
    }
}

impl SelectionPolicy {
    pub fn new(
        slots: usize,
        ranking: Ranking,
        grouping: Grouping,
    ) -> Result<SelectionPolicy, ConfigError> {
        let policy = SelectionPolicy {
            slots,
            ranking,
            grouping,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn ranking(&self) -> Ranking {
        self.ranking
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 {
            return Err(ConfigError::Invalid(
                "selection slots must be positive".into(),
            ));
        }
        if let Grouping::ProgramBuckets {
            buckets,
            default_slot,
        } = &self.grouping
        {
            if *default_slot >= self.slots {
                return Err(ConfigError::Invalid(format!(
                    "default slot {} is not below {} slots",
                    default_slot, self.slots
                )));
            }
            for bucket in buckets {
                if bucket.slot >= self.slots || bucket.low > bucket.high {
                    return Err(ConfigError::Invalid(format!(
                        "invalid program bucket {:?}",
                        bucket
                    )));
                }
            }
        }
        Ok(())
    }

    /// Selects `slots` candidates from the stems.
    ///
    /// Every roll must share the `[frames, pitches]` shape given by `shape`.
    pub fn select(&self, stems: &[StemRolls], shape: (usize, usize)) -> Selection {
        let mut mixture_onset_roll = Array2::<f32>::zeros(shape);
        let mut mixture_frame_roll = Array2::<f32>::zeros(shape);
        for stem in stems {
            union(&mut mixture_onset_roll, &stem.onset_roll);
            union(&mut mixture_frame_roll, &stem.frame_roll);
        }

        let candidates = self.candidates(stems, shape);
        let chosen: Vec<&Candidate> = match self.ranking {
            Ranking::Activity => {
                let mut ranked: Vec<&Candidate> = candidates.iter().collect();
                // Stable, so equal activity keeps archive order.
                ranked.sort_by_key(|candidate| Reverse(candidate.activity));
                ranked.into_iter().take(self.slots).collect()
            }
            Ranking::FirstActive => candidates
                .iter()
                .filter(|candidate| candidate.activity > 0)
                .take(self.slots)
                .collect(),
            Ranking::Fixed => candidates.iter().take(self.slots).collect(),
        };

        let (frames, pitches) = shape;
        let mut onset_rolls = Array3::<f32>::zeros((self.slots, frames, pitches));
        let mut frame_rolls = Array3::<f32>::zeros((self.slots, frames, pitches));
        let mut keys = vec![None; self.slots];
        for (slot, candidate) in chosen.into_iter().enumerate() {
            onset_rolls
                .index_axis_mut(Axis(0), slot)
                .assign(&candidate.onset_roll);
            frame_rolls
                .index_axis_mut(Axis(0), slot)
                .assign(&candidate.frame_roll);
            keys[slot] = candidate.key.clone();
        }

        Selection {
            onset_rolls,
            frame_rolls,
            keys,
            mixture_onset_roll,
            mixture_frame_roll,
        }
    }

    fn candidates(&self, stems: &[StemRolls], shape: (usize, usize)) -> Vec<Candidate> {
        match &self.grouping {
            Grouping::PerStem => stems
                .iter()
                .map(|stem| {
                    Candidate::new(
                        Some(stem.key.clone()),
                        stem.onset_roll.clone(),
                        stem.frame_roll.clone(),
                    )
                })
                .collect(),
            Grouping::ProgramBuckets {
                buckets,
                default_slot,
            } => {
                let mut slots: Vec<(Vec<&str>, Array2<f32>, Array2<f32>)> = (0..self.slots)
                    .map(|_| (Vec::new(), Array2::zeros(shape), Array2::zeros(shape)))
                    .collect();
                for stem in stems {
                    let slot = buckets
                        .iter()
                        .find(|bucket| bucket.contains(stem.program))
                        .map(|bucket| bucket.slot)
                        .unwrap_or(*default_slot);
                    let (keys, onset, frame) = &mut slots[slot];
                    keys.push(&stem.key);
                    union(onset, &stem.onset_roll);
                    union(frame, &stem.frame_roll);
                }
                slots
                    .into_iter()
                    .map(|(keys, onset, frame)| {
                        let key = if keys.is_empty() {
                            None
                        } else {
                            Some(keys.join("+"))
                        };
                        Candidate::new(key, onset, frame)
                    })
                    .collect()
            }
        }
    }
}

/// One stem's rolls over a segment.
#[derive(Clone, Debug)]
pub struct StemRolls {
    pub key: String,
    pub program: u8,
    pub onset_roll: Array2<f32>,
    pub frame_roll: Array2<f32>,
}

/// The stacked rolls of the selected candidates plus the mixture of every stem.
#[derive(Debug)]
pub struct Selection {
    /// `[slots, frames, pitches]`, unused slots zero.
    pub onset_rolls: Array3<f32>,
    pub frame_rolls: Array3<f32>,
    /// The stem key(s) in each slot.
    pub keys: Vec<Option<String>>,
    pub mixture_onset_roll: Array2<f32>,
    pub mixture_frame_roll: Array2<f32>,
}

struct Candidate {
    key: Option<String>,
    onset_roll: Array2<f32>,
    frame_roll: Array2<f32>,
    activity: usize,
}

impl Candidate {
    fn new(key: Option<String>, onset_roll: Array2<f32>, frame_roll: Array2<f32>) -> Candidate {
        let activity = activity(&frame_roll);
        Candidate {
            key,
            onset_roll,
            frame_roll,
            activity,
        }
    }
}

/// The number of non-zero cells in a frame roll.
pub fn activity(frame_roll: &Array2<f32>) -> usize {
    frame_roll.iter().filter(|&&v| v != 0.0).count()
}

/// Unions `other` into `into`, clipped to 1.
fn union(into: &mut Array2<f32>, other: &Array2<f32>) {
    Zip::from(into)
        .and(other)
        .for_each(|a, &b| *a = a.max(b).min(1.0));
}

/// Rolls whole note lists keyed by class name into one `[classes, frames, pitches]` frame roll.
///
/// `duration` is the length of the track in seconds; `labels` fixes the class order.
pub fn class_stacked_frame_roll(
    encoder: &TargetEncoder,
    duration: f64,
    labels: &[String],
    classes: &[(String, Vec<NoteEvent>)],
) -> Result<Array3<f32>, DataError> {
    let track = encoder.with_geometry(encoder.geometry().with_segment_seconds(duration));
    let geometry = track.geometry();
    let shape = (labels.len(), geometry.frames_num(), geometry.classes_num());
    let mut stacked = Array3::<f32>::zeros(shape);

    for (name, notes) in classes {
        let class = labels
            .iter()
            .position(|label| label == name)
            .ok_or_else(|| DataError::UnknownLabel(name.clone()))?;
        let frame_roll = track.encode_notes(0.0, notes, &[]).frame_roll;
        let mut slot = stacked.index_axis_mut(Axis(0), class);
        Zip::from(&mut slot)
            .and(&frame_roll)
            .for_each(|a, &b| *a = a.max(b));
    }
    Ok(stacked)
}
