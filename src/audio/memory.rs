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
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{TrackReader, TrackStore};
use crate::error::DataError;

/// An in-memory track store.
#[derive(Clone, Debug, Default)]
pub struct MemoryTrackStore {
    tracks: HashMap<(String, String), (u32, Arc<Vec<f32>>)>,
}

impl MemoryTrackStore {
    pub fn new() -> MemoryTrackStore {
        MemoryTrackStore::default()
    }

    pub fn insert(&mut self, split: &str, track_id: &str, sample_rate: u32, samples: Vec<f32>) {
        self.tracks.insert(
            (split.to_string(), track_id.to_string()),
            (sample_rate, Arc::new(samples)),
        );
    }
}

impl TrackStore for MemoryTrackStore {
    fn locate(&self, split: &str, track_id: &str) -> PathBuf {
        PathBuf::from(split).join(track_id)
    }

    fn open(&self, split: &str, track_id: &str) -> Result<Box<dyn TrackReader>, DataError> {
        match self.tracks.get(&(split.to_string(), track_id.to_string())) {
            Some((sample_rate, samples)) => Ok(Box::new(MemoryTrack {
                sample_rate: *sample_rate,
                samples: samples.clone(),
            })),
            None => Err(DataError::NotFound {
                kind: "track",
                path: self.locate(split, track_id),
            }),
        }
    }
}

struct MemoryTrack {
    sample_rate: u32,
    samples: Arc<Vec<f32>>,
}

impl TrackReader for MemoryTrack {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn read_range(&mut self, start: usize, len: usize) -> Result<Vec<f32>, DataError> {
        if start >= self.samples.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(len).min(self.samples.len());
        Ok(self.samples[start..end].to_vec())
    }
}
