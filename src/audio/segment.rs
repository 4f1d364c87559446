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
use std::sync::Arc;

use ndarray::{s, Array1};
use tracing::warn;

use super::{TrackReader, TrackStore};
use crate::error::DataError;
use crate::target::floor_tolerant;

/// A fixed-length window of a track.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Exactly `segment_samples` samples, zero-padded on the right.
    pub waveform: Array1<f32>,
    /// The number of samples actually read from the track.
    pub valid_length: usize,
}

/// Reads fixed-duration windows from a track store.
#[derive(Clone)]
pub struct SegmentLoader {
    store: Arc<dyn TrackStore>,
    sample_rate: u32,
    segment_samples: usize,
}

impl SegmentLoader {
    pub fn new(
        store: Arc<dyn TrackStore>,
        sample_rate: u32,
        segment_samples: usize,
    ) -> SegmentLoader {
        SegmentLoader {
            store,
            sample_rate,
            segment_samples,
        }
    }

    pub fn store(&self) -> &Arc<dyn TrackStore> {
        &self.store
    }

    pub fn segment_samples(&self) -> usize {
        self.segment_samples
    }

    /// Loads the window starting at `start_time` seconds.
    pub fn load(&self, split: &str, track_id: &str, start_time: f64) -> Result<Segment, DataError> {
        let mut track = self.open(split, track_id)?;
        let start = self.start_sample(start_time);
        self.read(track.as_mut(), split, track_id, start)
    }

    /// The first sample of a window starting at `start_time` seconds.
    pub fn start_sample(&self, start_time: f64) -> usize {
        floor_tolerant(start_time * f64::from(self.sample_rate))
    }

    /// Loads a window centered on `onset_time`.
    ///
    /// The window starts half a segment before the onset, clamped at zero. If it
    /// would reach the end of the track it is moved back by one segment.
    pub fn load_centered(
        &self,
        split: &str,
        track_id: &str,
        onset_time: f64,
    ) -> Result<Segment, DataError> {
        let mut track = self.open(split, track_id)?;
        let segment_seconds = self.segment_samples as f64 / f64::from(self.sample_rate);
        let start_time = (onset_time - segment_seconds / 2.0).max(0.0);
        let mut start = self.start_sample(start_time);
        if start + self.segment_samples >= track.len() {
            start = start.saturating_sub(self.segment_samples);
        }
        self.read(track.as_mut(), split, track_id, start)
    }

    /// The number of samples in a track.
    pub fn track_len(&self, split: &str, track_id: &str) -> Result<usize, DataError> {
        Ok(self.open(split, track_id)?.len())
    }

    fn open(&self, split: &str, track_id: &str) -> Result<Box<dyn TrackReader>, DataError> {
        let track = self.store.open(split, track_id)?;
        if track.sample_rate() != self.sample_rate {
            return Err(DataError::SampleRateMismatch {
                path: self.store.locate(split, track_id),
                expected: self.sample_rate,
                found: track.sample_rate(),
            });
        }
        Ok(track)
    }

    fn read(
        &self,
        track: &mut dyn TrackReader,
        split: &str,
        track_id: &str,
        start: usize,
    ) -> Result<Segment, DataError> {
        let samples = track.read_range(start, self.segment_samples)?;
        let valid_length = samples.len();

        let mut waveform = Array1::zeros(self.segment_samples);
        waveform
            .slice_mut(s![..valid_length])
            .assign(&Array1::from(samples));

        if valid_length < self.segment_samples {
            warn!(
                split,
                track = track_id,
                start,
                valid_length,
                segment_samples = self.segment_samples,
                "Segment runs past the end of the track, padding with zeros."
            );
        }

        Ok(Segment {
            waveform,
            valid_length,
        })
    }
}
