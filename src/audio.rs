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
use std::path::{Path, PathBuf};

use crate::error::DataError;

mod encoded;
#[cfg(test)]
mod memory;
pub mod segment;
mod wav;

pub use encoded::EncodedTrackStore;
#[cfg(test)]
pub use memory::MemoryTrackStore;
pub use segment::{Segment, SegmentLoader};
pub use wav::WavTrackStore;

/// An open track that supports range reads of mono samples.
pub trait TrackReader {
    fn sample_rate(&self) -> u32;

    /// The number of mono samples in the track.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads up to `len` samples starting at `start`. Returns fewer if the
    /// track ends first, and none if `start` is past the end.
    fn read_range(&mut self, start: usize, len: usize) -> Result<Vec<f32>, DataError>;
}

/// A read-only collection of tracks addressed by split and identifier.
pub trait TrackStore: Send + Sync {
    /// Where the track lives, for error messages and reports.
    fn locate(&self, split: &str, track_id: &str) -> PathBuf;

    /// Opens a fresh handle to the track.
    fn open(&self, split: &str, track_id: &str) -> Result<Box<dyn TrackReader>, DataError>;
}

/// Resolves `<root>/<split>/<track_id>` with the store's extension.
pub(crate) fn track_path(root: &Path, split: &str, track_id: &str, extension: &str) -> PathBuf {
    root.join(split).join(track_id).with_extension(extension)
}

/// Averages interleaved frames down to one channel.
pub(crate) fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// The scale that maps full-scale integer PCM of this width to 1.0.
pub(crate) fn int_scale(bits_per_sample: u16) -> f32 {
    let max = (1i64 << (bits_per_sample.clamp(2, 32) - 1)) - 1;
    1.0 / max as f32
}
