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
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use hound::{SampleFormat, WavReader, WavSpec};

use super::{downmix, int_scale, track_path, TrackReader, TrackStore};
use crate::error::DataError;

/// Tracks stored as WAV files, read with indexed seeks.
#[derive(Clone, Debug)]
pub struct WavTrackStore {
    root: PathBuf,
    extension: String,
}

impl WavTrackStore {
    pub fn new(root: PathBuf) -> WavTrackStore {
        WavTrackStore::with_extension(root, "wav")
    }

    pub fn with_extension(root: PathBuf, extension: &str) -> WavTrackStore {
        WavTrackStore {
            root,
            extension: extension.to_string(),
        }
    }
}

impl TrackStore for WavTrackStore {
    fn locate(&self, split: &str, track_id: &str) -> PathBuf {
        track_path(&self.root, split, track_id, &self.extension)
    }

    fn open(&self, split: &str, track_id: &str) -> Result<Box<dyn TrackReader>, DataError> {
        let path = self.locate(split, track_id);
        let file = File::open(&path).map_err(|e| DataError::from_io("track", &path, e))?;
        let reader = WavReader::new(BufReader::new(file))?;
        let spec = reader.spec();
        Ok(Box::new(WavTrack { reader, spec }))
    }
}

struct WavTrack {
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
}

impl TrackReader for WavTrack {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn len(&self) -> usize {
        // hound's duration is in frames, one sample per channel.
        self.reader.duration() as usize
    }

    fn read_range(&mut self, start: usize, len: usize) -> Result<Vec<f32>, DataError> {
        let total = self.len();
        if start >= total || len == 0 {
            return Ok(Vec::new());
        }
        let frames = len.min(total - start);
        let channels = usize::from(self.spec.channels);
        let samples = frames * channels;

        self.reader.seek(start as u32)?;
        let interleaved = match self.spec.sample_format {
            SampleFormat::Float => self
                .reader
                .samples::<f32>()
                .take(samples)
                .collect::<Result<Vec<f32>, hound::Error>>()?,
            SampleFormat::Int => {
                let scale = int_scale(self.spec.bits_per_sample);
                self.reader
                    .samples::<i32>()
                    .take(samples)
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<Result<Vec<f32>, hound::Error>>()?
            }
        };

        Ok(downmix(&interleaved, channels))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::WavTrackStore;
    use crate::audio::TrackStore;
    use crate::error::DataError;
    use crate::testutil::{write_track, write_wav_with_bits};

    #[test]
    fn reads_a_range() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        write_track(dir.path(), "train", "track", vec![samples], 16000)?;

        let store = WavTrackStore::new(dir.path().to_path_buf());
        let mut track = store.open("train", "track")?;
        assert_eq!(16000, track.sample_rate());
        assert_eq!(100, track.len());

        let range = track.read_range(10, 5)?;
        assert_eq!(vec![0.10, 0.11, 0.12, 0.13, 0.14], range);

        assert_eq!(5, track.read_range(95, 20)?.len());
        assert!(track.read_range(100, 20)?.is_empty());
        Ok(())
    }

    #[test]
    fn normalizes_sixteen_bit_and_downmixes() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("train"))?;
        write_wav_with_bits(
            dir.path().join("train").join("stereo.wav"),
            vec![vec![32767i16, 0], vec![-32767i16, 16384]],
            16000,
            16,
        )?;

        let store = WavTrackStore::new(dir.path().to_path_buf());
        let mut track = store.open("train", "stereo")?;
        assert_eq!(2, track.len());

        let samples = track.read_range(0, 2)?;
        assert_eq!(0.0, samples[0]);
        assert!((samples[1] - 0.25).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn missing_track_is_not_found() {
        let store = WavTrackStore::new("/nowhere".into());
        assert!(matches!(
            store.open("train", "missing"),
            Err(DataError::NotFound { kind: "track", .. })
        ));
    }
}
