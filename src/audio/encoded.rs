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
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::{downmix, track_path, TrackReader, TrackStore};
use crate::error::DataError;

/// Tracks in any container symphonia can decode (FLAC, OGG, MP3, ...).
///
/// Compressed formats do not support exact sample seeks, so each open decodes
/// the whole track and range reads slice the decoded samples.
#[derive(Clone, Debug)]
pub struct EncodedTrackStore {
    root: PathBuf,
    extension: String,
}

impl EncodedTrackStore {
    pub fn new(root: PathBuf, extension: &str) -> EncodedTrackStore {
        EncodedTrackStore {
            root,
            extension: extension.to_string(),
        }
    }
}

impl TrackStore for EncodedTrackStore {
    fn locate(&self, split: &str, track_id: &str) -> PathBuf {
        track_path(&self.root, split, track_id, &self.extension)
    }

    fn open(&self, split: &str, track_id: &str) -> Result<Box<dyn TrackReader>, DataError> {
        let path = self.locate(split, track_id);
        Ok(Box::new(decode(&path)?))
    }
}

struct DecodedTrack {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl TrackReader for DecodedTrack {
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

fn decode(path: &Path) -> Result<DecodedTrack, DataError> {
    let file = File::open(path).map_err(|e| DataError::from_io("track", path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SymphoniaError::Unsupported("no audio track found"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(SymphoniaError::Unsupported("sample rate not specified"))?;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    while let Some(packet) = next_packet(format_reader.as_mut(), decoder.as_mut())? {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(path = ?path, err = e, "Skipping undecodable packet.");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend(downmix(buffer.samples(), channels));
    }

    Ok(DecodedTrack {
        samples,
        sample_rate,
    })
}

/// Reads the next packet, resetting the decoder when the stream asks for it.
/// Returns `None` at the end of the stream.
fn next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
) -> Result<Option<Packet>, DataError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => decoder.reset(),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        }
    }
}
