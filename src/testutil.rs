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
use std::{
    error::Error,
    fs::File,
    path::{Path, PathBuf},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use serde_json::{json, Value};

/// Writes one sample vector per channel as an interleaved 32-bit WAV.
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    write_wav_with_bits(path, samples, sample_rate, 32)
}

pub fn write_wav_with_bits<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = samples.iter().map(Vec::len).max().unwrap_or(0);
    assert!(
        samples.iter().all(|channel| channel.len() == frames),
        "Channels must have the same length!"
    );

    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    for frame in 0..frames {
        for channel in &samples {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Writes `<root>/<split>/<track_id>.wav` and returns its path.
pub fn write_track<S: hound::Sample + Copy + 'static>(
    root: &Path,
    split: &str,
    track_id: &str,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<PathBuf, Box<dyn Error>> {
    let dir = root.join(split);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(track_id).with_extension("wav");
    write_wav(path.clone(), samples, sample_rate)?;
    Ok(path)
}

/// Writes a JSON value to the path, creating parent directories.
pub fn write_json(path: &Path, value: &Value) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

/// An event log holding one note per `(pitch, onset, offset)`.
pub fn note_log(notes: &[(u8, f64, f64)]) -> Value {
    let mut timed: Vec<(f64, String)> = Vec::new();
    for &(pitch, onset, offset) in notes {
        timed.push((
            onset,
            format!("note_on channel=0 note={} velocity=100 time=0", pitch),
        ));
        timed.push((
            offset,
            format!("note_off channel=0 note={} velocity=0 time=0", pitch),
        ));
    }
    timed.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (times, events): (Vec<f64>, Vec<String>) = timed.into_iter().unzip();
    json!({ "midi_event": events, "midi_event_time": times })
}

/// A note archive entry for one stem.
pub fn stem(plugin_name: &str, program_num: u8, notes: &[(u8, f64, f64)]) -> Value {
    let note_event: Vec<Value> = notes
        .iter()
        .map(|&(pitch, start, end)| {
            json!({ "start": start, "end": end, "pitch": pitch, "velocity": 100 })
        })
        .collect();
    json!({ "plugin_name": plugin_name, "program_num": program_num, "note_event": note_event })
}
