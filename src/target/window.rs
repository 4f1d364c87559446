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

use midly::num::u7;
use midly::MidiMessage;

use crate::error::DataError;

/// The sustain pedal controller number.
const SUSTAIN_CONTROLLER: u8 = 64;

/// A note with absolute or segment-local times, depending on where it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub onset_time: f64,
    pub offset_time: f64,
    /// The MIDI note number.
    pub pitch: u8,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn new(onset_time: f64, offset_time: f64, pitch: u8, velocity: u8) -> NoteEvent {
        NoteEvent {
            onset_time,
            offset_time,
            pitch,
            velocity,
        }
    }

    /// True if any part of the note sounds inside `[start, end)`.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.onset_time < end && self.offset_time > start
    }

    pub(crate) fn shifted(&self, by: f64) -> NoteEvent {
        NoteEvent {
            onset_time: self.onset_time - by,
            offset_time: self.offset_time - by,
            ..*self
        }
    }
}

/// A sustain pedal press.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PedalEvent {
    pub onset_time: f64,
    pub offset_time: f64,
}

impl PedalEvent {
    pub fn new(onset_time: f64, offset_time: f64) -> PedalEvent {
        PedalEvent {
            onset_time,
            offset_time,
        }
    }

    pub(crate) fn shifted(&self, by: f64) -> PedalEvent {
        PedalEvent {
            onset_time: self.onset_time - by,
            offset_time: self.offset_time - by,
        }
    }
}

/// Parses a textual event descriptor such as `note_on channel=0 note=67 velocity=73 time=1440`.
///
/// Returns `None` for descriptor types that carry nothing the encoder uses
/// (tempo, time signature, end of track and so on).
pub fn parse_event(descriptor: &str) -> Result<Option<MidiMessage>, DataError> {
    let mut tokens = descriptor.split_whitespace();
    let kind = match tokens.next() {
        Some(kind) => kind,
        None => return Err(DataError::InvalidEvent(descriptor.to_string())),
    };

    let fields: HashMap<&str, &str> = tokens.filter_map(|token| token.split_once('=')).collect();
    let field = |name: &str| -> Result<u7, DataError> {
        fields
            .get(name)
            .and_then(|value| value.parse::<u8>().ok())
            .and_then(u7::try_from)
            .ok_or_else(|| DataError::InvalidEvent(descriptor.to_string()))
    };

    let message = match kind {
        "note_on" => MidiMessage::NoteOn {
            key: field("note")?,
            vel: field("velocity")?,
        },
        "note_off" => MidiMessage::NoteOff {
            key: field("note")?,
            vel: field("velocity")?,
        },
        "control_change" => MidiMessage::Controller {
            controller: field("control")?,
            value: field("value")?,
        },
        "program_change" => MidiMessage::ProgramChange {
            program: field("program")?,
        },
        _ => return Ok(None),
    };
    Ok(Some(message))
}

/// Notes and pedal presses paired from an event log around one window, in absolute time.
#[derive(Debug, Default)]
pub struct EventWindow {
    pub notes: Vec<NoteEvent>,
    pub pedals: Vec<PedalEvent>,
}

impl EventWindow {
    /// Pairs the events of a log that can sound inside `[start, start + segment_seconds]`.
    ///
    /// Scanning begins as many events before the window as the window itself
    /// holds, so notes held across the window start are still paired. Notes and
    /// pedal presses left open at the end of the scan close at the window end.
    pub fn select(
        start: f64,
        segment_seconds: f64,
        times: &[f64],
        events: &[String],
    ) -> Result<EventWindow, DataError> {
        if times.len() != events.len() {
            return Err(DataError::InvalidEvent(format!(
                "{} event times for {} events",
                times.len(),
                events.len()
            )));
        }

        let end = start + segment_seconds;
        let bgn = times.iter().position(|&t| t > start).unwrap_or(times.len());
        let fin = times.iter().position(|&t| t > end).unwrap_or(times.len());
        let ex_bgn = bgn.saturating_sub(fin - bgn);

        let mut window = EventWindow::default();
        let mut open_notes: HashMap<u8, (f64, u8)> = HashMap::new();
        let mut pedal_onset: Option<f64> = None;

        for i in ex_bgn..fin {
            let time = times[i];
            let message = match parse_event(&events[i])? {
                Some(message) => message,
                None => continue,
            };

            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    let pitch = key.as_int();
                    // A re-strike of a sounding note ends the earlier one.
                    let restruck = open_notes.insert(pitch, (time, vel.as_int()));
                    if let Some((onset, velocity)) = restruck {
                        window
                            .notes
                            .push(NoteEvent::new(onset, time, pitch, velocity));
                    }
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let pitch = key.as_int();
                    if let Some((onset, velocity)) = open_notes.remove(&pitch) {
                        window
                            .notes
                            .push(NoteEvent::new(onset, time, pitch, velocity));
                    }
                }
                MidiMessage::Controller { controller, value }
                    if controller.as_int() == SUSTAIN_CONTROLLER =>
                {
                    if value.as_int() >= 64 {
                        pedal_onset.get_or_insert(time);
                    } else if let Some(onset) = pedal_onset.take() {
                        window.pedals.push(PedalEvent::new(onset, time));
                    }
                }
                _ => {}
            }
        }

        let mut unclosed: Vec<(u8, (f64, u8))> = open_notes.into_iter().collect();
        unclosed.sort_by(|(pa, (oa, _)), (pb, (ob, _))| {
            oa.total_cmp(ob).then(pa.cmp(pb))
        });
        for (pitch, (onset, velocity)) in unclosed {
            window
                .notes
                .push(NoteEvent::new(onset, end, pitch, velocity));
        }
        if let Some(onset) = pedal_onset {
            window.pedals.push(PedalEvent::new(onset, end));
        }

        Ok(window)
    }
}
