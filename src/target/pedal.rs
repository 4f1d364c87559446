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
use std::collections::{HashMap, VecDeque};

use super::window::{NoteEvent, PedalEvent};

/// Holds notes released while the sustain pedal is down until the pedal is released.
///
/// Notes are walked in offset order against each pedal press in turn. When the
/// same pitch is struck again inside one press, the earlier note ends where the
/// later one begins.
pub fn extend_pedal(notes: &[NoteEvent], pedals: &[PedalEvent]) -> Vec<NoteEvent> {
    let mut pending: VecDeque<NoteEvent> = {
        let mut sorted = notes.to_vec();
        sorted.sort_by(|a, b| a.offset_time.total_cmp(&b.offset_time));
        sorted.into()
    };
    let mut presses: Vec<PedalEvent> = pedals.to_vec();
    presses.sort_by(|a, b| a.onset_time.total_cmp(&b.onset_time));

    let mut extended: Vec<NoteEvent> = Vec::with_capacity(notes.len());
    for pedal in presses {
        // Pitch -> position in `extended` of the note currently held by this press.
        let mut held: HashMap<u8, usize> = HashMap::new();
        while let Some(mut note) = pending.pop_front() {
            if pedal.onset_time < note.offset_time && note.offset_time < pedal.offset_time {
                if let Some(earlier) = held.remove(&note.pitch) {
                    extended[earlier].offset_time = note.onset_time;
                }
                note.offset_time = pedal.offset_time;
                held.insert(note.pitch, extended.len());
            }
            let past_pedal = note.offset_time > pedal.offset_time;
            extended.push(note);
            if past_pedal {
                break;
            }
        }
    }
    extended.extend(pending);
    extended
}
