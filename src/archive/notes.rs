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
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::read_json;
use crate::error::DataError;
use crate::target::NoteEvent;

#[derive(Deserialize)]
struct StemEntry {
    plugin_name: String,
    program_num: u8,
    note_event: Vec<NoteEntry>,
}

#[derive(Deserialize)]
struct NoteEntry {
    start: f64,
    end: f64,
    pitch: u8,
    velocity: u8,
}

/// One instrument stem of a track and its notes in absolute time.
#[derive(Clone, Debug, PartialEq)]
pub struct Stem {
    pub key: String,
    pub plugin_name: String,
    pub program: u8,
    pub notes: Vec<NoteEvent>,
}

impl Stem {
    /// True if any note sounds inside `[start, end)`.
    pub fn is_active(&self, start: f64, end: f64) -> bool {
        self.notes.iter().any(|note| note.overlaps(start, end))
    }
}

/// The stems of one track, in the order the archive lists them.
#[derive(Debug)]
pub struct NoteArchive {
    stems: Vec<Stem>,
}

impl NoteArchive {
    pub fn open(path: &Path) -> Result<NoteArchive, DataError> {
        let entries: Map<String, Value> = read_json("note archive", path)?;
        let stems = entries
            .into_iter()
            .map(|(key, value)| {
                let entry: StemEntry =
                    serde_json::from_value(value).map_err(|source| DataError::Json {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Ok(Stem {
                    key,
                    plugin_name: entry.plugin_name,
                    program: entry.program_num,
                    notes: entry
                        .note_event
                        .into_iter()
                        .map(|n| NoteEvent::new(n.start, n.end, n.pitch, n.velocity))
                        .collect(),
                })
            })
            .collect::<Result<Vec<Stem>, DataError>>()?;
        Ok(NoteArchive { stems })
    }

    pub fn stems(&self) -> &[Stem] {
        &self.stems
    }

    /// Positions of the stems with a note inside `[start, end)`.
    pub fn active_stems(&self, start: f64, end: f64) -> Vec<usize> {
        self.stems
            .iter()
            .enumerate()
            .filter(|(_, stem)| stem.is_active(start, end))
            .map(|(i, _)| i)
            .collect()
    }
}
