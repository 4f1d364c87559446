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

use serde::de::DeserializeOwned;

use crate::error::DataError;

mod events;
mod notes;

pub use events::{EventArchive, ProgramEvents};
pub use notes::{NoteArchive, Stem};

/// `<root>/<split>/<track>.json`, for per-track event archives.
pub fn event_archive_path(root: &Path, split: &str, track_id: &str) -> PathBuf {
    root.join(split).join(track_id).with_extension("json")
}

/// `<root>/<track stem>.json`, for note archives.
pub fn note_archive_path(root: &Path, track_id: &str) -> PathBuf {
    root.join(track_stem(track_id)).with_extension("json")
}

/// `<root>/<split>/<track stem>/<stem key>.json`, for per-stem event archives.
pub fn stem_archive_path(root: &Path, split: &str, track_id: &str, stem_key: &str) -> PathBuf {
    root.join(split)
        .join(track_stem(track_id))
        .join(format!("{}.json", stem_key))
}

/// The track identifier without any extension, e.g. `Track00255` for `Track00255.h5`.
pub fn track_stem(track_id: &str) -> String {
    Path::new(track_id)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| track_id.to_string())
}

fn read_json<T: DeserializeOwned>(kind: &'static str, path: &Path) -> Result<T, DataError> {
    let contents = std::fs::read(path).map_err(|e| DataError::from_io(kind, path, e))?;
    serde_json::from_slice(&contents).map_err(|source| DataError::Json {
        path: path.to_path_buf(),
        source,
    })
}
