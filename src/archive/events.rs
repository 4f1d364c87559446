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
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::read_json;
use crate::error::DataError;

/// The event log of one program: textual event descriptors and their
/// absolute times in seconds.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ProgramEvents {
    pub midi_event: Vec<String>,
    pub midi_event_time: Vec<f64>,
}

/// Per-program event logs of one track.
#[derive(Debug)]
pub struct EventArchive {
    path: PathBuf,
    programs: HashMap<String, ProgramEvents>,
}

impl EventArchive {
    pub fn open(path: &Path) -> Result<EventArchive, DataError> {
        Ok(EventArchive {
            path: path.to_path_buf(),
            programs: read_json("event archive", path)?,
        })
    }

    /// The event log of a program, e.g. "0" or "percussion".
    pub fn program(&self, program: &str) -> Result<&ProgramEvents, DataError> {
        self.programs
            .get(program)
            .ok_or_else(|| DataError::MissingProgram {
                program: program.to_string(),
                path: self.path.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use serde_json::json;

    use super::EventArchive;
    use crate::error::DataError;
    use crate::testutil::{note_log, write_json};

    #[test]
    fn opens_programs() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("train").join("track.json");
        write_json(
            &path,
            &json!({ "0": note_log(&[(60, 0.5, 1.0)]), "percussion": note_log(&[]) }),
        )?;

        let archive = EventArchive::open(&path)?;
        let piano = archive.program("0")?;
        assert_eq!(vec![0.5, 1.0], piano.midi_event_time);
        assert_eq!(
            "note_on channel=0 note=60 velocity=100 time=0",
            piano.midi_event[0]
        );
        assert!(archive.program("percussion")?.midi_event.is_empty());
        assert!(matches!(
            archive.program("33"),
            Err(DataError::MissingProgram { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_and_malformed_archives() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            EventArchive::open(&dir.path().join("missing.json")),
            Err(DataError::NotFound {
                kind: "event archive",
                ..
            })
        ));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json")?;
        assert!(matches!(
            EventArchive::open(&path),
            Err(DataError::Json { .. })
        ));
        Ok(())
    }
}
