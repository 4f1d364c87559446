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
use std::path::PathBuf;

/// Errors raised while building a training example or a batch.
///
/// Every variant is fatal for the example being built. The caller decides
/// whether to abort the run or skip the batch.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{kind} not found: {}", path.display())]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("example {index} has missing keys {missing:?} and extra keys {extra:?}")]
    ShapeMismatch {
        index: usize,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("tensor '{key}' has shape {found:?} in example {index}, expected {expected:?}")]
    TensorShapeMismatch {
        key: String,
        index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("cannot collate an empty batch")]
    EmptyBatch,

    #[error("duplicate key '{0}' while merging examples")]
    DuplicateKey(String),

    #[error("track {} has sample rate {found}Hz, expected {expected}Hz", path.display())]
    SampleRateMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("program '{program}' not found in {}", path.display())]
    MissingProgram { program: String, path: PathBuf },

    #[error("invalid MIDI event '{0}'")]
    InvalidEvent(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("audio decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive parse error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl DataError {
    /// Maps an IO error to `NotFound` when the file is missing, keeping the path.
    pub fn from_io(kind: &'static str, path: &std::path::Path, err: std::io::Error) -> DataError {
        if err.kind() == std::io::ErrorKind::NotFound {
            DataError::NotFound {
                kind,
                path: path.to_path_buf(),
            }
        } else {
            DataError::Io(std::io::Error::new(
                err.kind(),
                format!("{}: {}", path.display(), err),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::DataError;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = DataError::from_io(
            "track",
            Path::new("/nowhere/track.wav"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, DataError::NotFound { kind: "track", .. }));
        assert_eq!("track not found: /nowhere/track.wav", err.to_string());
    }

    #[test]
    fn other_io_errors_keep_the_path() {
        let err = DataError::from_io(
            "track",
            Path::new("/locked/track.wav"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        match err {
            DataError::Io(e) => assert!(e.to_string().contains("/locked/track.wav")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
