//! Error taxonomy for profiling.
//!
//! Only sources that cannot be profiled at all surface as errors: a missing or
//! unreadable input, an unsupported shape, or content the format parser cannot
//! recover from. Partial defects (bad encoding guesses, unparseable cells,
//! sparse keys) degrade into the returned profile instead.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Input file {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported source: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed {format} content: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },

    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProfileError {
    pub fn malformed(format: &'static str, message: impl Into<String>) -> Self {
        ProfileError::Malformed {
            format,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            ProfileError::NotFound(path)
        } else {
            ProfileError::Io { path, source }
        }
    }
}

pub type ProfileResult<T> = std::result::Result<T, ProfileError>;
