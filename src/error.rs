use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Errors that can occur in the st_analysis tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed line {line} in {path}: {message}")]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool} did not finish within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Placeholder paths for I/O errors raised on anonymous readers and writers.
const UNKNOWN_PATH: &str = "<unknown>";
const OUTPUT_PATH: &str = "<output>";

impl Error {
    /// Convenience for wrapping an `io::Error` with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub fn format(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// A failed write to an output not yet named; see [`Error::with_output_path`].
    pub fn write(source: std::io::Error) -> Self {
        Self::io(source, OUTPUT_PATH)
    }

    /// Attach the input path to a format or read error raised on an anonymous reader.
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Format { line, message, .. } => Self::Format {
                path: path.into(),
                line,
                message,
            },
            Self::Io { source, path: old } if old.as_os_str() == UNKNOWN_PATH => Self::Io {
                source,
                path: path.into(),
            },
            other => other,
        }
    }

    /// Attach the output path to an error from [`Error::write`].
    pub fn with_output_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Io { source, path: old } if old.as_os_str() == OUTPUT_PATH => Self::Io {
                source,
                path: path.into(),
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from(UNKNOWN_PATH),
        }
    }
}
