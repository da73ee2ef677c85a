use std::error::Error;
use std::{fmt, io};

/// Errors raised at the boundaries of the solver: problem files, configuration,
/// stored solutions and chromosomes. The optimization core itself never fails.
#[derive(Debug)]
pub enum InputError {
    Io { path: String, source: io::Error },
    Json(serde_json::Error),
    Instance(String),
    Config(String),
    Solution(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "Cannot access {path}: {source}"),
            Self::Json(e) => write!(f, "Malformed JSON: {e}"),
            Self::Instance(message) => write!(f, "Invalid instance: {message}"),
            Self::Config(message) => write!(f, "Invalid configuration: {message}"),
            Self::Solution(message) => write!(f, "Invalid solution: {message}"),
        }
    }
}

impl Error for InputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for InputError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl InputError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
