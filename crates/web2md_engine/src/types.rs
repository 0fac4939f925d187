use std::fmt;
use std::path::PathBuf;

use crate::decode::DecodeError;
use crate::document::ParseError;
use crate::extract::ExtractionError;
use crate::persist::PersistError;

/// States of a single pipeline run. `Failed` is represented by the `Err`
/// side of each step, tagged with the stage it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Before the pipeline runs: runtime and process setup.
    Startup,
    Fetching,
    Parsing,
    Extracting,
    Converting,
    Writing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Startup => "starting up",
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Extracting => "extracting",
            Stage::Converting => "converting",
            Stage::Writing => "writing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
    /// First characters of the response body, when the server sent one.
    pub body_preview: Option<String>,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            body_preview: None,
        }
    }

    pub fn with_body_preview(mut self, preview: Option<String>) -> Self {
        self.body_preview = preview.filter(|p| !p.is_empty());
        self
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Classified failure of one pipeline run.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {kind}")]
pub struct PipelineError {
    pub stage: Stage,
    pub kind: ErrorKind,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: impl Into<ErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0}")]
    Network(#[from] FetchError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Extraction(#[from] ExtractionError),
    #[error("{0}")]
    FileSystem(#[from] PersistError),
    #[error("{0:#}")]
    Unknown(#[from] anyhow::Error),
}

impl From<DecodeError> for ErrorKind {
    fn from(err: DecodeError) -> Self {
        ErrorKind::Parse(ParseError::Decode(err))
    }
}

impl ErrorKind {
    /// Short label used by diagnostics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Network(_) => "network",
            ErrorKind::Parse(_) => "parse",
            ErrorKind::Extraction(_) => "extraction",
            ErrorKind::FileSystem(_) => "filesystem",
            ErrorKind::Unknown(_) => "unknown",
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub title: Option<String>,
    pub output_path: PathBuf,
    pub bytes_written: u64,
    pub markdown_chars: usize,
}
