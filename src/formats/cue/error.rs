use crate::cd::error::CdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CueError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CdError(#[from] CdError),

    #[error("Unknown file type: {0}")]
    InvalidFileType(String),

    #[error("Unknown track type: {0}")]
    InvalidTrackType(String),

    #[error("Unknown track flag: {0}")]
    InvalidFlag(String),

    #[error("Invalid MSF format: {0}")]
    InvalidMSFFormat(String),

    #[error("Invalid quoted string: {0}")]
    InvalidQuotedString(String),

    #[error(transparent)]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    MissingQuoteError(String),

    #[error("Line {line}: {directive} is not allowed here")]
    DirectiveOutOfPlace { line: usize, directive: String },

    #[error("Line {line}: {directive} is missing an argument")]
    MissingArgument { line: usize, directive: String },

    #[error("Track {0} has no INDEX 01")]
    MissingIndex(u32),

    #[error("Cue sheet declares no tracks")]
    NoTracks,
}

pub type CueResult<T> = Result<T, CueError>;
