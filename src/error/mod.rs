use crate::cd::error::CdError;
use crate::convert::error::ConvertError;
use crate::formats::cue::error::CueError;
use crate::image::error::ImageError;
use std::path::PathBuf;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscConvertoError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CdError(#[from] CdError),

    #[error(transparent)]
    ImageError(#[from] ImageError),

    #[error(transparent)]
    CueError(#[from] CueError),

    #[error(transparent)]
    ConvertError(#[from] ConvertError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("Output {0} already exists, use --force to overwrite it")]
    OutputExists(PathBuf),

    #[error("No image format named {0}")]
    UnknownFormat(String),
}

pub type DiscConvertoResult<T> = result::Result<T, DiscConvertoError>;
