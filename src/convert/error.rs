use crate::cd::sector::SectorTagType;
use crate::image::error::ImageError;
use crate::image::models::{MediaTagType, MediaType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Output format does not support {0} media")]
    UnsupportedMedia(MediaType),

    #[error("Input image has no long sectors to copy")]
    LongUnsupported,

    #[error("Could not set up output image: {0}")]
    WriteSetupFailed(#[source] ImageError),

    #[error("Could not copy media tag {tag}: {source}")]
    MediaTagFailed {
        tag: MediaTagType,
        #[source]
        source: ImageError,
    },

    #[error("Could not declare tracks on output image: {0}")]
    TrackDeclarationFailed(#[source] ImageError),

    #[error("Could not copy {count} sectors from {start} of track {track}: {source}")]
    SectorCopyFailed {
        track: u32,
        start: u64,
        count: u32,
        #[source]
        source: ImageError,
    },

    #[error("Could not copy {tag} of track {track}: {source}")]
    TagCopyFailed {
        track: u32,
        tag: SectorTagType,
        #[source]
        source: ImageError,
    },

    #[error("Could not copy {what}: {source}")]
    MetadataFailed {
        what: &'static str,
        #[source]
        source: ImageError,
    },

    #[error("Could not close output image: {0}")]
    CloseFailed(#[source] ImageError),

    #[error("Conversion is already {0}")]
    AlreadyRun(String),
}

pub type ConvertResult<T> = Result<T, ConvertError>;
