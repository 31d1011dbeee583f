use crate::cd::error::CdError;
use crate::formats::cue::error::CueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CdError(#[from] CdError),

    #[error(transparent)]
    CueError(#[from] CueError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("{count} sectors from {sector} run past the end of track {track}")]
    SectorOutOfRange { sector: u64, count: u64, track: u32 },

    #[error("Can't find track containing sector {0}")]
    TrackNotFound(u64),

    #[error("No track with sequence number {0}")]
    NoSuchTrack(u32),

    #[error("Track {track} starts at {start} after its end {end}")]
    InvalidTrackRange { track: u32, start: u64, end: u64 },

    #[error("Tracks {first} and {second} overlap")]
    OverlappingTracks { first: u32, second: u32 },

    #[error("Track {next} follows track {previous}, sequence numbers must increase")]
    NonMonotonicSequence { previous: u32, next: u32 },

    #[error("Tracks of session {session} are not contiguous")]
    SessionGap { session: u16 },

    #[error("The first session starts at sector {0} instead of 0")]
    FirstSessionNotAtZero(u64),

    #[error("Expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("The image has not been created yet")]
    NotCreated,

    #[error("The image has already been closed")]
    AlreadyClosed,

    #[error("{0} is supported but not implemented")]
    Unimplemented(String),

    #[error("{0} is not supported by this format")]
    UnsupportedByFormat(String),

    #[error("{0} is not present on this media")]
    NotPresentOnMedia(String),

    #[error("{0} is not supported by this kind of disc")]
    NotSupportedByDisc(String),
}

impl ImageError {
    pub fn unimplemented(feature: impl Into<String>) -> Self {
        ImageError::Unimplemented(feature.into())
    }

    pub fn unsupported(feature: impl Into<String>) -> Self {
        ImageError::UnsupportedByFormat(feature.into())
    }

    pub fn not_present(feature: impl Into<String>) -> Self {
        ImageError::NotPresentOnMedia(feature.into())
    }

    /// Whether the failure only says the image can't provide something, as opposed to a broken
    /// image or I/O error.
    pub fn is_capability(&self) -> bool {
        matches!(
            self,
            ImageError::Unimplemented(_)
                | ImageError::UnsupportedByFormat(_)
                | ImageError::NotPresentOnMedia(_)
                | ImageError::NotSupportedByDisc(_)
        )
    }
}

pub type ImageResult<T> = Result<T, ImageError>;
