use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CdError {
    #[error("Invalid address {minutes:02}:{seconds:02}:{frames:02}")]
    InvalidAddress {
        minutes: u8,
        seconds: u8,
        frames: u8,
    },

    #[error("Sector address {0} cannot be expressed as MSF")]
    AddressOutOfRange(i64),

    #[error("Expected {expected} bytes of sector data, got {actual}")]
    InvalidSectorLength { expected: usize, actual: usize },

    #[error("Expected a multiple of {expected} bytes of subchannel data, got {actual}")]
    InvalidSubchannelLength { expected: usize, actual: usize },

    #[error("Sector codec failed: {0}")]
    Codec(String),

    #[error("Track type {0} has no {1} field")]
    UnsupportedTrackType(String, String),
}

pub type CdResult<T> = Result<T, CdError>;
