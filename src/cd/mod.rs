//! Compact disc addressing and sector layout.

pub mod ecc;
pub mod error;
pub mod msf;
pub mod sector;
pub mod subchannel;

pub const SECTOR_SIZE: usize = 2352;
pub const SUBCODE_SIZE: usize = 96;
pub const FRAMES_PER_SECOND: u32 = 75;
/// Frames between MSF 00:00:00 and sector 0.
pub const LEAD_IN_FRAMES: i64 = 150;

pub const SYNC: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

pub use msf::{Msf, from_msf, to_msf};
pub use sector::{SectorTagType, TrackType, sector_size_for, tag_size_for};
pub use subchannel::SubchannelType;
