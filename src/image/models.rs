use crate::cd::sector::{SectorTagType, TrackType, sector_size_for};
use crate::cd::subchannel::SubchannelType;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

bitflags! {
    /// Q subchannel control bits of a track.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TrackFlags: u8 {
        const PRE_EMPHASIS = 0x01;
        const COPY_PERMITTED = 0x02;
        const DATA = 0x04;
        const FOUR_CHANNEL = 0x08;
        const SERIAL_COPY_MANAGEMENT = 0x10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    Binary,
    /// Big endian audio samples.
    Motorola,
    Aiff,
    Wave,
    Mp3,
}

/// Where a track's sectors live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFile {
    pub path: PathBuf,
    /// Byte offset of the first stored sector.
    pub offset: u64,
    pub file_type: FileType,
    /// Bytes per sector as stored, which may be cooked or long.
    pub sector_size: u32,
    /// Leading sectors of the track that are not stored and read back as zeroes.
    pub synthesized_pregap: u64,
    /// Number of sectors actually stored; the rest of the track reads back as zeroes.
    pub stored_sectors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub sequence: u32,
    pub session: u16,
    pub track_type: TrackType,
    /// First absolute sector, pregap included.
    pub start: u64,
    /// Last absolute sector, inclusive.
    pub end: u64,
    pub pregap: u64,
    pub postgap: u64,
    pub subchannel: SubchannelType,
    pub flags: TrackFlags,
    pub isrc: Option<String>,
    /// Index number to absolute sector. Index 0 of the first track may be negative.
    pub indexes: BTreeMap<u16, i64>,
    pub file: Option<TrackFile>,
}

impl Track {
    pub fn new(sequence: u32, session: u16, track_type: TrackType, start: u64, end: u64) -> Self {
        let flags = if track_type.is_audio() {
            TrackFlags::empty()
        } else {
            TrackFlags::DATA
        };

        Self {
            sequence,
            session,
            track_type,
            start,
            end,
            pregap: 0,
            postgap: 0,
            subchannel: SubchannelType::None,
            flags,
            isrc: None,
            indexes: BTreeMap::from([(1, start as i64)]),
            file: None,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, sector: u64) -> bool {
        (self.start..=self.end).contains(&sector)
    }

    pub fn bytes_per_sector(&self) -> u32 {
        sector_size_for(self.track_type, false)
    }

    pub fn raw_bytes_per_sector(&self) -> u32 {
        sector_size_for(self.track_type, true)
    }

    /// Sector where index 1 starts, falling back to the track start.
    pub fn index1(&self) -> i64 {
        self.indexes
            .get(&1)
            .copied()
            .unwrap_or(self.start as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub sequence: u16,
    pub start_track: u32,
    pub end_track: u32,
    pub start_sector: u64,
    pub end_sector: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaType {
    #[default]
    Unknown,
    Cd,
    CdDa,
    CdRom,
    CdRomXa,
    CdPlus,
    CdI,
    CdMixed,
}

impl MediaType {
    pub fn name(&self) -> &'static str {
        match self {
            MediaType::Unknown => "UNKNOWN",
            MediaType::Cd => "CD",
            MediaType::CdDa => "CDDA",
            MediaType::CdRom => "CDROM",
            MediaType::CdRomXa => "CDROMXA",
            MediaType::CdPlus => "CDPLUS",
            MediaType::CdI => "CDI",
            MediaType::CdMixed => "CDMIXED",
        }
    }

    /// Best guess of the media type from a track layout.
    pub fn from_tracks(tracks: &[Track]) -> Self {
        let audio = tracks.iter().filter(|t| t.track_type.is_audio()).count();
        let sessions = tracks
            .iter()
            .map(|t| t.session)
            .max()
            .unwrap_or(1);

        if tracks.iter().any(|t| t.track_type == TrackType::CdI) {
            MediaType::CdI
        } else if audio == tracks.len() {
            MediaType::CdDa
        } else if audio > 0 && sessions > 1 {
            MediaType::CdPlus
        } else if audio > 0 {
            MediaType::CdMixed
        } else if tracks.iter().any(|t| t.track_type.is_mode2()) {
            MediaType::CdRomXa
        } else {
            MediaType::CdRom
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        [
            MediaType::Unknown,
            MediaType::Cd,
            MediaType::CdDa,
            MediaType::CdRom,
            MediaType::CdRomXa,
            MediaType::CdPlus,
            MediaType::CdI,
            MediaType::CdMixed,
        ]
        .into_iter()
        .find(|m| m.name() == normalized)
        .ok_or_else(|| format!("Unknown media type: {s}"))
    }
}

/// Disc level side channel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaTagType {
    CdMcn,
    CdText,
    CdAtip,
    CdPma,
    CdFullToc,
    CdSessionInfo,
}

impl Display for MediaTagType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaTagType::CdMcn => "MCN",
            MediaTagType::CdText => "CD-Text",
            MediaTagType::CdAtip => "ATIP",
            MediaTagType::CdPma => "PMA",
            MediaTagType::CdFullToc => "full TOC",
            MediaTagType::CdSessionInfo => "session info",
        };
        f.write_str(name)
    }
}

/// CD-Text and catalog strings describing the whole disc.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscMetadata {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub arranger: Option<String>,
    pub songwriter: Option<String>,
    pub mcn: Option<String>,
    pub barcode: Option<String>,
    pub disc_id: Option<String>,
    pub comment: Option<String>,
    pub original_media_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub sectors: u64,
    /// Largest cooked sector size on the image.
    pub sector_size: u32,
    pub media_type: MediaType,
    pub readable_sector_tags: Vec<SectorTagType>,
    pub readable_media_tags: Vec<MediaTagType>,
    pub comments: Option<String>,
    pub creator: Option<String>,
    pub application: Option<String>,
    pub application_version: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_modification_time: Option<DateTime<Utc>>,
    pub metadata: DiscMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub start: u64,
    pub end: u64,
}

/// Drive and software that produced a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpHardware {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub firmware: Option<String>,
    pub serial: Option<String>,
    pub software: Option<String>,
    pub extents: Vec<Extent>,
}

/// Sidecar metadata document, carried verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CicmMetadata {
    pub document: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_sizes_come_from_track_type() {
        let track = Track::new(1, 1, TrackType::Mode1, 0, 254);
        assert_eq!(track.len(), 255);
        assert_eq!(track.bytes_per_sector(), 2048);
        assert_eq!(track.raw_bytes_per_sector(), 2352);
        assert_eq!(track.flags, TrackFlags::DATA);
        assert_eq!(track.flags.bits(), 4);
    }

    #[test]
    fn audio_tracks_start_without_flags() {
        let track = Track::new(2, 1, TrackType::Audio, 100, 199);
        assert_eq!(track.flags, TrackFlags::empty());
        assert_eq!(track.index1(), 100);
        assert!(track.contains(199));
        assert!(!track.contains(200));
    }

    #[test]
    fn media_type_guess() {
        let data = Track::new(1, 1, TrackType::Mode1, 0, 9);
        let audio = Track::new(2, 1, TrackType::Audio, 10, 19);
        let mut late_data = Track::new(2, 2, TrackType::Mode2Form1, 10, 19);
        late_data.session = 2;
        let first_audio = Track::new(1, 1, TrackType::Audio, 0, 9);

        assert_eq!(MediaType::from_tracks(&[data.clone()]), MediaType::CdRom);
        assert_eq!(MediaType::from_tracks(&[first_audio.clone()]), MediaType::CdDa);
        assert_eq!(MediaType::from_tracks(&[data, audio]), MediaType::CdMixed);
        assert_eq!(MediaType::from_tracks(&[first_audio, late_data]), MediaType::CdPlus);
    }

    #[test]
    fn media_type_parses_loosely() {
        assert_eq!("CD-ROM".parse::<MediaType>(), Ok(MediaType::CdRom));
        assert_eq!("cdda".parse::<MediaType>(), Ok(MediaType::CdDa));
        assert!("floppy".parse::<MediaType>().is_err());
    }
}
