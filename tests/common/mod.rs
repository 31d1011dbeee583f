#![allow(dead_code)]

use disc_converto::cd::sector::SectorTagType;
use disc_converto::cd::subchannel::{QPayload, QSubchannel, SubchannelType};
use disc_converto::cd::{Msf, TrackType};
use disc_converto::image::error::{ImageError, ImageResult};
use disc_converto::image::models::{
    CicmMetadata, DumpHardware, ImageInfo, MediaTagType, MediaType, Session, Track, TrackFlags,
};
use disc_converto::{ImageReader, ImageWriter, MemoryImage};
use std::ops::Range;

/// Raw subchannel of one sector whose Q channel reports a position.
pub fn q_position(track: u8, index: u8, sector: u64) -> Vec<u8> {
    QSubchannel {
        control: 0,
        payload: QPayload::Position {
            track,
            index,
            relative: Msf::default(),
            absolute: Msf::from_lba(sector as i64).unwrap(),
        },
    }
    .to_subchannel(SubchannelType::Raw)
    .unwrap()
}

/// Deterministic user data for a sector.
pub fn pattern(sector: u64, size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (sector as usize * 7 + i * 13) as u8)
        .collect()
}

/// A single mode 1 track of 255 sectors after the lead-in pregap, with subchannel.
pub fn data_disc() -> MemoryImage {
    let mut track = Track::new(1, 1, TrackType::Mode1, 0, 254);
    track.pregap = 150;
    track.flags = TrackFlags::DATA;
    track.indexes.insert(0, -150);
    track.subchannel = SubchannelType::Raw;

    let mut image = MemoryImage::with_tracks(MediaType::CdRom, vec![track]).unwrap();
    for sector in 0..255 {
        image.write_sector(&pattern(sector, 2048), sector).unwrap();
        image
            .write_sectors_tag(&q_position(1, 1, sector), sector, 1, SectorTagType::Subchannel)
            .unwrap();
    }
    image
}

/// A data track followed by two audio tracks, without subchannel.
pub fn mixed_disc() -> MemoryImage {
    let mut data = Track::new(1, 1, TrackType::Mode1, 0, 599);
    data.pregap = 150;
    data.indexes.insert(0, -150);
    let mut audio = Track::new(2, 1, TrackType::Audio, 600, 999);
    audio.pregap = 150;
    audio.indexes = [(0, 600), (1, 750)].into();
    let last = Track::new(3, 1, TrackType::Audio, 1000, 1299);

    let mut image =
        MemoryImage::with_tracks(MediaType::CdMixed, vec![data, audio, last]).unwrap();
    for sector in 0..600 {
        image.write_sector(&pattern(sector, 2048), sector).unwrap();
    }
    for sector in 600..1300 {
        image.write_sector(&pattern(sector, 2352), sector).unwrap();
    }
    image
}

/// Four sessions separated by lead-out and lead-in areas, 51168 sectors in all.
pub fn multisession_tracks() -> Vec<Track> {
    vec![
        Track::new(1, 1, TrackType::Mode1, 0, 8_999),
        Track::new(2, 1, TrackType::Audio, 9_000, 17_999),
        Track::new(3, 2, TrackType::Mode2Form1, 29_400, 35_999),
        Track::new(4, 3, TrackType::Mode2Form1, 42_900, 44_999),
        Track::new(5, 4, TrackType::Audio, 49_000, 51_167),
    ]
}

/// Wraps a reader and breaks some of its reads, as for a damaged or partial dump.
pub struct Faulty<R> {
    pub reader: R,
    /// Long reads touching any of these sectors fail.
    pub failing_long: Range<u64>,
    /// Bytes dropped from the end of every subchannel read.
    pub short_subchannel: usize,
}

impl<R> Faulty<R> {
    pub fn no_long_reads(reader: R) -> Self {
        Self::long_fails_within(reader, 0..u64::MAX)
    }

    pub fn long_fails_within(reader: R, failing_long: Range<u64>) -> Self {
        Self {
            reader,
            failing_long,
            short_subchannel: 0,
        }
    }

    pub fn short_subchannel(reader: R, bytes: usize) -> Self {
        Self {
            reader,
            failing_long: 0..0,
            short_subchannel: bytes,
        }
    }
}

impl<R: ImageReader> ImageReader for Faulty<R> {
    fn format_name(&self) -> &'static str {
        self.reader.format_name()
    }

    fn info(&self) -> &ImageInfo {
        self.reader.info()
    }

    fn tracks(&self) -> &[Track] {
        self.reader.tracks()
    }

    fn sessions(&self) -> &[Session] {
        self.reader.sessions()
    }

    fn read_sectors(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>> {
        self.reader.read_sectors(start, count)
    }

    fn read_sectors_long(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>> {
        if start < self.failing_long.end && start + count as u64 > self.failing_long.start {
            return Err(ImageError::not_present("Long sectors"));
        }
        self.reader.read_sectors_long(start, count)
    }

    fn read_sectors_tag(
        &mut self,
        start: u64,
        count: u32,
        tag: SectorTagType,
    ) -> ImageResult<Vec<u8>> {
        let mut data = self.reader.read_sectors_tag(start, count, tag)?;
        if tag == SectorTagType::Subchannel {
            data.truncate(data.len().saturating_sub(self.short_subchannel));
        }
        Ok(data)
    }

    fn read_track_tag(&mut self, track: u32, tag: SectorTagType) -> ImageResult<Vec<u8>> {
        self.reader.read_track_tag(track, tag)
    }

    fn read_media_tag(&mut self, tag: MediaTagType) -> ImageResult<Vec<u8>> {
        self.reader.read_media_tag(tag)
    }

    fn dump_hardware(&self) -> Option<&[DumpHardware]> {
        self.reader.dump_hardware()
    }

    fn cicm_metadata(&self) -> Option<&CicmMetadata> {
        self.reader.cicm_metadata()
    }
}

/// Tracks with the fields that describe layout, leaving out where the data is stored.
pub fn layout(tracks: &[Track]) -> Vec<Track> {
    tracks
        .iter()
        .cloned()
        .map(|mut t| {
            t.file = None;
            t
        })
        .collect()
}
