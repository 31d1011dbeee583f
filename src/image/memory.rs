use crate::cd::SUBCODE_SIZE;
use crate::cd::sector::{
    SectorTagType, encode_sector, extract_tag, extract_user_data, sector_size_for,
    structural_tags,
};
use crate::cd::subchannel::SubchannelType;
use crate::image::error::{ImageError, ImageResult};
use crate::image::models::{
    CicmMetadata, DumpHardware, ImageInfo, MediaTagType, MediaType, Session, Track, TrackFlags,
};
use crate::image::reader::ImageReader;
use crate::image::resolver::{Representation, resolve};
use crate::image::table::TrackTable;
use crate::image::writer::{ImageWriter, WriterOptions};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const MEDIA_TYPES: [MediaType; 8] = [
    MediaType::Unknown,
    MediaType::Cd,
    MediaType::CdDa,
    MediaType::CdRom,
    MediaType::CdRomXa,
    MediaType::CdPlus,
    MediaType::CdI,
    MediaType::CdMixed,
];

const SECTOR_TAGS: [SectorTagType; 10] = [
    SectorTagType::Sync,
    SectorTagType::Header,
    SectorTagType::Subheader,
    SectorTagType::Edc,
    SectorTagType::EccP,
    SectorTagType::EccQ,
    SectorTagType::Ecc,
    SectorTagType::Subchannel,
    SectorTagType::TrackIsrc,
    SectorTagType::TrackFlags,
];

const MEDIA_TAGS: [MediaTagType; 6] = [
    MediaTagType::CdMcn,
    MediaTagType::CdText,
    MediaTagType::CdAtip,
    MediaTagType::CdPma,
    MediaTagType::CdFullToc,
    MediaTagType::CdSessionInfo,
];

#[derive(Debug, Default, Clone)]
struct SectorSlot {
    long: Option<Vec<u8>>,
    cooked: Option<Vec<u8>>,
    subchannel: Option<Vec<u8>>,
}

/// Disc image held entirely in memory, usable both as a reader and as a writer.
///
/// Sectors never written read back as zero-filled user data.
#[derive(Debug, Default)]
pub struct MemoryImage {
    info: ImageInfo,
    table: TrackTable,
    sectors: HashMap<u64, SectorSlot>,
    media_tags: BTreeMap<MediaTagType, Vec<u8>>,
    dump_hardware: Vec<DumpHardware>,
    cicm: Option<CicmMetadata>,
    options: WriterOptions,
    set_tracks_calls: usize,
    created: bool,
    closed: bool,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// An image already created with the given layout, ready to be filled or read.
    pub fn with_tracks(media_type: MediaType, tracks: Vec<Track>) -> ImageResult<Self> {
        let mut image = Self::new();
        image.created = true;
        image.info.media_type = media_type;
        image.table.set_tracks(tracks)?;
        image.refresh_info();
        Ok(image)
    }

    /// Number of times `set_tracks` was called through the writer interface.
    pub fn set_tracks_calls(&self) -> usize {
        self.set_tracks_calls
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn table(&self) -> &TrackTable {
        &self.table
    }

    fn refresh_info(&mut self) {
        let tracks = self.table.tracks();

        let mut tags: Vec<SectorTagType> = tracks
            .iter()
            .flat_map(|t| structural_tags(t.track_type).iter().copied())
            .collect();
        if tracks.iter().any(|t| t.subchannel != SubchannelType::None) {
            tags.push(SectorTagType::Subchannel);
        }
        if !tracks.is_empty() {
            tags.push(SectorTagType::TrackFlags);
        }
        if tracks.iter().any(|t| t.isrc.is_some()) {
            tags.push(SectorTagType::TrackIsrc);
        }
        tags.sort();
        tags.dedup();

        self.info.sectors = self.table.total_sectors();
        self.info.sector_size = tracks
            .iter()
            .map(|t| t.bytes_per_sector())
            .max()
            .unwrap_or(0);
        self.info.readable_sector_tags = tags;
        self.info.readable_media_tags = self.media_tags.keys().copied().collect();
    }

    fn check_writable(&self) -> ImageResult<()> {
        if !self.created {
            return Err(ImageError::NotCreated);
        }
        if self.closed {
            return Err(ImageError::AlreadyClosed);
        }
        Ok(())
    }

    fn update_track(&mut self, sequence: u32, update: impl FnOnce(&mut Track)) -> ImageResult<()> {
        let mut tracks = self.table.tracks().to_vec();
        let track = tracks
            .iter_mut()
            .find(|t| t.sequence == sequence)
            .ok_or(ImageError::NoSuchTrack(sequence))?;
        update(track);
        self.table.set_tracks(tracks)?;
        self.refresh_info();
        Ok(())
    }

    fn check_length(data: &[u8], expected: u64) -> ImageResult<()> {
        if data.len() as u64 != expected {
            return Err(ImageError::LengthMismatch {
                expected: expected as usize,
                actual: data.len(),
            });
        }
        Ok(())
    }
}

impl ImageReader for MemoryImage {
    fn format_name(&self) -> &'static str {
        "memory"
    }

    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn tracks(&self) -> &[Track] {
        self.table.tracks()
    }

    fn sessions(&self) -> &[Session] {
        self.table.sessions()
    }

    fn read_sectors(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>> {
        let plan = resolve(&self.table, start, count as u64, Representation::User)?;
        let track_type = plan.track.track_type;
        let size = plan.sector_size as usize;

        let mut buffer = Vec::with_capacity(plan.byte_length as usize);
        for sector in start..start + count as u64 {
            match self.sectors.get(&sector) {
                Some(SectorSlot {
                    cooked: Some(cooked),
                    ..
                }) => buffer.extend_from_slice(cooked),
                Some(SectorSlot {
                    long: Some(long), ..
                }) => buffer.extend_from_slice(extract_user_data(long, track_type)?),
                _ => buffer.resize(buffer.len() + size, 0),
            }
        }
        Ok(buffer)
    }

    fn read_sectors_long(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>> {
        let plan = resolve(&self.table, start, count as u64, Representation::Long)?;
        let track_type = plan.track.track_type;
        let cooked_size = sector_size_for(track_type, false) as usize;

        let mut buffer = Vec::with_capacity(plan.byte_length as usize);
        for sector in start..start + count as u64 {
            let slot = self.sectors.get(&sector);
            if let Some(long) = slot.and_then(|s| s.long.as_ref()) {
                buffer.extend_from_slice(long);
                continue;
            }
            let encoded = match slot.and_then(|s| s.cooked.as_ref()) {
                Some(cooked) => encode_sector(cooked, sector as i64, track_type)?,
                None => encode_sector(&vec![0; cooked_size], sector as i64, track_type)?,
            };
            buffer.extend_from_slice(&encoded);
        }
        Ok(buffer)
    }

    fn read_sectors_tag(
        &mut self,
        start: u64,
        count: u32,
        tag: SectorTagType,
    ) -> ImageResult<Vec<u8>> {
        let (track, byte_length) = {
            let plan = resolve(&self.table, start, count as u64, Representation::Tag(tag))?;
            (plan.track.clone(), plan.byte_length as usize)
        };
        let track_type = track.track_type;

        match tag {
            SectorTagType::Subchannel => {
                if track.subchannel == SubchannelType::None {
                    return Err(ImageError::not_present(format!(
                        "Subchannel of track {}",
                        track.sequence
                    )));
                }
                let mut buffer = Vec::with_capacity(byte_length);
                for sector in start..start + count as u64 {
                    match self.sectors.get(&sector).and_then(|s| s.subchannel.as_ref()) {
                        Some(sub) => buffer.extend_from_slice(sub),
                        None => buffer.resize(buffer.len() + SUBCODE_SIZE, 0),
                    }
                }
                Ok(buffer)
            }
            t if t.is_per_track() => Err(ImageError::unsupported(format!(
                "Reading {t} as a sector tag"
            ))),
            _ => {
                let long = self.read_sectors_long(start, count)?;
                let raw_size = sector_size_for(track_type, true) as usize;
                let mut buffer = Vec::with_capacity(byte_length);
                for sector in long.chunks_exact(raw_size) {
                    buffer.extend_from_slice(extract_tag(sector, track_type, tag)?);
                }
                Ok(buffer)
            }
        }
    }

    fn read_track_tag(&mut self, track: u32, tag: SectorTagType) -> ImageResult<Vec<u8>> {
        let track = self.table.track(track)?;
        match tag {
            SectorTagType::TrackFlags => Ok(vec![track.flags.bits()]),
            SectorTagType::TrackIsrc => track
                .isrc
                .as_ref()
                .map(|isrc| isrc.as_bytes().to_vec())
                .ok_or_else(|| ImageError::not_present(format!("ISRC of track {}", track.sequence))),
            t => Err(ImageError::unsupported(format!("Reading {t} as a track tag"))),
        }
    }

    fn read_media_tag(&mut self, tag: MediaTagType) -> ImageResult<Vec<u8>> {
        self.media_tags
            .get(&tag)
            .cloned()
            .ok_or_else(|| ImageError::not_present(tag.to_string()))
    }

    fn dump_hardware(&self) -> Option<&[DumpHardware]> {
        (!self.dump_hardware.is_empty()).then_some(self.dump_hardware.as_slice())
    }

    fn cicm_metadata(&self) -> Option<&CicmMetadata> {
        self.cicm.as_ref()
    }
}

impl ImageWriter for MemoryImage {
    fn format_name(&self) -> &'static str {
        "memory"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &MEDIA_TYPES
    }

    fn supported_sector_tags(&self) -> &[SectorTagType] {
        &SECTOR_TAGS
    }

    fn supported_media_tags(&self) -> &[MediaTagType] {
        &MEDIA_TAGS
    }

    fn create(
        &mut self,
        path: &Path,
        media_type: MediaType,
        options: &WriterOptions,
        total_sectors: u64,
        sector_size: u32,
    ) -> ImageResult<()> {
        if self.closed {
            return Err(ImageError::AlreadyClosed);
        }
        debug!(
            "Creating in-memory image for {} ({media_type}, {total_sectors} sectors of {sector_size} bytes)",
            path.display()
        );

        *self = Self {
            created: true,
            options: options.clone(),
            ..Self::default()
        };
        self.info.media_type = media_type;
        self.info.sectors = total_sectors;
        self.info.sector_size = sector_size;
        Ok(())
    }

    fn set_metadata(&mut self, info: &ImageInfo) -> ImageResult<()> {
        self.check_writable()?;
        self.info = ImageInfo {
            media_type: self.info.media_type,
            ..info.clone()
        };
        self.refresh_info();
        Ok(())
    }

    fn set_tracks(&mut self, tracks: Vec<Track>) -> ImageResult<()> {
        self.check_writable()?;
        self.table.set_tracks(tracks)?;
        self.set_tracks_calls += 1;
        self.refresh_info();
        Ok(())
    }

    fn write_sectors(&mut self, data: &[u8], start: u64, count: u32) -> ImageResult<()> {
        self.check_writable()?;
        let plan = resolve(&self.table, start, count as u64, Representation::User)?;
        Self::check_length(data, plan.byte_length)?;

        let size = plan.sector_size as usize;
        for (sector, chunk) in (start..).zip(data.chunks_exact(size)) {
            let slot = self.sectors.entry(sector).or_default();
            slot.cooked = Some(chunk.to_vec());
            slot.long = None;
        }
        Ok(())
    }

    fn write_sectors_long(&mut self, data: &[u8], start: u64, count: u32) -> ImageResult<()> {
        self.check_writable()?;
        let plan = resolve(&self.table, start, count as u64, Representation::Long)?;
        Self::check_length(data, plan.byte_length)?;

        let size = plan.sector_size as usize;
        for (sector, chunk) in (start..).zip(data.chunks_exact(size)) {
            let slot = self.sectors.entry(sector).or_default();
            slot.long = Some(chunk.to_vec());
            slot.cooked = None;
        }
        Ok(())
    }

    fn write_sectors_tag(
        &mut self,
        data: &[u8],
        start: u64,
        count: u32,
        tag: SectorTagType,
    ) -> ImageResult<()> {
        self.check_writable()?;
        if tag != SectorTagType::Subchannel {
            return Err(ImageError::unsupported(format!(
                "Writing {tag} separately from long sectors"
            )));
        }
        let plan = resolve(&self.table, start, count as u64, Representation::Tag(tag))?;
        Self::check_length(data, plan.byte_length)?;

        for (sector, chunk) in (start..).zip(data.chunks_exact(SUBCODE_SIZE)) {
            self.sectors.entry(sector).or_default().subchannel = Some(chunk.to_vec());
        }
        Ok(())
    }

    fn write_track_tag(&mut self, data: &[u8], track: u32, tag: SectorTagType) -> ImageResult<()> {
        self.check_writable()?;
        match tag {
            SectorTagType::TrackFlags => {
                let flags = TrackFlags::from_bits_truncate(data.first().copied().unwrap_or(0));
                self.update_track(track, |t| t.flags = flags)
            }
            SectorTagType::TrackIsrc => {
                let isrc = String::from_utf8_lossy(data)
                    .trim_end_matches('\0')
                    .to_string();
                self.update_track(track, |t| t.isrc = Some(isrc))
            }
            t => Err(ImageError::unsupported(format!("Writing {t} as a track tag"))),
        }
    }

    fn write_media_tag(&mut self, data: &[u8], tag: MediaTagType) -> ImageResult<()> {
        self.check_writable()?;
        self.media_tags.insert(tag, data.to_vec());
        if tag == MediaTagType::CdMcn {
            self.info.metadata.mcn = Some(String::from_utf8_lossy(data).to_string());
        }
        self.refresh_info();
        Ok(())
    }

    fn set_dump_hardware(&mut self, hardware: &[DumpHardware]) -> ImageResult<()> {
        self.check_writable()?;
        self.dump_hardware = hardware.to_vec();
        Ok(())
    }

    fn set_cicm_metadata(&mut self, metadata: &CicmMetadata) -> ImageResult<()> {
        self.check_writable()?;
        self.cicm = Some(metadata.clone());
        Ok(())
    }

    fn close(&mut self) -> ImageResult<()> {
        self.check_writable()?;
        self.closed = true;
        debug!(
            "Closed in-memory image with {} sectors stored",
            self.sectors.len()
        );
        Ok(())
    }
}
