//! Headerless images of 2048 byte user data sectors.

use crate::cd::TrackType;
use crate::cd::sector::SectorTagType;
use crate::image::error::{ImageError, ImageResult};
use crate::image::models::{ImageInfo, MediaTagType, MediaType, Session, Track, TrackFile};
use crate::image::reader::ImageReader;
use crate::image::resolver::{Representation, resolve};
use crate::image::table::TrackTable;
use crate::image::writer::{ImageWriter, WriterOptions};
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const ISO_SECTOR_SIZE: u32 = 2048;

const MEDIA_TYPES: [MediaType; 3] = [MediaType::Cd, MediaType::CdRom, MediaType::CdRomXa];

pub fn detect(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("iso"))
}

pub struct IsoImage {
    info: ImageInfo,
    table: TrackTable,
    file: File,
}

impl IsoImage {
    pub fn open(path: &Path) -> ImageResult<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        if length % ISO_SECTOR_SIZE as u64 != 0 {
            warn!(
                "{} is not a whole number of {ISO_SECTOR_SIZE} byte sectors",
                path.display()
            );
        }
        let sectors = length / ISO_SECTOR_SIZE as u64;
        if sectors == 0 {
            return Err(ImageError::not_present("Sectors in an empty file"));
        }

        let mut track = Track::new(1, 1, TrackType::Mode1, 0, sectors - 1);
        track.file = Some(TrackFile {
            path: path.to_path_buf(),
            offset: 0,
            file_type: Default::default(),
            sector_size: ISO_SECTOR_SIZE,
            synthesized_pregap: 0,
            stored_sectors: sectors,
        });
        let table = TrackTable::new(vec![track])?;

        info!("Opened {} with {sectors} sectors", path.display());
        Ok(Self {
            info: ImageInfo {
                sectors,
                sector_size: ISO_SECTOR_SIZE,
                media_type: MediaType::CdRom,
                ..ImageInfo::default()
            },
            table,
            file,
        })
    }
}

impl ImageReader for IsoImage {
    fn format_name(&self) -> &'static str {
        "iso"
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
        let mut buffer = vec![0u8; plan.byte_length as usize];
        self.file.seek(SeekFrom::Start(plan.byte_offset))?;
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn read_sectors_long(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>> {
        resolve(&self.table, start, count as u64, Representation::Long)?;
        Err(ImageError::unsupported("Long sectors in ISO images"))
    }

    fn read_track_tag(&mut self, track: u32, tag: SectorTagType) -> ImageResult<Vec<u8>> {
        let track = self.table.track(track)?;
        match tag {
            SectorTagType::TrackFlags => Ok(vec![track.flags.bits()]),
            t => Err(ImageError::unsupported(format!("{t} in ISO images"))),
        }
    }
}

/// Writes the cooked data of a single data track.
#[derive(Default)]
pub struct IsoWriter {
    path: Option<PathBuf>,
    file: Option<BufWriter<File>>,
    table: TrackTable,
    closed: bool,
}

impl IsoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn file(&mut self) -> ImageResult<&mut BufWriter<File>> {
        if self.closed {
            return Err(ImageError::AlreadyClosed);
        }
        self.file.as_mut().ok_or(ImageError::NotCreated)
    }
}

impl ImageWriter for IsoWriter {
    fn format_name(&self) -> &'static str {
        "iso"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &MEDIA_TYPES
    }

    fn supported_sector_tags(&self) -> &[SectorTagType] {
        &[]
    }

    fn supported_media_tags(&self) -> &[MediaTagType] {
        &[]
    }

    fn create(
        &mut self,
        path: &Path,
        media_type: MediaType,
        _options: &WriterOptions,
        total_sectors: u64,
        sector_size: u32,
    ) -> ImageResult<()> {
        if self.file.is_some() || self.closed {
            return Err(ImageError::AlreadyClosed);
        }
        if !MEDIA_TYPES.contains(&media_type) {
            return Err(ImageError::unsupported(format!("{media_type} media")));
        }
        if sector_size != ISO_SECTOR_SIZE {
            return Err(ImageError::unsupported(format!(
                "{sector_size} byte sectors in ISO images"
            )));
        }

        info!("Creating {} for {total_sectors} sectors", path.display());
        self.file = Some(BufWriter::new(File::create(path)?));
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn set_metadata(&mut self, _info: &ImageInfo) -> ImageResult<()> {
        self.file()?;
        Ok(())
    }

    fn set_tracks(&mut self, tracks: Vec<Track>) -> ImageResult<()> {
        self.file()?;
        if tracks.len() != 1 {
            return Err(ImageError::unsupported(format!(
                "{} tracks in ISO images",
                tracks.len()
            )));
        }
        if let Some(track) = tracks
            .iter()
            .find(|t| t.bytes_per_sector() != ISO_SECTOR_SIZE)
        {
            return Err(ImageError::unsupported(format!(
                "{} tracks in ISO images",
                track.track_type
            )));
        }
        self.table.set_tracks(tracks)
    }

    fn write_sectors(&mut self, data: &[u8], start: u64, count: u32) -> ImageResult<()> {
        let (offset, length) = {
            let plan = resolve(&self.table, start, count as u64, Representation::User)?;
            (plan.byte_offset, plan.byte_length)
        };
        if data.len() as u64 != length {
            return Err(ImageError::LengthMismatch {
                expected: length as usize,
                actual: data.len(),
            });
        }
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn write_sectors_long(&mut self, _data: &[u8], _start: u64, _count: u32) -> ImageResult<()> {
        self.file()?;
        Err(ImageError::unsupported("Long sectors in ISO images"))
    }

    fn output_paths(&self) -> Vec<PathBuf> {
        self.path.iter().cloned().collect()
    }

    fn close(&mut self) -> ImageResult<()> {
        self.file()?;
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.closed = true;
        Ok(())
    }
}
