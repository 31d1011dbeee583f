use crate::cd::sector::SectorTagType;
use crate::image::error::{ImageError, ImageResult};
use crate::image::models::{CicmMetadata, DumpHardware, ImageInfo, MediaTagType, Session, Track};

/// Read access to an opened disc image.
///
/// Every sector request must stay inside a single track; a request running past the owning
/// track's end fails with `SectorOutOfRange` and returns no bytes.
pub trait ImageReader {
    fn format_name(&self) -> &'static str;

    fn info(&self) -> &ImageInfo;

    fn tracks(&self) -> &[Track];

    fn sessions(&self) -> &[Session];

    fn read_sectors(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>>;

    fn read_sectors_long(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>>;

    fn read_sector(&mut self, sector: u64) -> ImageResult<Vec<u8>> {
        self.read_sectors(sector, 1)
    }

    fn read_sector_long(&mut self, sector: u64) -> ImageResult<Vec<u8>> {
        self.read_sectors_long(sector, 1)
    }

    /// Reads sectors addressed relative to the start of `track`.
    fn read_sectors_in_track(
        &mut self,
        track: u32,
        relative: u64,
        count: u32,
        raw: bool,
    ) -> ImageResult<Vec<u8>> {
        let owner = self
            .tracks()
            .iter()
            .find(|t| t.sequence == track)
            .ok_or(ImageError::NoSuchTrack(track))?;
        if relative + count as u64 > owner.len() {
            return Err(ImageError::SectorOutOfRange {
                sector: owner.start + relative,
                count: count as u64,
                track,
            });
        }
        let start = owner.start + relative;

        if raw {
            self.read_sectors_long(start, count)
        } else {
            self.read_sectors(start, count)
        }
    }

    fn read_sectors_tag(
        &mut self,
        _start: u64,
        _count: u32,
        tag: SectorTagType,
    ) -> ImageResult<Vec<u8>> {
        Err(ImageError::unsupported(format!("Reading {tag} tags")))
    }

    fn read_track_tag(&mut self, _track: u32, tag: SectorTagType) -> ImageResult<Vec<u8>> {
        Err(ImageError::unsupported(format!("Reading {tag} tags")))
    }

    fn read_media_tag(&mut self, tag: MediaTagType) -> ImageResult<Vec<u8>> {
        Err(ImageError::unsupported(format!("Reading {tag} media tags")))
    }

    fn dump_hardware(&self) -> Option<&[DumpHardware]> {
        None
    }

    fn cicm_metadata(&self) -> Option<&CicmMetadata> {
        None
    }
}
