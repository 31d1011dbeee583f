use crate::cd::sector::SectorTagType;
use crate::image::error::{ImageError, ImageResult};
use crate::image::models::{CicmMetadata, DumpHardware, ImageInfo, MediaTagType, MediaType, Track};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Format specific options forwarded untouched from the caller.
pub type WriterOptions = HashMap<String, String>;

/// Write access to a disc image being created.
///
/// `create` comes first, `close` exactly once at the end. `set_tracks` may be called again while
/// writing when track boundaries are corrected.
pub trait ImageWriter {
    fn format_name(&self) -> &'static str;

    fn supported_media_types(&self) -> &[MediaType];

    fn supported_sector_tags(&self) -> &[SectorTagType];

    fn supported_media_tags(&self) -> &[MediaTagType];

    fn create(
        &mut self,
        path: &Path,
        media_type: MediaType,
        options: &WriterOptions,
        total_sectors: u64,
        sector_size: u32,
    ) -> ImageResult<()>;

    fn set_metadata(&mut self, info: &ImageInfo) -> ImageResult<()>;

    fn set_tracks(&mut self, tracks: Vec<Track>) -> ImageResult<()>;

    fn write_sectors(&mut self, data: &[u8], start: u64, count: u32) -> ImageResult<()>;

    fn write_sectors_long(&mut self, data: &[u8], start: u64, count: u32) -> ImageResult<()>;

    fn write_sector(&mut self, data: &[u8], sector: u64) -> ImageResult<()> {
        self.write_sectors(data, sector, 1)
    }

    fn write_sector_long(&mut self, data: &[u8], sector: u64) -> ImageResult<()> {
        self.write_sectors_long(data, sector, 1)
    }

    fn write_sectors_tag(
        &mut self,
        _data: &[u8],
        _start: u64,
        _count: u32,
        tag: SectorTagType,
    ) -> ImageResult<()> {
        Err(ImageError::unsupported(format!("Writing {tag} tags")))
    }

    fn write_track_tag(&mut self, _data: &[u8], _track: u32, tag: SectorTagType) -> ImageResult<()> {
        Err(ImageError::unsupported(format!("Writing {tag} tags")))
    }

    fn write_media_tag(&mut self, _data: &[u8], tag: MediaTagType) -> ImageResult<()> {
        Err(ImageError::unsupported(format!("Writing {tag} media tags")))
    }

    fn set_dump_hardware(&mut self, _hardware: &[DumpHardware]) -> ImageResult<()> {
        Err(ImageError::unsupported("Dump hardware"))
    }

    fn set_cicm_metadata(&mut self, _metadata: &CicmMetadata) -> ImageResult<()> {
        Err(ImageError::unsupported("CICM metadata"))
    }

    /// Files the writer has created so far, for cleanup after a failure.
    fn output_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn close(&mut self) -> ImageResult<()>;
}
