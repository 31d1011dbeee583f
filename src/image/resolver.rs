use crate::cd::sector::{SectorTagType, tag_size_for};
use crate::image::error::{ImageError, ImageResult};
use crate::image::models::Track;
use crate::image::table::TrackTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Cooked sectors, user data only.
    User,
    /// Full raw sectors.
    Long,
    Tag(SectorTagType),
}

impl Representation {
    pub fn sector_size(self, track: &Track) -> u32 {
        match self {
            Representation::User => track.bytes_per_sector(),
            Representation::Long => track.raw_bytes_per_sector(),
            Representation::Tag(tag) => tag_size_for(tag),
        }
    }
}

/// Byte range a sector request covers within its single owning track.
#[derive(Debug, Clone, Copy)]
pub struct Plan<'a> {
    pub track: &'a Track,
    pub relative_sector: u64,
    pub count: u64,
    pub byte_offset: u64,
    pub byte_length: u64,
    pub sector_size: u32,
}

/// How a plan maps onto the track's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backing {
    /// Sectors before the stored data, read back as zeroes.
    pub leading: u64,
    pub file_offset: u64,
    pub stored: u64,
    /// Sectors after the stored data, read back as zeroes.
    pub trailing: u64,
    pub sector_size: u32,
}

pub fn resolve<'a>(
    table: &'a TrackTable,
    sector: u64,
    count: u64,
    representation: Representation,
) -> ImageResult<Plan<'a>> {
    let track = table.find_track(sector)?;

    if count == 0 || sector + count - 1 > track.end {
        return Err(ImageError::SectorOutOfRange {
            sector,
            count,
            track: track.sequence,
        });
    }

    let sector_size = representation.sector_size(track);
    let relative_sector = sector - track.start;
    let base = track.file.as_ref().map(|f| f.offset).unwrap_or(0);

    Ok(Plan {
        track,
        relative_sector,
        count,
        byte_offset: base + relative_sector * sector_size as u64,
        byte_length: count * sector_size as u64,
        sector_size,
    })
}

impl Plan<'_> {
    /// Splits the plan against the stored layout of its track file, `None` for tracks with no
    /// file.
    pub fn backing(&self) -> Option<Backing> {
        let file = self.track.file.as_ref()?;

        let begin = self.relative_sector;
        let end = begin + self.count;
        let stored_begin = file.synthesized_pregap;
        let stored_end = stored_begin + file.stored_sectors;

        let backed_begin = begin.clamp(stored_begin, stored_end);
        let backed_end = end.clamp(stored_begin, stored_end);
        let leading = backed_begin.min(end).saturating_sub(begin);
        let stored = backed_end.saturating_sub(backed_begin);

        Some(Backing {
            leading,
            file_offset: file.offset + (backed_begin - stored_begin) * file.sector_size as u64,
            stored,
            trailing: self.count - leading - stored,
            sector_size: file.sector_size,
        })
    }
}
