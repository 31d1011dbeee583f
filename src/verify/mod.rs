//! Whole-image read-through with rolling checksums.

use crate::cd::sector::SectorTagType;
use crate::image::error::{ImageError, ImageResult};
use crate::image::reader::ImageReader;
use indicatif::ProgressBar;
use log::{debug, info};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const CHUNK_SIZE: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadThroughReport {
    pub sectors: u64,
    pub user_data_md5: String,
    /// Absent when the image has no long sectors.
    pub long_md5: Option<String>,
    /// Absent when no track carries subchannel.
    pub subchannel_md5: Option<String>,
}

/// Reads every sector of every track once, in track order.
///
/// Long sectors and subchannel are hashed when the image can provide them; a capability error on
/// the first attempt turns that hash off instead of failing the read-through.
pub fn read_through(
    reader: &mut dyn ImageReader,
    progress: Option<&ProgressBar>,
) -> ImageResult<ReadThroughReport> {
    let tracks = reader.tracks().to_vec();
    if let Some(pb) = progress {
        pb.set_length(tracks.iter().map(|t| t.len()).sum());
    }

    let mut user = md5::Context::new();
    let mut long = Some(md5::Context::new());
    let mut subchannel = reader
        .info()
        .readable_sector_tags
        .contains(&SectorTagType::Subchannel)
        .then(md5::Context::new);
    let mut sectors = 0u64;

    for track in &tracks {
        debug!(
            "Reading track {} ({} sectors)",
            track.sequence,
            track.len()
        );
        let mut start = track.start;
        while start <= track.end {
            let count = (track.end + 1 - start).min(CHUNK_SIZE as u64) as u32;

            user.consume(reader.read_sectors(start, count)?);

            if let Some(context) = long.as_mut() {
                match reader.read_sectors_long(start, count) {
                    Ok(data) => context.consume(data),
                    Err(e) if e.is_capability() => {
                        debug!("No long sectors: {e}");
                        long = None;
                    }
                    Err(e) => return Err(e),
                }
            }

            if let Some(context) = subchannel.as_mut() {
                match reader.read_sectors_tag(start, count, SectorTagType::Subchannel) {
                    Ok(data) => context.consume(data),
                    Err(ImageError::NotPresentOnMedia(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            sectors += count as u64;
            start += count as u64;
            if let Some(pb) = progress {
                pb.inc(count as u64);
            }
        }
    }

    let report = ReadThroughReport {
        sectors,
        user_data_md5: format!("{:x}", user.compute()),
        long_md5: long.map(|c| format!("{:x}", c.compute())),
        subchannel_md5: subchannel.map(|c| format!("{:x}", c.compute())),
    };
    info!(
        "Read {} sectors, user data MD5 {}",
        report.sectors, report.user_data_md5
    );
    Ok(report)
}

/// Lowercase hex MD5 of a whole file.
pub fn file_md5(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; 1 << 16];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}
