pub mod error;
pub mod subchannel;

use crate::built_info;
use crate::cd::SUBCODE_SIZE;
use crate::cd::sector::SectorTagType;
use crate::cd::subchannel::SubchannelType;
use crate::convert::error::{ConvertError, ConvertResult};
use crate::convert::subchannel::{SubchannelAccumulator, repair_tracks};
use crate::image::error::ImageError;
use crate::image::models::{ImageInfo, MediaTagType, Track};
use crate::image::reader::ImageReader;
use crate::image::writer::{ImageWriter, WriterOptions};
use crate::verify::file_md5;
use chrono::Utc;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: u32 = 256;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Copy long sectors and sector tags instead of user data only.
    pub long: bool,
    pub chunk_size: u32,
    /// Forwarded to the output format untouched.
    pub options: WriterOptions,
    pub debug: bool,
    /// Lowercase hex MD5 the finished output file is expected to have.
    pub expected_md5: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            long: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            options: WriterOptions::new(),
            debug: false,
            expected_md5: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionState {
    Init,
    MetadataCopied,
    TracksDeclared,
    SectorsCopied,
    TagsCopied,
    Finalized,
    Failed(String),
}

impl Display for ConversionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionState::Init => f.write_str("not started"),
            ConversionState::MetadataCopied => f.write_str("past metadata"),
            ConversionState::TracksDeclared => f.write_str("past track declaration"),
            ConversionState::SectorsCopied => f.write_str("past sector copy"),
            ConversionState::TagsCopied => f.write_str("past tag copy"),
            ConversionState::Finalized => f.write_str("finalized"),
            ConversionState::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub sectors: u64,
    /// Chunks copied as long sectors.
    pub long_chunks: u64,
    /// Chunks that had to be copied as user data after the long copy failed.
    pub cooked_fallbacks: u64,
    /// Times the output track table was corrected from subchannel data.
    pub table_repairs: u64,
    pub mcn: Option<String>,
    pub isrcs: BTreeMap<u32, String>,
    pub hash_matches: Option<bool>,
}

/// Copies one opened image into a newly created one.
pub struct ConversionEngine<'a> {
    input: &'a mut dyn ImageReader,
    output: &'a mut dyn ImageWriter,
    output_path: PathBuf,
    options: ConvertOptions,
    state: ConversionState,
    progress: Option<ProgressBar>,
    /// Track table as last declared on the output.
    tracks: Vec<Track>,
    report: ConversionReport,
}

impl<'a> ConversionEngine<'a> {
    pub fn new(
        input: &'a mut dyn ImageReader,
        output: &'a mut dyn ImageWriter,
        output_path: &Path,
        options: ConvertOptions,
    ) -> Self {
        Self {
            input,
            output,
            output_path: output_path.to_path_buf(),
            options,
            state: ConversionState::Init,
            progress: None,
            tracks: Vec::new(),
            report: ConversionReport::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> &ConversionState {
        &self.state
    }

    /// Runs the whole conversion. An engine can only be run once; after a failure the files the
    /// output has created are left for the caller to remove.
    pub fn run(&mut self) -> ConvertResult<ConversionReport> {
        if self.state != ConversionState::Init {
            return Err(ConvertError::AlreadyRun(self.state.to_string()));
        }

        match self.convert() {
            Ok(()) => Ok(self.report.clone()),
            Err(e) => {
                warn!("Conversion failed: {e}");
                self.state = ConversionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn convert(&mut self) -> ConvertResult<()> {
        let info = self.input.info().clone();

        if !self
            .output
            .supported_media_types()
            .contains(&info.media_type)
        {
            return Err(ConvertError::UnsupportedMedia(info.media_type));
        }
        if self.options.long && info.readable_sector_tags.is_empty() {
            return Err(ConvertError::LongUnsupported);
        }

        self.create(&info)?;
        self.copy_media_tags(&info)?;
        self.declare_tracks()?;
        self.copy_sectors(&info)?;

        if self.options.long {
            self.copy_tags(&info)?;
        } else {
            debug!("Skipping sector tags, long copy was not requested");
        }
        self.advance(ConversionState::TagsCopied);

        self.copy_dump_metadata()?;

        self.output.close().map_err(ConvertError::CloseFailed)?;
        self.advance(ConversionState::Finalized);

        if let Some(expected) = self.options.expected_md5.clone() {
            self.verify(&expected);
        }
        if let Some(pb) = &self.progress {
            pb.finish_with_message("done");
        }
        Ok(())
    }

    fn advance(&mut self, state: ConversionState) {
        info!("Conversion {state}");
        self.state = state;
    }

    fn create(&mut self, info: &ImageInfo) -> ConvertResult<()> {
        let mut options = self.options.options.clone();
        if self.options.debug {
            options.insert("debug".to_string(), "true".to_string());
        }

        info!(
            "Creating {} image {} ({}, {} sectors)",
            self.output.format_name(),
            self.output_path.display(),
            info.media_type,
            info.sectors
        );
        self.output
            .create(
                &self.output_path,
                info.media_type,
                &options,
                info.sectors,
                info.sector_size,
            )
            .map_err(ConvertError::WriteSetupFailed)?;

        let now = Utc::now();
        let metadata = ImageInfo {
            application: Some(built_info::PKG_NAME.to_string()),
            application_version: Some(built_info::PKG_VERSION.to_string()),
            creation_time: info.creation_time.or(Some(now)),
            last_modification_time: Some(now),
            ..info.clone()
        };
        self.output
            .set_metadata(&metadata)
            .map_err(ConvertError::WriteSetupFailed)?;

        self.advance(ConversionState::MetadataCopied);
        Ok(())
    }

    fn copy_media_tags(&mut self, info: &ImageInfo) -> ConvertResult<()> {
        for &tag in &info.readable_media_tags {
            if !self.output.supported_media_tags().contains(&tag) {
                debug!("Output can't store {tag}, skipping");
                continue;
            }
            debug!("Copying media tag {tag}");
            let data = self
                .input
                .read_media_tag(tag)
                .map_err(|source| ConvertError::MediaTagFailed { tag, source })?;
            self.output
                .write_media_tag(&data, tag)
                .map_err(|source| ConvertError::MediaTagFailed { tag, source })?;
        }
        Ok(())
    }

    fn declare_tracks(&mut self) -> ConvertResult<()> {
        self.tracks = self.input.tracks().to_vec();
        self.output
            .set_tracks(self.tracks.clone())
            .map_err(ConvertError::TrackDeclarationFailed)?;
        self.advance(ConversionState::TracksDeclared);
        Ok(())
    }

    fn copy_sectors(&mut self, info: &ImageInfo) -> ConvertResult<()> {
        if let Some(pb) = &self.progress {
            pb.set_length(info.sectors);
            pb.set_position(0);
        }

        let tracks = self.input.tracks().to_vec();
        for track in &tracks {
            info!(
                "Copying track {} ({}, sectors {} to {})",
                track.sequence, track.track_type, track.start, track.end
            );
            if let Some(pb) = &self.progress {
                pb.set_message(format!("track {}", track.sequence));
            }

            for (start, count) in chunks(track, self.options.chunk_size) {
                self.copy_chunk(track, start, count)?;
                self.report.sectors += count as u64;
                if let Some(pb) = &self.progress {
                    pb.inc(count as u64);
                }
            }
        }

        self.advance(ConversionState::SectorsCopied);
        Ok(())
    }

    fn copy_chunk(&mut self, track: &Track, start: u64, count: u32) -> ConvertResult<()> {
        if self.options.long {
            match self.copy_long(track, start, count) {
                Ok(()) => {
                    self.report.long_chunks += 1;
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Long copy of {count} sectors from {start} of track {} failed, copying user data instead: {e}",
                        track.sequence
                    );
                    self.report.cooked_fallbacks += 1;
                }
            }
        }

        let data = self.input.read_sectors(start, count).map_err(|source| {
            ConvertError::SectorCopyFailed {
                track: track.sequence,
                start,
                count,
                source,
            }
        })?;
        self.output
            .write_sectors(&data, start, count)
            .map_err(|source| ConvertError::SectorCopyFailed {
                track: track.sequence,
                start,
                count,
                source,
            })
    }

    fn copy_long(&mut self, track: &Track, start: u64, count: u32) -> Result<(), ImageError> {
        let data = self.input.read_sectors_long(start, count)?;
        let expected = count as usize * track.raw_bytes_per_sector() as usize;
        if data.len() != expected {
            return Err(ImageError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        self.output.write_sectors_long(&data, start, count)
    }

    fn copy_tags(&mut self, info: &ImageInfo) -> ConvertResult<()> {
        let mut accumulator = SubchannelAccumulator::default();
        let mut track_tags: Vec<(u32, SectorTagType, Vec<u8>)> = Vec::new();
        let tracks = self.input.tracks().to_vec();

        for &tag in &info.readable_sector_tags {
            if tag.is_part_of_long_sector() {
                debug!("{tag} was copied with the long sectors");
                continue;
            }
            if !self.output.supported_sector_tags().contains(&tag) {
                debug!("Output can't store {tag}, skipping");
                continue;
            }

            match tag {
                SectorTagType::Subchannel => {
                    for track in &tracks {
                        self.copy_subchannel(track, &mut accumulator)?;
                    }
                }
                _ => {
                    for track in &tracks {
                        match self.input.read_track_tag(track.sequence, tag) {
                            Ok(data) => track_tags.push((track.sequence, tag, data)),
                            Err(e) => debug!("No {tag} for track {}: {e}", track.sequence),
                        }
                    }
                }
            }
        }

        self.write_disc_tags(accumulator, track_tags)
    }

    fn copy_subchannel(
        &mut self,
        track: &Track,
        accumulator: &mut SubchannelAccumulator,
    ) -> ConvertResult<()> {
        if track.subchannel == SubchannelType::None {
            return Ok(());
        }
        let failed = |source| ConvertError::TagCopyFailed {
            track: track.sequence,
            tag: SectorTagType::Subchannel,
            source,
        };

        for (start, count) in chunks(track, self.options.chunk_size) {
            let data = self
                .input
                .read_sectors_tag(start, count, SectorTagType::Subchannel)
                .map_err(failed)?;
            let expected = count as usize * SUBCODE_SIZE;
            if data.len() != expected {
                return Err(failed(ImageError::LengthMismatch {
                    expected,
                    actual: data.len(),
                }));
            }

            let repaired = repair_tracks(&data, track.subchannel, start, &self.tracks, accumulator)
                .map_err(|e| failed(e.into()))?;
            if let Some(tracks) = repaired {
                info!("Subchannel of sectors {start} onward corrects the track layout");
                self.output
                    .set_tracks(tracks.clone())
                    .map_err(ConvertError::TrackDeclarationFailed)?;
                self.tracks = tracks;
                self.report.table_repairs += 1;
            }

            self.write_subchannel(&data, start, count).map_err(failed)?;
        }
        Ok(())
    }

    /// Writes a chunk of subchannel, split wherever the output table puts a track boundary.
    fn write_subchannel(&mut self, data: &[u8], start: u64, count: u32) -> Result<(), ImageError> {
        let end = start + count as u64;
        let mut sector = start;

        while sector < end {
            let owner = self
                .tracks
                .iter()
                .find(|t| t.contains(sector))
                .ok_or(ImageError::TrackNotFound(sector))?;
            let run = (owner.end + 1).min(end) - sector;
            let from = ((sector - start) as usize) * SUBCODE_SIZE;
            let to = from + run as usize * SUBCODE_SIZE;
            let part = data.get(from..to).ok_or(ImageError::LengthMismatch {
                expected: count as usize * SUBCODE_SIZE,
                actual: data.len(),
            })?;
            self.output
                .write_sectors_tag(part, sector, run as u32, SectorTagType::Subchannel)?;
            sector += run;
        }
        Ok(())
    }

    fn write_disc_tags(
        &mut self,
        accumulator: SubchannelAccumulator,
        mut track_tags: Vec<(u32, SectorTagType, Vec<u8>)>,
    ) -> ConvertResult<()> {
        if let Some(mcn) = &accumulator.mcn {
            if self
                .output
                .supported_media_tags()
                .contains(&MediaTagType::CdMcn)
            {
                info!("Writing MCN {mcn} found in subchannel");
                self.output
                    .write_media_tag(mcn.as_bytes(), MediaTagType::CdMcn)
                    .map_err(|source| ConvertError::MediaTagFailed {
                        tag: MediaTagType::CdMcn,
                        source,
                    })?;
            }
        }

        if self
            .output
            .supported_sector_tags()
            .contains(&SectorTagType::TrackIsrc)
        {
            for (&sequence, isrc) in &accumulator.isrcs {
                let known = track_tags
                    .iter()
                    .any(|(t, tag, _)| *t == sequence && *tag == SectorTagType::TrackIsrc);
                if !known {
                    debug!("Using ISRC {isrc} of track {sequence} from subchannel");
                    track_tags.push((sequence, SectorTagType::TrackIsrc, isrc.as_bytes().to_vec()));
                }
            }
        }

        for (sequence, tag, data) in &track_tags {
            debug!("Writing {tag} of track {sequence}");
            self.output
                .write_track_tag(data, *sequence, *tag)
                .map_err(|source| ConvertError::TagCopyFailed {
                    track: *sequence,
                    tag: *tag,
                    source,
                })?;
        }

        self.report.mcn = accumulator.mcn;
        self.report.isrcs = accumulator.isrcs;
        Ok(())
    }

    fn copy_dump_metadata(&mut self) -> ConvertResult<()> {
        if let Some(hardware) = self.input.dump_hardware().map(<[_]>::to_vec) {
            match self.output.set_dump_hardware(&hardware) {
                Ok(()) => debug!("Copied {} dump hardware entries", hardware.len()),
                Err(e) if e.is_capability() => warn!("Dropping dump hardware: {e}"),
                Err(source) => {
                    return Err(ConvertError::MetadataFailed {
                        what: "dump hardware",
                        source,
                    });
                }
            }
        }

        if let Some(cicm) = self.input.cicm_metadata().cloned() {
            match self.output.set_cicm_metadata(&cicm) {
                Ok(()) => debug!("Copied CICM metadata"),
                Err(e) if e.is_capability() => warn!("Dropping CICM metadata: {e}"),
                Err(source) => {
                    return Err(ConvertError::MetadataFailed {
                        what: "CICM metadata",
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn verify(&mut self, expected: &str) {
        let matches = match file_md5(&self.output_path) {
            Ok(actual) if actual.eq_ignore_ascii_case(expected) => {
                info!("Output MD5 {actual} matches");
                true
            }
            Ok(actual) => {
                warn!("Output MD5 {actual} does not match expected {expected}");
                false
            }
            Err(e) => {
                warn!("Could not hash {}: {e}", self.output_path.display());
                false
            }
        };
        self.report.hash_matches = Some(matches);
    }
}

/// Splits a track into runs of at most `chunk_size` sectors.
fn chunks(track: &Track, chunk_size: u32) -> impl Iterator<Item = (u64, u32)> + use<> {
    let chunk_size = chunk_size.max(1) as u64;
    let end = track.end + 1;
    (track.start..end)
        .step_by(chunk_size as usize)
        .map(move |start| (start, (end - start).min(chunk_size) as u32))
}
