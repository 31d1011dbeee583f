use crate::cd::sector::{SectorTagType, encode_sector};
use crate::cd::subchannel::{SubchannelType, convert_subchannel};
use crate::cd::{Msf, SECTOR_SIZE, SUBCODE_SIZE, TrackType};
use crate::formats::cue::models::{CueTrackType, flag_keywords};
use crate::formats::cue::{Sidecar, sidecar_path, subchannel_path};
use crate::image::error::{ImageError, ImageResult};
use crate::image::models::{
    CicmMetadata, DiscMetadata, DumpHardware, ImageInfo, MediaTagType, MediaType, Track,
    TrackFlags,
};
use crate::image::resolver::{Representation, resolve};
use crate::image::table::TrackTable;
use crate::image::writer::{ImageWriter, WriterOptions};
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MEDIA_TYPES: [MediaType; 7] = [
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

const MEDIA_TAGS: [MediaTagType; 2] = [MediaTagType::CdMcn, MediaTagType::CdText];

/// Writes a single raw `.bin` data file plus its cue sheet.
///
/// Every sector is stored as 2352 raw bytes; sessions are stored back to back with the gaps
/// between them left out.
#[derive(Default)]
pub struct CueWriter {
    cue_path: PathBuf,
    bin: Option<BufWriter<File>>,
    subchannel: Option<File>,
    write_subchannel: bool,
    sector_tags: Vec<SectorTagType>,
    table: TrackTable,
    media_type: MediaType,
    creator: Option<String>,
    metadata: DiscMetadata,
    cd_text: Option<Vec<u8>>,
    sidecar: Sidecar,
    closed: bool,
}

impl CueWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn bin_path(&self) -> PathBuf {
        self.cue_path.with_extension("bin")
    }

    fn cd_text_path(&self) -> PathBuf {
        self.cue_path.with_extension("cdt")
    }

    fn check_writable(&self) -> ImageResult<()> {
        if self.closed {
            return Err(ImageError::AlreadyClosed);
        }
        if self.bin.is_none() {
            return Err(ImageError::NotCreated);
        }
        Ok(())
    }

    /// Position of an absolute sector inside the data file, counted in sectors.
    fn stored_sector(&self, sector: u64) -> u64 {
        let mut skipped = 0;
        let mut previous_end: Option<u64> = None;
        for session in self.table.sessions() {
            if session.start_sector > sector {
                break;
            }
            if let Some(end) = previous_end {
                skipped += session.start_sector - end - 1;
            }
            previous_end = Some(session.end_sector);
        }
        sector - skipped
    }

    fn write_raw(&mut self, data: &[u8], start: u64) -> ImageResult<()> {
        let position = self.stored_sector(start) * SECTOR_SIZE as u64;
        let bin = self.bin.as_mut().ok_or(ImageError::NotCreated)?;
        bin.seek(SeekFrom::Start(position))?;
        bin.write_all(data)?;
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

    fn update_track(&mut self, sequence: u32, update: impl FnOnce(&mut Track)) -> ImageResult<()> {
        let mut tracks = self.table.tracks().to_vec();
        let track = tracks
            .iter_mut()
            .find(|t| t.sequence == sequence)
            .ok_or(ImageError::NoSuchTrack(sequence))?;
        update(track);
        self.table.set_tracks(tracks)
    }

    fn cue_sheet(&self) -> ImageResult<String> {
        let file_name = |path: PathBuf| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        };
        let metadata = &self.metadata;
        let mut lines = Vec::new();

        if let Some(mcn) = &metadata.mcn {
            lines.push(format!("CATALOG {mcn}"));
        }
        if self.cd_text.is_some() {
            lines.push(format!("CDTEXTFILE \"{}\"", file_name(self.cd_text_path())));
        }
        if let Some(barcode) = &metadata.barcode {
            lines.push(format!("UPC_EAN {barcode}"));
        }
        for (keyword, value) in [
            ("TITLE", &metadata.title),
            ("PERFORMER", &metadata.performer),
            ("SONGWRITER", &metadata.songwriter),
            ("COMPOSER", &metadata.composer),
            ("ARRANGER", &metadata.arranger),
        ] {
            if let Some(value) = value {
                lines.push(format!("{keyword} \"{value}\""));
            }
        }
        for (keyword, value) in [
            ("GENRE", &metadata.genre),
            ("DISCID", &metadata.disc_id),
            ("COMMENT", &metadata.comment),
        ] {
            if let Some(value) = value {
                lines.push(format!("REM {keyword} {value}"));
            }
        }
        if let Some(creator) = &self.creator {
            lines.push(format!("REM CREATOR {creator}"));
        }
        lines.push(format!("REM ORIGINAL MEDIA-TYPE: {}", self.media_type));
        lines.push(format!("FILE \"{}\" BINARY", file_name(self.bin_path())));

        let multi_session = self.table.sessions().len() > 1;
        let mut session = 0;
        for track in self.table.tracks() {
            let cue_type = CueTrackType::raw_for(track.track_type).ok_or_else(|| {
                ImageError::unsupported(format!("{} tracks in cue sheets", track.track_type))
            })?;

            if multi_session && track.session != session {
                session = track.session;
                lines.push(format!("  REM SESSION {session:02}"));
            }
            lines.push(format!("  TRACK {:02} {}", track.sequence, cue_type.keyword()));
            let flags = flag_keywords(track.flags);
            if !flags.is_empty() {
                lines.push(format!("    FLAGS {}", flags.join(" ")));
            }
            if let Some(isrc) = &track.isrc {
                lines.push(format!("    ISRC {isrc}"));
            }
            for (number, position) in &track.indexes {
                // The lead-in pregap of the first track is never stored.
                if *position < track.start as i64 {
                    continue;
                }
                let msf = Msf::from_frames(self.stored_sector(*position as u64) as i64)?;
                lines.push(format!("    INDEX {number:02} {msf}"));
            }
        }

        lines.push(String::new());
        Ok(lines.join("\n"))
    }
}

impl ImageWriter for CueWriter {
    fn format_name(&self) -> &'static str {
        "cue"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &MEDIA_TYPES
    }

    fn supported_sector_tags(&self) -> &[SectorTagType] {
        if self.sector_tags.is_empty() {
            &SECTOR_TAGS
        } else {
            &self.sector_tags
        }
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
        if self.closed || self.bin.is_some() {
            return Err(ImageError::AlreadyClosed);
        }
        if !MEDIA_TYPES.contains(&media_type) {
            return Err(ImageError::unsupported(format!("{media_type} media")));
        }

        self.cue_path = path.to_path_buf();
        self.media_type = media_type;
        self.write_subchannel = options
            .get("subchannel")
            .is_none_or(|v| v.eq_ignore_ascii_case("true"));
        self.sector_tags = SECTOR_TAGS
            .into_iter()
            .filter(|&t| self.write_subchannel || t != SectorTagType::Subchannel)
            .collect();
        self.creator = options.get("creator").cloned();
        if options.get("debug").is_some_and(|v| v == "true") {
            debug!("Cue writer options: {options:?}");
        }

        info!(
            "Creating {} for {total_sectors} sectors ({sector_size} bytes cooked)",
            self.bin_path().display()
        );
        self.bin = Some(BufWriter::new(File::create(self.bin_path())?));
        Ok(())
    }

    fn set_metadata(&mut self, info: &ImageInfo) -> ImageResult<()> {
        self.check_writable()?;
        self.metadata = info.metadata.clone();
        if self.metadata.comment.is_none() {
            self.metadata.comment = info.comments.clone();
        }
        Ok(())
    }

    fn set_tracks(&mut self, tracks: Vec<Track>) -> ImageResult<()> {
        self.check_writable()?;
        if let Some(track) = tracks.iter().find(|t| t.track_type == TrackType::CdG) {
            return Err(ImageError::unsupported(format!(
                "CD+G track {} in cue sheets",
                track.sequence
            )));
        }
        self.table.set_tracks(tracks)?;
        debug!(
            "Cue writer now has {} tracks (generation {})",
            self.table.tracks().len(),
            self.table.generation()
        );
        Ok(())
    }

    fn write_sectors(&mut self, data: &[u8], start: u64, count: u32) -> ImageResult<()> {
        self.check_writable()?;
        let (track_type, size, byte_length) = {
            let plan = resolve(&self.table, start, count as u64, Representation::User)?;
            (plan.track.track_type, plan.sector_size as usize, plan.byte_length)
        };
        Self::check_length(data, byte_length)?;

        let mut raw = Vec::with_capacity(count as usize * SECTOR_SIZE);
        for (sector, cooked) in (start..).zip(data.chunks_exact(size)) {
            raw.extend(encode_sector(cooked, sector as i64, track_type)?);
        }
        self.write_raw(&raw, start)
    }

    fn write_sectors_long(&mut self, data: &[u8], start: u64, count: u32) -> ImageResult<()> {
        self.check_writable()?;
        let byte_length = resolve(&self.table, start, count as u64, Representation::Long)?.byte_length;
        Self::check_length(data, byte_length)?;
        self.write_raw(data, start)
    }

    fn write_sectors_tag(
        &mut self,
        data: &[u8],
        start: u64,
        count: u32,
        tag: SectorTagType,
    ) -> ImageResult<()> {
        self.check_writable()?;
        if tag != SectorTagType::Subchannel || !self.write_subchannel {
            return Err(ImageError::unsupported(format!("Writing {tag} tags to cue sheets")));
        }
        let (layout, byte_length) = {
            let plan = resolve(&self.table, start, count as u64, Representation::Tag(tag))?;
            (plan.track.subchannel, plan.byte_length)
        };
        Self::check_length(data, byte_length)?;

        let raw = convert_subchannel(data, layout, SubchannelType::Raw)?;
        let position = self.stored_sector(start) * SUBCODE_SIZE as u64;
        if self.subchannel.is_none() {
            self.subchannel = Some(File::create(subchannel_path(&self.cue_path))?);
        }
        let sub = self.subchannel.as_mut().ok_or(ImageError::NotCreated)?;
        sub.seek(SeekFrom::Start(position))?;
        sub.write_all(&raw)?;
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
        match tag {
            MediaTagType::CdMcn => {
                self.metadata.mcn = Some(String::from_utf8_lossy(data).to_string());
                Ok(())
            }
            MediaTagType::CdText => {
                self.cd_text = Some(data.to_vec());
                Ok(())
            }
            t => Err(ImageError::unsupported(format!("Writing {t} media tags to cue sheets"))),
        }
    }

    fn set_dump_hardware(&mut self, hardware: &[DumpHardware]) -> ImageResult<()> {
        self.check_writable()?;
        self.sidecar.dump_hardware = hardware.to_vec();
        Ok(())
    }

    fn set_cicm_metadata(&mut self, metadata: &CicmMetadata) -> ImageResult<()> {
        self.check_writable()?;
        self.sidecar.cicm = Some(metadata.clone());
        Ok(())
    }

    fn output_paths(&self) -> Vec<PathBuf> {
        if self.cue_path.as_os_str().is_empty() {
            return Vec::new();
        }
        let mut paths = vec![self.cue_path.clone(), self.bin_path()];
        if self.subchannel.is_some() {
            paths.push(subchannel_path(&self.cue_path));
        }
        if self.cd_text.is_some() {
            paths.push(self.cd_text_path());
        }
        if self.sidecar != Sidecar::default() {
            paths.push(sidecar_path(&self.cue_path));
        }
        paths
    }

    fn close(&mut self) -> ImageResult<()> {
        self.check_writable()?;
        if self.table.is_empty() {
            return Err(ImageError::unsupported("Cue sheets without tracks"));
        }

        if let Some(mut bin) = self.bin.take() {
            bin.flush()?;
        }
        if let Some(sub) = self.subchannel.as_mut() {
            sub.flush()?;
        }
        if let Some(cd_text) = &self.cd_text {
            std::fs::write(self.cd_text_path(), cd_text)?;
        }
        if self.sidecar != Sidecar::default() {
            std::fs::write(
                sidecar_path(&self.cue_path),
                serde_json::to_vec_pretty(&self.sidecar)?,
            )?;
        }

        let cue = self.cue_sheet()?;
        std::fs::write(&self.cue_path, cue)?;
        self.closed = true;

        info!(
            "Wrote {} with {} tracks",
            self.cue_path.display(),
            self.table.tracks().len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::cue::parser::parse_cue;
    use tempfile::tempdir;

    fn tracks() -> Vec<Track> {
        let mut data = Track::new(1, 1, TrackType::Mode1, 0, 99);
        data.pregap = 150;
        data.indexes.insert(0, -150);
        let mut audio = Track::new(2, 1, TrackType::Audio, 100, 199);
        audio.pregap = 25;
        audio.indexes.insert(0, 100);
        audio.indexes.insert(1, 125);
        audio.flags = TrackFlags::COPY_PERMITTED;
        audio.isrc = Some("USRC17607839".to_string());
        let late = Track::new(3, 2, TrackType::Mode1, 11_600, 11_649);
        vec![data, audio, late]
    }

    #[test]
    fn writes_a_cue_sheet_that_parses_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("disc.cue");

        let mut writer = CueWriter::new();
        writer
            .create(&path, MediaType::CdPlus, &WriterOptions::new(), 11_650, 2352)
            .unwrap();
        let mut info = ImageInfo::default();
        info.metadata.title = Some("Disc".to_string());
        writer.set_metadata(&info).unwrap();
        writer.set_tracks(tracks()).unwrap();
        writer
            .write_media_tag(b"0724384960920", MediaTagType::CdMcn)
            .unwrap();
        writer.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("CATALOG 0724384960920"));
        assert!(text.contains("REM SESSION 02"));
        assert!(text.contains("FLAGS DCP"));
        assert!(!text.contains("INDEX 00 00:00:00"));

        let sheet = parse_cue(&text).unwrap();
        let indexes: Vec<(u32, u16, i64)> = sheet
            .tracks()
            .flat_map(|t| {
                t.indices
                    .iter()
                    .map(move |i| (t.number, i.number, i.position.to_frames()))
            })
            .collect();
        assert_eq!(
            indexes,
            vec![(1, 1, 0), (2, 0, 100), (2, 1, 125), (3, 1, 200)]
        );
        assert_eq!(sheet.metadata.title.as_deref(), Some("Disc"));
        assert_eq!(sheet.metadata.original_media_type.as_deref(), Some("CDPLUS"));
    }

    #[test]
    fn sessions_are_stored_back_to_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("disc.cue");

        let mut writer = CueWriter::new();
        writer
            .create(&path, MediaType::CdPlus, &WriterOptions::new(), 11_650, 2352)
            .unwrap();
        writer.set_tracks(tracks()).unwrap();
        writer
            .write_sector(&[0x5Au8; 2048], 11_649)
            .unwrap();
        writer.close().unwrap();

        let bin = std::fs::read(dir.path().join("disc.bin")).unwrap();
        assert_eq!(bin.len(), 250 * 2352);
        assert_eq!(&bin[249 * 2352 + 16..249 * 2352 + 24], &[0x5A; 8]);
    }

    #[test]
    fn cd_g_tracks_are_rejected() {
        let dir = tempdir().unwrap();
        let mut writer = CueWriter::new();
        writer
            .create(
                &dir.path().join("karaoke.cue"),
                MediaType::CdDa,
                &WriterOptions::new(),
                10,
                2448,
            )
            .unwrap();
        let err = writer
            .set_tracks(vec![Track::new(1, 1, TrackType::CdG, 0, 9)])
            .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedByFormat(_)));
    }

    #[test]
    fn subchannel_can_be_switched_off() {
        let dir = tempdir().unwrap();
        let mut writer = CueWriter::new();
        let options = WriterOptions::from([("subchannel".to_string(), "false".to_string())]);
        writer
            .create(&dir.path().join("a.cue"), MediaType::CdRom, &options, 10, 2048)
            .unwrap();
        writer
            .set_tracks(vec![Track::new(1, 1, TrackType::Mode1, 0, 9)])
            .unwrap();
        assert!(matches!(
            writer.write_sectors_tag(&[0u8; 96], 0, 1, SectorTagType::Subchannel),
            Err(ImageError::UnsupportedByFormat(_))
        ));
        assert!(
            !writer
                .supported_sector_tags()
                .contains(&SectorTagType::Subchannel)
        );
        assert!(
            writer
                .supported_sector_tags()
                .contains(&SectorTagType::TrackIsrc)
        );
    }

    #[test]
    fn writing_before_create_fails() {
        let mut writer = CueWriter::new();
        assert!(matches!(
            writer.write_sector_long(&[0u8; 2352], 0),
            Err(ImageError::NotCreated)
        ));
        assert!(writer.output_paths().is_empty());
    }
}
