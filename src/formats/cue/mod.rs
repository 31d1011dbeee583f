//! CDRWin cue sheets with raw or cooked data files.

pub mod error;
pub mod models;
pub mod parser;
pub mod writer;

use crate::cd::sector::{
    SectorTagType, encode_sector, extract_tag, extract_user_data, sector_size_for,
    structural_tags,
};
use crate::cd::subchannel::SubchannelType;
use crate::cd::{LEAD_IN_FRAMES, SUBCODE_SIZE};
use crate::formats::cue::models::CueSheet;
use crate::formats::cue::parser::parse_cue;
use crate::image::error::{ImageError, ImageResult};
use crate::image::models::{
    CicmMetadata, DumpHardware, FileType, ImageInfo, MediaTagType, MediaType, Session, Track,
    TrackFile,
};
use crate::image::reader::ImageReader;
use crate::image::resolver::{Representation, resolve};
use crate::image::table::TrackTable;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub use writer::CueWriter;

/// Dump hardware and CICM metadata stored next to the cue sheet.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    #[serde(default)]
    pub dump_hardware: Vec<DumpHardware>,
    #[serde(default)]
    pub cicm: Option<CicmMetadata>,
}

pub fn subchannel_path(cue_path: &Path) -> PathBuf {
    cue_path.with_extension("sub")
}

pub fn sidecar_path(cue_path: &Path) -> PathBuf {
    cue_path.with_extension("metadata.json")
}

pub fn detect(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("cue"))
}

/// Where the sector data of a data file starts and how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpan {
    pub offset: u64,
    pub length: u64,
}

pub struct CueImage {
    info: ImageInfo,
    table: TrackTable,
    handles: HashMap<PathBuf, File>,
    subchannel: Option<File>,
    cd_text: Option<Vec<u8>>,
    sidecar: Sidecar,
}

impl CueImage {
    pub fn open(path: &Path) -> ImageResult<Self> {
        info!("Opening cue sheet {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let sheet = parse_cue(&text)?;
        let dir = path.parent().unwrap_or(Path::new("."));

        let mut handles = HashMap::new();
        let mut spans = Vec::with_capacity(sheet.files.len());
        for file in &sheet.files {
            let data_path = dir.join(&file.filename);
            debug!("Opening data file {}", data_path.display());
            let mut handle = File::open(&data_path)?;
            spans.push(locate_samples(&mut handle, file.file_type)?);
            handles.insert(data_path, handle);
        }

        let subchannel = match File::open(subchannel_path(path)) {
            Ok(file) => {
                debug!("Found subchannel file for {}", path.display());
                Some(file)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let mut tracks = build_tracks(&sheet, dir, &spans)?;
        if subchannel.is_some() {
            for track in &mut tracks {
                track.subchannel = SubchannelType::Raw;
            }
        }
        let table = TrackTable::new(tracks)?;

        let cd_text = match &sheet.cd_text_file {
            Some(name) => Some(std::fs::read(dir.join(name))?),
            None => None,
        };

        let sidecar = match std::fs::read(sidecar_path(path)) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Sidecar::default(),
            Err(e) => return Err(e.into()),
        };

        let info = image_info(&sheet, &table, subchannel.is_some(), cd_text.is_some());
        info!(
            "Cue sheet describes {} tracks in {} sessions, {} sectors",
            table.tracks().len(),
            table.sessions().len(),
            info.sectors
        );

        Ok(Self {
            info,
            table,
            handles,
            subchannel,
            cd_text,
            sidecar,
        })
    }

    fn read_track_sectors(&mut self, start: u64, count: u32, long: bool) -> ImageResult<Vec<u8>> {
        let representation = if long {
            Representation::Long
        } else {
            Representation::User
        };
        let (track, backing) = {
            let plan = resolve(&self.table, start, count as u64, representation)?;
            (plan.track.clone(), plan.backing())
        };
        let (file, backing) = track
            .file
            .as_ref()
            .zip(backing)
            .ok_or_else(|| ImageError::not_present(format!("Data of track {}", track.sequence)))?;

        if file.file_type == FileType::Mp3 {
            return Err(ImageError::unimplemented("Reading MP3 audio"));
        }

        let mut stored = vec![0u8; (backing.stored * backing.sector_size as u64) as usize];
        if !stored.is_empty() {
            let handle = self
                .handles
                .get_mut(&file.path)
                .ok_or_else(|| ImageError::not_present(file.path.display().to_string()))?;
            handle.seek(SeekFrom::Start(backing.file_offset))?;
            handle.read_exact(&mut stored)?;
        }
        if matches!(file.file_type, FileType::Motorola | FileType::Aiff) {
            stored.chunks_exact_mut(2).for_each(|pair| pair.swap(0, 1));
        }

        let track_type = track.track_type;
        let stored_raw = file.sector_size == sector_size_for(track_type, true);
        let cooked_size = sector_size_for(track_type, false) as usize;
        let mut stored_sectors = stored.chunks_exact(backing.sector_size as usize);

        let mut buffer = Vec::new();
        for (i, lba) in (start..start + count as u64).enumerate() {
            let i = i as u64;
            let sector = if i >= backing.leading && i < backing.leading + backing.stored {
                stored_sectors.next()
            } else {
                None
            };
            match (sector, stored_raw, long) {
                (None, _, false) => buffer.resize(buffer.len() + cooked_size, 0),
                (None, _, true) => buffer.extend(encode_sector(
                    &vec![0; cooked_size],
                    lba as i64,
                    track_type,
                )?),
                (Some(s), true, true) | (Some(s), false, false) => buffer.extend_from_slice(s),
                (Some(s), true, false) => buffer.extend_from_slice(extract_user_data(s, track_type)?),
                (Some(s), false, true) => buffer.extend(encode_sector(s, lba as i64, track_type)?),
            }
        }
        Ok(buffer)
    }
}

impl ImageReader for CueImage {
    fn format_name(&self) -> &'static str {
        "cue"
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
        self.read_track_sectors(start, count, false)
    }

    fn read_sectors_long(&mut self, start: u64, count: u32) -> ImageResult<Vec<u8>> {
        self.read_track_sectors(start, count, true)
    }

    fn read_sectors_tag(
        &mut self,
        start: u64,
        count: u32,
        tag: SectorTagType,
    ) -> ImageResult<Vec<u8>> {
        let track_type = resolve(&self.table, start, count as u64, Representation::Tag(tag))?
            .track
            .track_type;

        match tag {
            SectorTagType::Subchannel => {
                let sub = self
                    .subchannel
                    .as_mut()
                    .ok_or_else(|| ImageError::not_present("Subchannel"))?;
                let length = count as u64 * SUBCODE_SIZE as u64;
                let mut buffer = Vec::with_capacity(length as usize);
                sub.seek(SeekFrom::Start(start * SUBCODE_SIZE as u64))?;
                sub.take(length).read_to_end(&mut buffer)?;
                buffer.resize(length as usize, 0);
                Ok(buffer)
            }
            t if t.is_per_track() => Err(ImageError::unsupported(format!(
                "Reading {t} as a sector tag"
            ))),
            _ => {
                let long = self.read_track_sectors(start, count, true)?;
                let raw_size = sector_size_for(track_type, true) as usize;
                let mut buffer = Vec::new();
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
        match tag {
            MediaTagType::CdMcn => self
                .info
                .metadata
                .mcn
                .as_ref()
                .map(|mcn| mcn.as_bytes().to_vec())
                .ok_or_else(|| ImageError::not_present("MCN")),
            MediaTagType::CdText => self
                .cd_text
                .clone()
                .ok_or_else(|| ImageError::not_present("CD-Text")),
            t => Err(ImageError::unsupported(format!("Reading {t} media tags"))),
        }
    }

    fn dump_hardware(&self) -> Option<&[DumpHardware]> {
        (!self.sidecar.dump_hardware.is_empty()).then_some(self.sidecar.dump_hardware.as_slice())
    }

    fn cicm_metadata(&self) -> Option<&CicmMetadata> {
        self.sidecar.cicm.as_ref()
    }
}

/// Finds the sample data inside WAVE and AIFF containers; other files are used whole.
pub fn locate_samples<R: Read + Seek>(reader: &mut R, file_type: FileType) -> ImageResult<SampleSpan> {
    let file_length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    match file_type {
        FileType::Binary | FileType::Motorola => Ok(SampleSpan {
            offset: 0,
            length: file_length,
        }),
        FileType::Mp3 => Err(ImageError::unimplemented("MP3 audio files")),
        FileType::Wave => {
            let mut header = [0u8; 12];
            reader.read_exact(&mut header)?;
            if &header[..4] != b"RIFF" || &header[8..] != b"WAVE" {
                return Err(ImageError::not_present("RIFF WAVE header"));
            }
            find_chunk(reader, file_length, b"data", |r| r.read_u32::<LittleEndian>())
        }
        FileType::Aiff => {
            let mut header = [0u8; 12];
            reader.read_exact(&mut header)?;
            if &header[..4] != b"FORM" || !matches!(&header[8..], b"AIFF" | b"AIFC") {
                return Err(ImageError::not_present("AIFF header"));
            }
            let chunk = find_chunk(reader, file_length, b"SSND", |r| r.read_u32::<BigEndian>())?;
            reader.seek(SeekFrom::Start(chunk.offset))?;
            let data_offset = reader.read_u32::<BigEndian>()? as u64;
            let _block_size = reader.read_u32::<BigEndian>()?;
            Ok(SampleSpan {
                offset: chunk.offset + 8 + data_offset,
                length: chunk.length.saturating_sub(8 + data_offset),
            })
        }
    }
}

fn find_chunk<R: Read + Seek>(
    reader: &mut R,
    file_length: u64,
    id: &[u8; 4],
    read_size: impl Fn(&mut R) -> std::io::Result<u32>,
) -> ImageResult<SampleSpan> {
    let mut position = 12u64;
    while position + 8 <= file_length {
        reader.seek(SeekFrom::Start(position))?;
        let mut chunk_id = [0u8; 4];
        reader.read_exact(&mut chunk_id)?;
        let size = read_size(reader)? as u64;
        if &chunk_id == id {
            return Ok(SampleSpan {
                offset: position + 8,
                length: size.min(file_length - position - 8),
            });
        }
        position += 8 + size + (size & 1);
    }
    Err(ImageError::not_present(format!(
        "{} chunk",
        String::from_utf8_lossy(id)
    )))
}

/// Lays the tracks of a cue sheet out on consecutive absolute sectors.
///
/// `PREGAP` and `POSTGAP` sectors are part of their track but are not stored. A first track with
/// no pregap of its own gets the 150 sector lead-in pregap, which lies before sector 0.
pub fn build_tracks(sheet: &CueSheet, dir: &Path, spans: &[SampleSpan]) -> ImageResult<Vec<Track>> {
    let mut tracks = Vec::new();
    let mut next = 0u64;

    for (file, span) in sheet.files.iter().zip(spans) {
        let path = dir.join(&file.filename);
        let data_end = span.offset + span.length;
        let mut offset = span.offset;

        for (i, cue_track) in file.tracks.iter().enumerate() {
            let size = cue_track.track_type.stored_sector_size() as u64;
            let first_stored = cue_track
                .first_stored()
                .map(|m| m.to_frames() as u64)
                .unwrap_or(0);
            let index1 = cue_track
                .index(1)
                .map(|m| m.to_frames() as u64)
                .unwrap_or(first_stored);
            let stored = match file.tracks.get(i + 1).and_then(|t| t.first_stored()) {
                Some(next_start) => (next_start.to_frames() as u64)
                    .checked_sub(first_stored)
                    .ok_or(ImageError::InvalidTrackRange {
                        track: cue_track.number,
                        start: first_stored,
                        end: next_start.to_frames() as u64,
                    })?,
                None => {
                    let remaining = data_end.saturating_sub(offset);
                    if remaining % size != 0 {
                        warn!(
                            "{} is not a whole number of {size} byte sectors",
                            file.filename
                        );
                    }
                    remaining / size
                }
            };

            let synthesized = cue_track.pregap.map(|m| m.to_frames() as u64).unwrap_or(0);
            let postgap = cue_track.postgap.map(|m| m.to_frames() as u64).unwrap_or(0);
            let length = synthesized + stored + postgap;
            if length == 0 {
                return Err(ImageError::InvalidTrackRange {
                    track: cue_track.number,
                    start: next,
                    end: next,
                });
            }

            let start = next;
            let mut track = Track::new(
                cue_track.number,
                cue_track.session,
                cue_track.track_type.track_type(),
                start,
                start + length - 1,
            );
            track.pregap = synthesized + index1 - first_stored;
            track.postgap = postgap;
            track.flags = cue_track.flags;
            track.isrc = cue_track.isrc.clone();
            track.indexes.clear();
            if track.pregap > 0 {
                track.indexes.insert(0, start as i64);
            } else if tracks.is_empty() {
                track.pregap = LEAD_IN_FRAMES as u64;
                track.indexes.insert(0, -LEAD_IN_FRAMES);
            }
            for index in cue_track.indices.iter().filter(|i| i.number > 0) {
                let position = index.position.to_frames() as u64 - first_stored;
                track
                    .indexes
                    .insert(index.number, (start + synthesized + position) as i64);
            }
            track.file = Some(TrackFile {
                path: path.clone(),
                offset,
                file_type: file.file_type,
                sector_size: size as u32,
                synthesized_pregap: synthesized,
                stored_sectors: stored,
            });

            next = start + length;
            offset += stored * size;
            tracks.push(track);
        }
    }

    Ok(tracks)
}

fn image_info(sheet: &CueSheet, table: &TrackTable, subchannel: bool, cd_text: bool) -> ImageInfo {
    let tracks = table.tracks();

    let mut tags: Vec<SectorTagType> = tracks
        .iter()
        .flat_map(|t| structural_tags(t.track_type).iter().copied())
        .collect();
    tags.push(SectorTagType::TrackFlags);
    if subchannel {
        tags.push(SectorTagType::Subchannel);
    }
    if tracks.iter().any(|t| t.isrc.is_some()) {
        tags.push(SectorTagType::TrackIsrc);
    }
    tags.sort();
    tags.dedup();

    let mut media_tags = Vec::new();
    if sheet.metadata.mcn.is_some() {
        media_tags.push(MediaTagType::CdMcn);
    }
    if cd_text {
        media_tags.push(MediaTagType::CdText);
    }

    let media_type = sheet
        .metadata
        .original_media_type
        .as_deref()
        .and_then(|m| m.parse::<MediaType>().ok())
        .unwrap_or_else(|| MediaType::from_tracks(tracks));

    ImageInfo {
        sectors: table.total_sectors(),
        sector_size: tracks
            .iter()
            .map(|t| t.bytes_per_sector())
            .max()
            .unwrap_or(0),
        media_type,
        readable_sector_tags: tags,
        readable_media_tags: media_tags,
        application: Some("CDRWin".to_string()),
        comments: sheet.metadata.comment.clone(),
        metadata: sheet.metadata.clone(),
        ..ImageInfo::default()
    }
}
