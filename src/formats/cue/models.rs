use crate::cd::Msf;
use crate::cd::sector::{TrackType, sector_size_for};
use crate::formats::cue::error::{CueError, CueResult};
use crate::image::models::{DiscMetadata, FileType, TrackFlags};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueSheet {
    pub files: Vec<CueFile>,
    pub metadata: DiscMetadata,
    pub cd_text_file: Option<String>,
}

impl CueSheet {
    pub fn tracks(&self) -> impl Iterator<Item = &CueTrack> {
        self.files.iter().flat_map(|f| f.tracks.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CueFile {
    pub filename: String,
    pub file_type: FileType,
    pub tracks: Vec<CueTrack>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CueTrack {
    pub number: u32,
    pub session: u16,
    pub track_type: CueTrackType,
    pub indices: Vec<Index>,
    pub pregap: Option<Msf>,
    pub postgap: Option<Msf>,
    pub flags: TrackFlags,
    pub isrc: Option<String>,
}

impl CueTrack {
    pub fn index(&self, number: u16) -> Option<Msf> {
        self.indices
            .iter()
            .find(|i| i.number == number)
            .map(|i| i.position)
    }

    /// Position of the first sector this track stores in its file.
    pub fn first_stored(&self) -> Option<Msf> {
        self.indices.first().map(|i| i.position)
    }
}

/// `INDEX` position, relative to the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub number: u16,
    pub position: Msf,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueTrackType {
    Audio,
    CdG,
    Mode1_2048,
    Mode1_2352,
    Mode2_2048,
    Mode2_2324,
    Mode2_2336,
    Mode2_2352,
    CdI2336,
    CdI2352,
}

impl CueTrackType {
    pub fn parse(type_str: &str) -> CueResult<Self> {
        match type_str.to_ascii_uppercase().as_str() {
            "AUDIO" => Ok(CueTrackType::Audio),
            "CDG" => Ok(CueTrackType::CdG),
            "MODE1/2048" => Ok(CueTrackType::Mode1_2048),
            "MODE1/2352" => Ok(CueTrackType::Mode1_2352),
            "MODE2/2048" => Ok(CueTrackType::Mode2_2048),
            "MODE2/2324" => Ok(CueTrackType::Mode2_2324),
            "MODE2/2336" => Ok(CueTrackType::Mode2_2336),
            "MODE2/2352" => Ok(CueTrackType::Mode2_2352),
            "CDI/2336" => Ok(CueTrackType::CdI2336),
            "CDI/2352" => Ok(CueTrackType::CdI2352),
            _ => Err(CueError::InvalidTrackType(type_str.to_string())),
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            CueTrackType::Audio => "AUDIO",
            CueTrackType::CdG => "CDG",
            CueTrackType::Mode1_2048 => "MODE1/2048",
            CueTrackType::Mode1_2352 => "MODE1/2352",
            CueTrackType::Mode2_2048 => "MODE2/2048",
            CueTrackType::Mode2_2324 => "MODE2/2324",
            CueTrackType::Mode2_2336 => "MODE2/2336",
            CueTrackType::Mode2_2352 => "MODE2/2352",
            CueTrackType::CdI2336 => "CDI/2336",
            CueTrackType::CdI2352 => "CDI/2352",
        }
    }

    pub fn track_type(self) -> TrackType {
        match self {
            CueTrackType::Audio => TrackType::Audio,
            CueTrackType::CdG => TrackType::CdG,
            CueTrackType::Mode1_2048 | CueTrackType::Mode1_2352 => TrackType::Mode1,
            CueTrackType::Mode2_2048 => TrackType::Mode2Form1,
            CueTrackType::Mode2_2324 => TrackType::Mode2Form2,
            CueTrackType::Mode2_2336 | CueTrackType::Mode2_2352 => TrackType::Mode2Formless,
            CueTrackType::CdI2336 | CueTrackType::CdI2352 => TrackType::CdI,
        }
    }

    /// Bytes per sector in the data file.
    pub fn stored_sector_size(self) -> u32 {
        match self {
            CueTrackType::Mode1_2352
            | CueTrackType::Mode2_2352
            | CueTrackType::CdI2352 => sector_size_for(self.track_type(), true),
            _ => sector_size_for(self.track_type(), false),
        }
    }

    /// The raw form the writer uses for a track type, `None` when it has no CUE spelling.
    pub fn raw_for(track_type: TrackType) -> Option<Self> {
        match track_type {
            TrackType::Audio => Some(CueTrackType::Audio),
            TrackType::Mode1 => Some(CueTrackType::Mode1_2352),
            TrackType::Mode2Form1 | TrackType::Mode2Form2 | TrackType::Mode2Formless => {
                Some(CueTrackType::Mode2_2352)
            }
            TrackType::CdI => Some(CueTrackType::CdI2352),
            TrackType::CdG => None,
        }
    }
}

pub fn parse_file_type(type_str: &str) -> CueResult<FileType> {
    match type_str.to_ascii_uppercase().as_str() {
        "BINARY" => Ok(FileType::Binary),
        "MOTOROLA" => Ok(FileType::Motorola),
        "AIFF" => Ok(FileType::Aiff),
        "WAVE" => Ok(FileType::Wave),
        "MP3" => Ok(FileType::Mp3),
        _ => Err(CueError::InvalidFileType(type_str.to_string())),
    }
}

pub fn parse_flag(flag: &str) -> CueResult<TrackFlags> {
    match flag.to_ascii_uppercase().as_str() {
        "DCP" => Ok(TrackFlags::COPY_PERMITTED),
        "4CH" => Ok(TrackFlags::FOUR_CHANNEL),
        "PRE" => Ok(TrackFlags::PRE_EMPHASIS),
        "SCMS" => Ok(TrackFlags::SERIAL_COPY_MANAGEMENT),
        "DATA" => Ok(TrackFlags::DATA),
        _ => Err(CueError::InvalidFlag(flag.to_string())),
    }
}

/// Cue keywords for the flags a `FLAGS` line can carry; the data bit follows from the track type.
pub fn flag_keywords(flags: TrackFlags) -> Vec<&'static str> {
    [
        (TrackFlags::COPY_PERMITTED, "DCP"),
        (TrackFlags::FOUR_CHANNEL, "4CH"),
        (TrackFlags::PRE_EMPHASIS, "PRE"),
        (TrackFlags::SERIAL_COPY_MANAGEMENT, "SCMS"),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, keyword)| keyword)
    .collect()
}

pub fn parse_msf(msf_str: &str) -> CueResult<Msf> {
    let parts: Vec<&str> = msf_str.split(':').collect();
    if parts.len() != 3 {
        return Err(CueError::InvalidMSFFormat(msf_str.to_string()));
    }

    Ok(Msf::new(
        parts[0].parse()?,
        parts[1].parse()?,
        parts[2].parse()?,
    )?)
}
