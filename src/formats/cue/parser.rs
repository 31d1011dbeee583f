use crate::formats::cue::error::{CueError, CueResult};
use crate::formats::cue::models::{
    CueFile, CueSheet, CueTrack, CueTrackType, Index, parse_file_type, parse_flag, parse_msf,
};
use crate::image::models::{DiscMetadata, TrackFlags};
use log::{debug, warn};

/// Everything the parser has seen so far.
///
/// Lines are folded into the state one at a time; the sheet only exists once `finish` succeeds.
#[derive(Debug)]
struct ParserState {
    line: usize,
    session: u16,
    files: Vec<CueFile>,
    file: Option<CueFile>,
    track: Option<CueTrack>,
    metadata: DiscMetadata,
    cd_text_file: Option<String>,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            line: 0,
            session: 1,
            files: Vec::new(),
            file: None,
            track: None,
            metadata: DiscMetadata::default(),
            cd_text_file: None,
        }
    }
}

pub fn parse_cue(text: &str) -> CueResult<CueSheet> {
    text.lines()
        .enumerate()
        .map(|(number, line)| (number + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .try_fold(ParserState::default(), |state, (number, line)| {
            state.step(number, line)
        })?
        .finish()
}

impl ParserState {
    fn step(mut self, line: usize, text: &str) -> CueResult<Self> {
        self.line = line;
        let tokens = tokenize(text)?;
        let Some((directive, args)) = tokens.split_first() else {
            return Ok(self);
        };

        match directive.to_ascii_uppercase().as_str() {
            "REM" => self.rem(args)?,
            "FILE" => {
                let [filename, file_type] = self.args::<2>("FILE", args)?;
                let file_type = parse_file_type(&file_type)?;
                self.close_file();
                self.file = Some(CueFile {
                    filename,
                    file_type,
                    tracks: Vec::new(),
                });
            }
            "TRACK" => {
                if self.file.is_none() {
                    return Err(self.out_of_place("TRACK"));
                }
                let [number, track_type] = self.args::<2>("TRACK", args)?;
                let track_type = CueTrackType::parse(&track_type)?;
                self.close_track();
                self.track = Some(CueTrack {
                    number: number.parse()?,
                    session: self.session,
                    track_type,
                    indices: Vec::new(),
                    pregap: None,
                    postgap: None,
                    flags: if track_type.track_type().is_audio() {
                        TrackFlags::empty()
                    } else {
                        TrackFlags::DATA
                    },
                    isrc: None,
                });
            }
            "INDEX" => {
                let [number, position] = self.args::<2>("INDEX", args)?;
                let index = Index {
                    number: number.parse()?,
                    position: parse_msf(&position)?,
                };
                let line = self.line;
                let track = self.track_mut("INDEX")?;
                let ordered = track.indices.last().is_none_or(|last| {
                    last.number < index.number && last.position <= index.position
                });
                if !ordered {
                    return Err(CueError::DirectiveOutOfPlace {
                        line,
                        directive: format!("INDEX {:02}", index.number),
                    });
                }
                track.indices.push(index);
            }
            "PREGAP" => {
                let [length] = self.args::<1>("PREGAP", args)?;
                let length = parse_msf(&length)?;
                self.track_before_index("PREGAP")?.pregap = Some(length);
            }
            "POSTGAP" => {
                let [length] = self.args::<1>("POSTGAP", args)?;
                let length = parse_msf(&length)?;
                let line = self.line;
                let track = self.track_mut("POSTGAP")?;
                if track.indices.is_empty() {
                    return Err(CueError::DirectiveOutOfPlace {
                        line,
                        directive: "POSTGAP".to_string(),
                    });
                }
                track.postgap = Some(length);
            }
            "FLAGS" => {
                let flags = args
                    .iter()
                    .map(|flag| parse_flag(flag))
                    .collect::<CueResult<Vec<_>>>()?;
                let track = self.track_before_index("FLAGS")?;
                track.flags |= flags.into_iter().fold(TrackFlags::empty(), |a, b| a | b);
            }
            "ISRC" => {
                let [isrc] = self.args::<1>("ISRC", args)?;
                self.track_before_index("ISRC")?.isrc = Some(isrc);
            }
            "CATALOG" => {
                let [mcn] = self.args::<1>("CATALOG", args)?;
                self.disc_level("CATALOG")?;
                self.metadata.mcn = Some(mcn);
            }
            "CDTEXTFILE" => {
                let [file] = self.args::<1>("CDTEXTFILE", args)?;
                self.disc_level("CDTEXTFILE")?;
                self.cd_text_file = Some(file);
            }
            "UPC_EAN" => {
                let [barcode] = self.args::<1>("UPC_EAN", args)?;
                self.disc_level("UPC_EAN")?;
                self.metadata.barcode = Some(barcode);
            }
            keyword @ ("TITLE" | "PERFORMER" | "SONGWRITER" | "COMPOSER" | "ARRANGER") => {
                let [value] = self.args::<1>(keyword, args)?;
                if self.track.is_some() {
                    debug!("Ignoring track level {keyword} on line {line}");
                    return Ok(self);
                }
                let field = match keyword {
                    "TITLE" => &mut self.metadata.title,
                    "PERFORMER" => &mut self.metadata.performer,
                    "SONGWRITER" => &mut self.metadata.songwriter,
                    "COMPOSER" => &mut self.metadata.composer,
                    _ => &mut self.metadata.arranger,
                };
                *field = Some(value);
            }
            other => warn!("Skipping unknown cue directive {other} on line {line}"),
        }

        Ok(self)
    }

    fn rem(&mut self, args: &[String]) -> CueResult<()> {
        let Some((keyword, rest)) = args.split_first() else {
            return Ok(());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "SESSION" => {
                let [number] = self.args::<1>("REM SESSION", rest)?;
                self.close_track();
                self.session = number.parse()?;
            }
            "GENRE" => self.metadata.genre = Some(rest.join(" ")),
            "DISCID" => self.metadata.disc_id = Some(rest.join(" ")),
            "COMMENT" => self.metadata.comment = Some(rest.join(" ")),
            "ORIGINAL" => {
                // REM ORIGINAL MEDIA-TYPE: <type>
                let value = rest
                    .iter()
                    .skip_while(|word| word.to_ascii_uppercase().starts_with("MEDIA-TYPE"))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !value.is_empty() {
                    self.metadata.original_media_type = Some(value);
                }
            }
            other => debug!("Ignoring REM {other} on line {}", self.line),
        }
        Ok(())
    }

    fn finish(mut self) -> CueResult<CueSheet> {
        self.close_file();

        let tracks: Vec<&CueTrack> = self.files.iter().flat_map(|f| f.tracks.iter()).collect();
        if tracks.is_empty() {
            return Err(CueError::NoTracks);
        }
        if let Some(track) = tracks.iter().find(|t| t.index(1).is_none()) {
            return Err(CueError::MissingIndex(track.number));
        }

        debug!(
            "Parsed cue sheet with {} files and {} tracks",
            self.files.len(),
            tracks.len()
        );

        Ok(CueSheet {
            files: self.files,
            metadata: self.metadata,
            cd_text_file: self.cd_text_file,
        })
    }

    fn close_track(&mut self) {
        if let Some(track) = self.track.take() {
            if let Some(file) = self.file.as_mut() {
                file.tracks.push(track);
            }
        }
    }

    fn close_file(&mut self) {
        self.close_track();
        if let Some(file) = self.file.take() {
            self.files.push(file);
        }
    }

    fn out_of_place(&self, directive: &str) -> CueError {
        CueError::DirectiveOutOfPlace {
            line: self.line,
            directive: directive.to_string(),
        }
    }

    fn args<const N: usize>(&self, directive: &str, args: &[String]) -> CueResult<[String; N]> {
        args.get(..N)
            .and_then(|found| <[String; N]>::try_from(found.to_vec()).ok())
            .ok_or_else(|| CueError::MissingArgument {
                line: self.line,
                directive: directive.to_string(),
            })
    }

    fn track_mut(&mut self, directive: &str) -> CueResult<&mut CueTrack> {
        let error = self.out_of_place(directive);
        self.track.as_mut().ok_or(error)
    }

    fn track_before_index(&mut self, directive: &str) -> CueResult<&mut CueTrack> {
        let error = self.out_of_place(directive);
        match self.track.as_mut() {
            Some(track) if track.indices.is_empty() => Ok(track),
            _ => Err(error),
        }
    }

    fn disc_level(&self, directive: &str) -> CueResult<()> {
        if self.track.is_some() || !self.files.is_empty() || self.file.is_some() {
            return Err(self.out_of_place(directive));
        }
        Ok(())
    }
}

/// Splits a cue line into words, keeping quoted strings together.
fn tokenize(line: &str) -> CueResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut rest = line.trim_start();

    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').ok_or(CueError::MissingQuoteError(
                "Missing closing quote".to_string(),
            ))?;
            let after = &quoted[end + 1..];
            if !after.is_empty() && !after.starts_with(char::is_whitespace) {
                return Err(CueError::InvalidQuotedString(line.to_string()));
            }
            tokens.push(quoted[..end].to_string());
            rest = after.trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(rest[..end].to_string());
            rest = rest[end..].trim_start();
        }
    }

    Ok(tokens)
}
