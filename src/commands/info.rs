use clap::Parser;
use disc_converto::cd::Msf;
use disc_converto::image::models::{ImageInfo, Session, Track};
use disc_converto::{DiscConvertoResult, FormatRegistry};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Prints what an image contains.
#[derive(Parser, Debug, Clone)]
pub struct InfoCommand {
    /// Image to describe
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Print as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Serialize)]
struct Description {
    format: &'static str,
    info: ImageInfo,
    sessions: Vec<Session>,
    tracks: Vec<Track>,
}

pub async fn describe_image(cmd: InfoCommand, registry: Arc<FormatRegistry>) -> DiscConvertoResult<()> {
    let input = cmd.input.clone();
    let description = tokio::task::spawn_blocking(move || -> DiscConvertoResult<_> {
        let image = registry.open(&input)?;
        Ok(Description {
            format: image.format_name(),
            info: image.info().clone(),
            sessions: image.sessions().to_vec(),
            tracks: image.tracks().to_vec(),
        })
    })
    .await
    .map_err(std::io::Error::other)??;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&description)?);
        return Ok(());
    }

    let info = &description.info;
    println!("Format:     {}", description.format);
    println!("Media type: {}", info.media_type);
    println!("Sectors:    {}", info.sectors);
    if let Some(title) = &info.metadata.title {
        println!("Title:      {title}");
    }
    if let Some(mcn) = &info.metadata.mcn {
        println!("MCN:        {mcn}");
    }

    for session in &description.sessions {
        println!(
            "Session {}: tracks {} to {}, sectors {} to {}",
            session.sequence,
            session.start_track,
            session.end_track,
            session.start_sector,
            session.end_sector
        );
    }
    for track in &description.tracks {
        let start = Msf::from_lba(track.start as i64)
            .map(|m| m.to_string())
            .unwrap_or_default();
        println!(
            "  Track {:>2} {:<10} {:>7} - {:<7} ({start}) pregap {} flags {:?}{}",
            track.sequence,
            track.track_type.to_string(),
            track.start,
            track.end,
            track.pregap,
            track.flags,
            track
                .isrc
                .as_ref()
                .map(|isrc| format!(" ISRC {isrc}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
