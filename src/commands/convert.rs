use crate::commands::sector_bar;
use clap::Parser;
use disc_converto::convert::{ConversionEngine, ConversionReport, ConvertOptions, DEFAULT_CHUNK_SIZE};
use disc_converto::{DiscConvertoError, DiscConvertoResult, FormatRegistry, WriterOptions};
use indicatif::{MultiProgress, ProgressBar};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

/// Converts a disc image into another format.
#[derive(Parser, Debug, Clone)]
pub struct ConvertCommand {
    /// Image to read
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Image to create, its extension picks the format unless --format is given
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Copy long sectors, subchannel and track tags instead of user data only
    #[arg(long, short = 'l', default_value_t = false)]
    pub long: bool,

    /// Force overwrite of the output file if it already exists
    #[arg(long, short = 'f', default_value_t = false)]
    pub force: bool,

    /// Sectors read and written per call
    #[arg(long, value_name = "SECTORS", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u32,

    /// Option for the output format, e.g. -O subchannel=false
    #[arg(short = 'O', value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, String)>,

    /// Pass debug=true to the output format
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// MD5 the output file must have
    #[arg(long, value_name = "HEX")]
    pub expected_md5: Option<String>,

    /// Output format name, overriding the extension
    #[arg(long, value_name = "NAME")]
    pub format: Option<String>,
}

fn parse_option(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("Expected KEY=VALUE, got {s}"))
}

pub async fn convert_image(
    cmd: ConvertCommand,
    registry: Arc<FormatRegistry>,
    multi: MultiProgress,
) -> DiscConvertoResult<()> {
    if fs::metadata(&cmd.output).await.is_ok() && !cmd.force {
        return Err(DiscConvertoError::OutputExists(cmd.output));
    }
    if let Some(name) = &cmd.format {
        if registry.find(name).is_none() {
            return Err(DiscConvertoError::UnknownFormat(name.clone()));
        }
    }

    let pb = sector_bar(&multi);
    let report = tokio::task::spawn_blocking(move || run(&registry, &cmd, pb))
        .await
        .map_err(std::io::Error::other)??;

    info!(
        "Copied {} sectors ({} long chunks, {} fell back to user data, {} track table repairs)",
        report.sectors, report.long_chunks, report.cooked_fallbacks, report.table_repairs
    );
    match report.hash_matches {
        Some(true) => info!("Output MD5 matches"),
        Some(false) => warn!("Output MD5 does not match"),
        None => {}
    }
    Ok(())
}

fn run(
    registry: &FormatRegistry,
    cmd: &ConvertCommand,
    pb: ProgressBar,
) -> DiscConvertoResult<ConversionReport> {
    let mut input = registry.open(&cmd.input)?;
    let mut output = registry.writer_for(&cmd.output, cmd.format.as_deref())?;
    info!(
        "Converting {} ({}) to {}",
        cmd.input.display(),
        input.format_name(),
        output.format_name()
    );

    let options = ConvertOptions {
        long: cmd.long,
        chunk_size: cmd.chunk_size,
        options: cmd.options.iter().cloned().collect::<WriterOptions>(),
        debug: cmd.debug,
        expected_md5: cmd.expected_md5.clone(),
    };

    let result = ConversionEngine::new(input.as_mut(), output.as_mut(), &cmd.output, options)
        .with_progress(pb)
        .run();

    result.map_err(|e| {
        for path in output.output_paths() {
            match std::fs::remove_file(&path) {
                Ok(()) => info!("Removed partial output {}", path.display()),
                Err(err) => warn!("Could not remove {}: {err}", path.display()),
            }
        }
        e.into()
    })
}
