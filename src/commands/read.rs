use crate::commands::sector_bar;
use clap::Parser;
use disc_converto::verify::read_through;
use disc_converto::{DiscConvertoResult, FormatRegistry};
use indicatif::MultiProgress;
use std::path::PathBuf;
use std::sync::Arc;

/// Reads every sector of an image once and prints checksums of its contents.
#[derive(Parser, Debug, Clone)]
pub struct ReadCommand {
    /// Image to read
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

pub async fn read_image(
    cmd: ReadCommand,
    registry: Arc<FormatRegistry>,
    multi: MultiProgress,
) -> DiscConvertoResult<()> {
    let pb = sector_bar(&multi);
    let progress = pb.clone();
    let report = tokio::task::spawn_blocking(move || -> DiscConvertoResult<_> {
        let mut image = registry.open(&cmd.input)?;
        Ok(read_through(image.as_mut(), Some(&progress))?)
    })
    .await
    .map_err(std::io::Error::other)??;
    pb.finish_and_clear();

    println!("Sectors:        {}", report.sectors);
    println!("User data MD5:  {}", report.user_data_md5);
    if let Some(md5) = &report.long_md5 {
        println!("Long MD5:       {md5}");
    }
    if let Some(md5) = &report.subchannel_md5 {
        println!("Subchannel MD5: {md5}");
    }
    Ok(())
}
