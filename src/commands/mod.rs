use crate::commands::convert::ConvertCommand;
use crate::commands::info::InfoCommand;
use crate::commands::read::ReadCommand;
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub mod convert;
pub mod info;
pub mod read;

/// CLI for reading, verifying and converting optical disc images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Convert(ConvertCommand),
    Read(ReadCommand),
    Info(InfoCommand),
}

/// Progress bar counting sectors, attached to the bar the logger writes around.
pub fn sector_bar(multi: &MultiProgress) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "  {spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sectors {msg}",
    )
    .map(|style| style.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let pb = multi.add(ProgressBar::new(0));
    pb.set_style(style);
    pb
}
