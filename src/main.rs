use crate::commands::convert::convert_image;
use crate::commands::info::describe_image;
use crate::commands::read::read_image;
use crate::commands::{Cli, Commands};
use anyhow::Result;
use clap::Parser;
use disc_converto::FormatRegistry;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use std::sync::Arc;

mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let logger = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .build();

    let level = logger.filter();
    let pb = MultiProgress::new();

    LogWrapper::new(pb.clone(), logger).try_init()?;
    log::set_max_level(level);

    let cli = Cli::parse();
    let registry = Arc::new(FormatRegistry::with_builtin());

    match cli.command {
        Commands::Convert(cmd) => convert_image(cmd, registry, pb.clone()).await?,
        Commands::Read(cmd) => read_image(cmd, registry, pb.clone()).await?,
        Commands::Info(cmd) => describe_image(cmd, registry).await?,
    }

    Ok(())
}
