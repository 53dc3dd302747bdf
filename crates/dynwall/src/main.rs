mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dynwall_core::builder;
use dynwall_core::writer::AvifencWriter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();
    info!(
        manifest = ?cli.manifest,
        output = ?cli.output,
        max_threads = ?cli.max_threads,
        encoder = ?cli.encoder,
        "starting build"
    );

    let request = cli.build_request();
    let writer = AvifencWriter::new(&cli.encoder);
    let target = builder::build(&request, &writer)
        .with_context(|| format!("failed to build {}", request.output_path().display()))?;

    info!(?target, "wallpaper ready");
    Ok(())
}
