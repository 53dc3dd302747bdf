use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

use dynwall_core::builder::BuildRequest;
use dynwall_core::writer::DEFAULT_ENCODER;

#[derive(Parser, Debug)]
#[command(
    name = "dynwall",
    version,
    about = "Build a dynamic wallpaper from a JSON manifest"
)]
pub struct Cli {
    /// Manifest file to use.
    #[arg(value_name = "json")]
    pub manifest: PathBuf,

    /// Write output to <file> (default: wallpaper.avif).
    #[arg(long, value_name = "file")]
    pub output: Option<OsString>,

    /// Maximum number of threads that can be used when encoding a wallpaper.
    #[arg(long, value_name = "max-threads")]
    pub max_threads: Option<NonZeroUsize>,

    /// avifenc executable used to encode the wallpaper.
    #[arg(long, value_name = "path", env = "DYNWALL_AVIFENC", default_value = DEFAULT_ENCODER)]
    pub encoder: PathBuf,
}

impl Cli {
    pub fn build_request(&self) -> BuildRequest {
        BuildRequest {
            manifest: self.manifest.clone(),
            output: self.output.clone().map(PathBuf::from),
            max_threads: self.max_threads,
        }
    }
}
