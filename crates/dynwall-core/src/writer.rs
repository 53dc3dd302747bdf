use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::metadata::WallpaperMetaData;
use crate::xmp;

pub const DEFAULT_ENCODER: &str = "avifenc";

/// One input frame of the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub path: PathBuf,
}

impl ImageView {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Everything a [`PackageWriter`] needs to produce one package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterConfig {
    pub images: Vec<ImageView>,
    pub meta_data: Vec<WallpaperMetaData>,
    /// Upper bound on encoder threads, or None for the encoder's default.
    pub max_thread_count: Option<NonZeroUsize>,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("No images have been provided")]
    NoImages,

    #[error("No metadata has been provided")]
    NoMetaData,

    #[error("Invalid metadata record at position {position}")]
    InvalidMetaData { position: usize },

    #[error("Solar and day-night metadata cannot be mixed in one wallpaper")]
    MixedMetaData,

    #[error("Metadata refers to image {index}, but only {count} images have been provided")]
    IndexOutOfRange { index: u32, count: usize },

    #[error("Failed to read {}: {source}", .path.display())]
    ImageProbe {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(
        "{} is {width}x{height}, but the first image is {expected_width}x{expected_height}",
        .path.display()
    )]
    DimensionMismatch {
        path: PathBuf,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("Output directory {} does not exist", .path.display())]
    MissingOutputDir { path: PathBuf },

    #[error("Failed to write XMP metadata: {0}")]
    Xmp(#[source] io::Error),

    #[error("Failed to run {}: {source}. Is avifenc installed?", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} failed ({status}): {stderr}", .program.display())]
    Encoder {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
}

/// Packages frames and metadata into a single wallpaper file.
pub trait PackageWriter {
    /// Write the package to `target`. On error, `target` may hold a partial file.
    fn flush(&self, config: &WriterConfig, target: &Path) -> Result<(), WriteError>;
}

/// Check the config before any encoder work starts.
///
/// Returns the shared frame dimensions. Only image headers are read.
pub fn validate(config: &WriterConfig) -> Result<(u32, u32), WriteError> {
    if config.images.is_empty() {
        return Err(WriteError::NoImages);
    }
    let Some(first) = config.meta_data.first() else {
        return Err(WriteError::NoMetaData);
    };

    for (position, md) in config.meta_data.iter().enumerate() {
        if md.kind() != first.kind() {
            return Err(WriteError::MixedMetaData);
        }
        let Some(index) = md.index().filter(|_| md.is_valid()) else {
            return Err(WriteError::InvalidMetaData { position });
        };
        if index as usize >= config.images.len() {
            return Err(WriteError::IndexOutOfRange {
                index,
                count: config.images.len(),
            });
        }
    }

    let mut expected: Option<(u32, u32)> = None;
    for image in &config.images {
        let (width, height) =
            image::image_dimensions(&image.path).map_err(|source| WriteError::ImageProbe {
                path: image.path.clone(),
                source,
            })?;
        debug!(path = ?image.path, width, height, "probed image");

        match expected {
            None => expected = Some((width, height)),
            Some((expected_width, expected_height))
                if (expected_width, expected_height) != (width, height) =>
            {
                return Err(WriteError::DimensionMismatch {
                    path: image.path.clone(),
                    width,
                    height,
                    expected_width,
                    expected_height,
                });
            }
            Some(_) => {}
        }
    }

    // Non-empty images guarantee at least one probe.
    Ok(expected.unwrap_or_default())
}

/// Writes AVIF image sequences by running the `avifenc` CLI.
#[derive(Debug, Clone)]
pub struct AvifencWriter {
    program: PathBuf,
}

impl Default for AvifencWriter {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ENCODER),
        }
    }
}

impl AvifencWriter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, config: &WriterConfig, xmp_path: &Path, target: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(jobs) = config.max_thread_count {
            cmd.arg("--jobs").arg(jobs.to_string());
        }
        cmd.arg("--xmp").arg(xmp_path);
        for image in &config.images {
            cmd.arg(&image.path);
        }
        cmd.arg("-o").arg(target);
        cmd
    }
}

impl PackageWriter for AvifencWriter {
    fn flush(&self, config: &WriterConfig, target: &Path) -> Result<(), WriteError> {
        let (width, height) = validate(config)?;
        info!(
            ?target,
            image_count = config.images.len(),
            width,
            height,
            max_threads = config.max_thread_count.map(NonZeroUsize::get),
            "encoding wallpaper"
        );

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(WriteError::MissingOutputDir {
                    path: parent.to_path_buf(),
                });
            }
        }

        let mut packet = tempfile::Builder::new()
            .prefix("dynwall-")
            .suffix(".xmp")
            .tempfile()
            .map_err(WriteError::Xmp)?;
        packet
            .write_all(xmp::render(&config.meta_data).as_bytes())
            .map_err(WriteError::Xmp)?;
        packet.flush().map_err(WriteError::Xmp)?;

        let output = self
            .command(config, packet.path(), target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| WriteError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(program = ?self.program, status = %output.status, %stderr, "encoder failed");
            return Err(WriteError::Encoder {
                program: self.program.clone(),
                status: output.status,
                stderr,
            });
        }

        info!(?target, "wallpaper written");
        Ok(())
    }
}
