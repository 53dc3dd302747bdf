use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::manifest::{Manifest, ManifestError};
use crate::writer::{PackageWriter, WriteError, WriterConfig};

/// Output file used when none is requested.
pub const DEFAULT_OUTPUT: &str = "wallpaper.avif";

/// Parameters for one manifest-to-package build.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub manifest: PathBuf,
    /// Target file, or None (or an empty path) for [`DEFAULT_OUTPUT`].
    pub output: Option<PathBuf>,
    pub max_threads: Option<NonZeroUsize>,
}

impl BuildRequest {
    pub fn new(manifest: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
            ..Default::default()
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Load the manifest, hand it to `writer` and commit or discard the output.
///
/// Returns the path of the written package. If the writer fails, whatever
/// it left at the output path is removed before the error is returned. A
/// manifest error returns before the output path is touched.
pub fn build(request: &BuildRequest, writer: &dyn PackageWriter) -> Result<PathBuf, BuildError> {
    let manifest = Manifest::load(&request.manifest)?;

    let config = WriterConfig {
        images: manifest.images,
        meta_data: manifest.meta_data,
        max_thread_count: request.max_threads,
    };

    let target = request.output_path();
    info!(
        manifest = ?request.manifest,
        ?target,
        image_count = config.images.len(),
        max_threads = config.max_thread_count.map(NonZeroUsize::get),
        "building wallpaper"
    );

    if let Err(e) = writer.flush(&config, &target) {
        error!(%e, ?target, "failed to write wallpaper");
        discard_output(&target);
        return Err(e.into());
    }

    info!(?target, "build complete");
    Ok(target)
}

/// Best-effort removal of a partial package.
fn discard_output(target: &Path) {
    match std::fs::remove_file(target) {
        Ok(()) => info!(?target, "removed partial output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(?target, %e, "failed to remove partial output"),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use tempfile::TempDir;
    use tracing_test::traced_test;

    use super::*;
    use crate::metadata::{SolarMetaData, WallpaperMetaData};

    /// Records every flush; optionally leaves a partial file behind and fails.
    #[derive(Default)]
    struct FakeWriter {
        fail: bool,
        calls: RefCell<Vec<(WriterConfig, PathBuf)>>,
    }

    impl FakeWriter {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    impl PackageWriter for FakeWriter {
        fn flush(&self, config: &WriterConfig, target: &Path) -> Result<(), WriteError> {
            self.calls
                .borrow_mut()
                .push((config.clone(), target.to_path_buf()));
            if self.fail {
                if target.parent().is_some_and(Path::is_dir) {
                    fs::write(target, b"partial").unwrap();
                }
                return Err(WriteError::NoImages);
            }
            Ok(())
        }
    }

    const THREE_FRAMES: &str = r#"{
        "Type": "solar",
        "Meta": [
            { "FileName": "1.png", "Time": "00:00" },
            { "FileName": "2.png", "Time": "08:00" },
            { "FileName": "3.png", "Time": "16:00", "CrossFade": true }
        ]
    }"#;

    fn write_manifest(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("manifest.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn output_path_defaults() {
        let mut request = BuildRequest::new("m.json");
        assert_eq!(request.output_path(), PathBuf::from("wallpaper.avif"));

        request.output = Some(PathBuf::new());
        assert_eq!(request.output_path(), PathBuf::from("wallpaper.avif"));

        request.output = Some(PathBuf::from("out/w.avif"));
        assert_eq!(request.output_path(), PathBuf::from("out/w.avif"));
    }

    #[test]
    #[traced_test]
    fn happy_path_configures_writer() {
        let dir = TempDir::new().unwrap();
        let manifest_path = write_manifest(&dir, THREE_FRAMES);
        let expected = Manifest::load(&manifest_path).unwrap();

        let writer = FakeWriter::default();
        let target = build(&BuildRequest::new(&manifest_path), &writer).unwrap();
        assert_eq!(target, PathBuf::from(DEFAULT_OUTPUT));

        let calls = writer.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (config, flushed_to) = &calls[0];
        assert_eq!(flushed_to, &PathBuf::from("wallpaper.avif"));
        assert_eq!(config.images, expected.images);
        assert_eq!(config.images.len(), 3);
        assert_eq!(config.meta_data, expected.meta_data);
        assert_eq!(config.max_thread_count, None);
        assert!(logs_contain("build complete"));
    }

    #[test]
    fn thread_bound_is_passed_through() {
        let dir = TempDir::new().unwrap();
        let request = BuildRequest {
            manifest: write_manifest(&dir, THREE_FRAMES),
            output: Some(dir.path().join("out.avif")),
            max_threads: NonZeroUsize::new(4),
        };

        let writer = FakeWriter::default();
        build(&request, &writer).unwrap();

        let calls = writer.calls.borrow();
        assert_eq!(calls[0].0.max_thread_count, NonZeroUsize::new(4));
        assert_eq!(calls[0].1, dir.path().join("out.avif"));
    }

    #[test]
    fn manifest_error_leaves_output_untouched() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("wallpaper.avif");
        fs::write(&output, b"previous build").unwrap();

        let request = BuildRequest {
            manifest: write_manifest(&dir, r#"{"Type": "solar", "Meta": []}"#),
            output: Some(output.clone()),
            max_threads: None,
        };
        let writer = FakeWriter::default();
        let err = build(&request, &writer).unwrap_err();

        assert!(matches!(err, BuildError::Manifest(ManifestError::NoEntries)));
        assert!(writer.calls.borrow().is_empty());
        assert_eq!(fs::read(&output).unwrap(), b"previous build");
    }

    #[test]
    fn missing_manifest_never_creates_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("wallpaper.avif");
        let request = BuildRequest {
            manifest: dir.path().join("missing.json"),
            output: Some(output.clone()),
            max_threads: None,
        };

        let writer = FakeWriter::default();
        assert!(build(&request, &writer).is_err());
        assert!(writer.calls.borrow().is_empty());
        assert!(!output.exists());
    }

    #[test]
    #[traced_test]
    fn write_error_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("wallpaper.avif");
        fs::write(&output, b"stale").unwrap();

        let request = BuildRequest {
            manifest: write_manifest(&dir, THREE_FRAMES),
            output: Some(output.clone()),
            max_threads: None,
        };
        let writer = FakeWriter::failing();
        let err = build(&request, &writer).unwrap_err();

        assert!(matches!(err, BuildError::Write(WriteError::NoImages)));
        assert_eq!(err.to_string(), WriteError::NoImages.to_string());
        assert_eq!(writer.calls.borrow().len(), 1);
        assert!(!output.exists());
        assert!(logs_contain("removed partial output"));
    }

    #[test]
    fn write_error_without_output_file() {
        let dir = TempDir::new().unwrap();
        let request = BuildRequest {
            manifest: write_manifest(&dir, THREE_FRAMES),
            output: Some(dir.path().join("never/written.avif")),
            max_threads: None,
        };

        let err = build(&request, &FakeWriter::failing()).unwrap_err();
        assert!(matches!(err, BuildError::Write(_)));
        assert!(!dir.path().join("never").exists());
    }

    #[test]
    fn writer_sees_manifest_metadata() {
        let dir = TempDir::new().unwrap();
        let request = BuildRequest {
            manifest: write_manifest(&dir, THREE_FRAMES),
            output: Some(dir.path().join("w.avif")),
            max_threads: None,
        };

        let writer = FakeWriter::default();
        build(&request, &writer).unwrap();
        let calls = writer.calls.borrow();
        let WallpaperMetaData::Solar(SolarMetaData { index, time, .. }) = &calls[0].0.meta_data[1]
        else {
            panic!("expected solar metadata");
        };
        assert_eq!(*index, Some(1));
        assert_eq!(*time, Some(8.0 / 24.0));
    }
}
