use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::RgbImage;
use tempfile::TempDir;

fn dynwall(args: &[&str], encoder: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dynwall"))
        .args(args)
        .env("DYNWALL_AVIFENC", encoder)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn fixture(dir: &TempDir) -> PathBuf {
    for name in ["dawn.png", "noon.png", "dusk.png"] {
        RgbImage::new(16, 9).save(dir.path().join(name)).unwrap();
    }
    let manifest = dir.path().join("manifest.json");
    fs::write(
        &manifest,
        r#"{
            "Type": "solar",
            "Meta": [
                { "FileName": "dawn.png", "Time": "06:00", "CrossFade": true },
                { "FileName": "noon.png", "Time": "12:00", "CrossFade": true },
                { "FileName": "dusk.png", "Time": "18:00" }
            ]
        }"#,
    )
    .unwrap();
    manifest
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[cfg(unix)]
#[test]
fn successful_build_exits_zero() {
    let dir = TempDir::new().unwrap();
    let manifest = fixture(&dir);
    let output = dir.path().join("out.avif");

    let result = dynwall(&[arg(&manifest), "--output", arg(&output), "--max-threads", "2"], "true");
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));
}

#[cfg(unix)]
#[test]
fn failed_encode_removes_output() {
    let dir = TempDir::new().unwrap();
    let manifest = fixture(&dir);
    let output = dir.path().join("out.avif");
    fs::write(&output, b"stale").unwrap();

    let result = dynwall(&[arg(&manifest), "--output", arg(&output)], "false");
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn manifest_error_leaves_output_alone() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("broken.json");
    fs::write(&manifest, "{").unwrap();
    let output = dir.path().join("out.avif");

    let result = dynwall(&[arg(&manifest), "--output", arg(&output)], "true");
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Not JSON file"));
    assert!(!output.exists());
}

#[test]
fn invalid_thread_count_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let manifest = fixture(&dir);
    let output = dir.path().join("out.avif");

    let result = dynwall(
        &[arg(&manifest), "--output", arg(&output), "--max-threads", "abc"],
        "true",
    );
    assert_eq!(result.status.code(), Some(2));
    assert!(!output.exists());
}

#[test]
fn wrong_argument_count_is_a_usage_error() {
    assert_eq!(dynwall(&[], "true").status.code(), Some(2));
    assert_eq!(dynwall(&["a.json", "b.json"], "true").status.code(), Some(2));
}
