use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::exif_meta::ExifMetaData;
use crate::metadata::{
    time_from_clock, CrossFadeMode, DayNightMetaData, SolarMetaData, TimeOfDay, WallpaperMetaData,
};
use crate::writer::ImageView;

/// Value that asks the builder to derive a field from the image's Exif data.
const PLACEHOLDER: &str = "*";

/// A manifest value that is either given or left for Exif to fill in.
#[derive(Clone, Copy)]
enum Field<T> {
    Given(T),
    FromExif,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not JSON file: {0}")]
    NotJson(#[source] serde_json::Error),

    #[error("Unknown manifest type {0:?}. Available types: solar, day-night")]
    UnknownType(String),

    #[error("No manifest image entries")]
    NoEntries,

    #[error("FileName value was not specified for one or more of the images. Check your json file!")]
    MissingFileName,

    #[error("{present} was specified but {missing} was not for {}", .path.display())]
    UnpairedSolarPosition {
        path: PathBuf,
        present: &'static str,
        missing: &'static str,
    },

    #[error("Invalid {field} value has been specified for {}", .path.display())]
    InvalidValue { path: PathBuf, field: &'static str },

    #[error("No time has been provided for {}", .path.display())]
    MissingTime { path: PathBuf },

    #[error("Failed to parse time {value:?} for image {}", .path.display())]
    InvalidTime { path: PathBuf, value: String },

    #[error(
        "{}: Failed to compute the position of the Sun based on GPS coordinates and the time \
         when the photo was taken. Please check that the specified image actually has GPS \
         coordinates in its Exif metadata. You can do that with a tool such as exiftool.",
        .path.display()
    )]
    NoSunPosition { path: PathBuf },

    #[error("Failed to determine the time when {} was taken from its Exif metadata", .path.display())]
    NoCaptureTime { path: PathBuf },

    #[error("Unknown TimeOfDay value {0:?}. Possible values: day, night")]
    UnknownTimeOfDay(String),

    #[error("No image file name has been specified")]
    MissingDayNightFileName,

    #[error("No day picture has been specified")]
    MissingDay,

    #[error("No night picture has been specified")]
    MissingNight,
}

/// Frames and metadata described by a wallpaper manifest file.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Unique input images, in the order they are first referenced.
    pub images: Vec<ImageView>,
    /// One record per manifest entry; indices point into `images`.
    pub meta_data: Vec<WallpaperMetaData>,
}

impl Manifest {
    /// Load and validate a manifest.
    ///
    /// Relative `FileName` values are resolved against the directory that
    /// contains the manifest.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        info!(?path, "loading manifest");

        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value = serde_json::from_str(&text).map_err(ManifestError::NotJson)?;

        let base_dir = path.parent().unwrap_or(Path::new(""));
        let manifest = match &document {
            Value::Object(root) => {
                let entries = root.get("Meta").and_then(Value::as_array);
                match root.get("Type").and_then(Value::as_str).unwrap_or_default() {
                    "solar" => parse_solar(entries, base_dir)?,
                    "day-night" => parse_day_night(entries, base_dir)?,
                    other => return Err(ManifestError::UnknownType(other.to_string())),
                }
            }
            // Legacy manifests are a bare array of solar entries.
            other => parse_solar(other.as_array(), base_dir)?,
        };

        info!(
            ?path,
            image_count = manifest.images.len(),
            meta_data_count = manifest.meta_data.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }
}

fn parse_solar(entries: Option<&Vec<Value>>, base_dir: &Path) -> Result<Manifest, ManifestError> {
    let entries = match entries {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(ManifestError::NoEntries),
    };

    let mut images: Vec<ImageView> = Vec::new();
    let mut meta_data = Vec::with_capacity(entries.len());

    for entry in entries {
        let file_name = entry
            .get("FileName")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if file_name.is_empty() {
            return Err(ManifestError::MissingFileName);
        }
        let path = resolve_file_name(base_dir, file_name);

        let index = match images.iter().position(|image| image.path == path) {
            Some(index) => index,
            None => {
                images.push(ImageView::new(path.clone()));
                images.len() - 1
            }
        };

        let mut md = SolarMetaData {
            index: Some(index as u32),
            ..Default::default()
        };

        let elevation = entry.get("SolarElevation");
        let azimuth = entry.get("SolarAzimuth");
        match (elevation, azimuth) {
            (Some(_), None) => {
                return Err(ManifestError::UnpairedSolarPosition {
                    path,
                    present: "SolarElevation",
                    missing: "SolarAzimuth",
                })
            }
            (None, Some(_)) => {
                return Err(ManifestError::UnpairedSolarPosition {
                    path,
                    present: "SolarAzimuth",
                    missing: "SolarElevation",
                })
            }
            _ => {}
        }

        let elevation = elevation
            .map(|v| parse_coordinate(v, &path, "solar elevation"))
            .transpose()?;
        let azimuth = azimuth
            .map(|v| parse_coordinate(v, &path, "solar azimuth"))
            .transpose()?;
        if let Some(Field::Given(v)) = elevation {
            md.solar_elevation = Some(v);
        }
        if let Some(Field::Given(v)) = azimuth {
            md.solar_azimuth = Some(v);
        }
        let elevation_from_exif = matches!(elevation, Some(Field::FromExif));
        let azimuth_from_exif = matches!(azimuth, Some(Field::FromExif));
        let needs_sun_position = elevation_from_exif || azimuth_from_exif;

        if let Some(value) = entry.get("CrossFade") {
            md.cross_fade = Some(if is_truthy(value) {
                CrossFadeMode::CrossFade
            } else {
                CrossFadeMode::NoCrossFade
            });
        }

        let Some(time) = entry.get("Time") else {
            return Err(ManifestError::MissingTime { path });
        };
        let needs_time = is_placeholder(time);
        if !needs_time {
            let time_str = time.as_str().unwrap_or_default();
            let Some(clock) = parse_clock(time_str) else {
                return Err(ManifestError::InvalidTime {
                    path,
                    value: time_str.to_string(),
                });
            };
            md.time = Some(time_from_clock(clock));
        }

        if needs_sun_position || needs_time {
            let exif = read_exif(&path);
            if needs_sun_position {
                let Some(sun) = exif.sun_position() else {
                    return Err(ManifestError::NoSunPosition { path });
                };
                if elevation_from_exif {
                    md.solar_elevation = Some(sun.elevation());
                }
                if azimuth_from_exif {
                    md.solar_azimuth = Some(sun.azimuth());
                }
            }
            if needs_time {
                let Some(taken_at) = exif.taken_at else {
                    return Err(ManifestError::NoCaptureTime { path });
                };
                md.time = Some(time_from_clock(taken_at.time()));
            }
        }

        debug!(?path, index, time = md.time, cross_fade = ?md.cross_fade, "solar entry parsed");
        meta_data.push(WallpaperMetaData::Solar(md));
    }

    Ok(Manifest { images, meta_data })
}

fn parse_day_night(
    entries: Option<&Vec<Value>>,
    base_dir: &Path,
) -> Result<Manifest, ManifestError> {
    let entries = match entries {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(ManifestError::NoEntries),
    };

    let mut day: Option<PathBuf> = None;
    let mut night: Option<PathBuf> = None;

    for entry in entries {
        let time_of_day = entry
            .get("TimeOfDay")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let slot = match TimeOfDay::parse(time_of_day) {
            Some(TimeOfDay::Day) => &mut day,
            Some(TimeOfDay::Night) => &mut night,
            None => return Err(ManifestError::UnknownTimeOfDay(time_of_day.to_string())),
        };

        let file_name = entry
            .get("FileName")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if file_name.is_empty() {
            return Err(ManifestError::MissingDayNightFileName);
        }
        *slot = Some(resolve_file_name(base_dir, file_name));
    }

    let day = day.ok_or(ManifestError::MissingDay)?;
    let night = night.ok_or(ManifestError::MissingNight)?;
    debug!(?day, ?night, "day-night entries parsed");

    Ok(Manifest {
        images: vec![ImageView::new(day), ImageView::new(night)],
        meta_data: vec![
            DayNightMetaData::new(TimeOfDay::Day, 0).into(),
            DayNightMetaData::new(TimeOfDay::Night, 1).into(),
        ],
    })
}

fn parse_coordinate(
    value: &Value,
    path: &Path,
    field: &'static str,
) -> Result<Field<f64>, ManifestError> {
    if is_placeholder(value) {
        return Ok(Field::FromExif);
    }
    value
        .as_f64()
        .map(Field::Given)
        .ok_or_else(|| ManifestError::InvalidValue {
            path: path.to_path_buf(),
            field,
        })
}

/// An unreadable file is treated as one without Exif data.
fn read_exif(path: &Path) -> ExifMetaData {
    ExifMetaData::read(path).unwrap_or_else(|e| {
        warn!(%e, "no usable Exif metadata");
        ExifMetaData::default()
    })
}

fn resolve_file_name(base_dir: &Path, file_name: &str) -> PathBuf {
    let path = Path::new(file_name);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let joined = base_dir.join(path);
    std::path::absolute(&joined).unwrap_or(joined)
}

fn is_placeholder(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.trim() == PLACEHOLDER)
}

/// JSON truthiness as the manifest format has always interpreted `CrossFade`.
fn is_truthy(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

/// Accepts `HH:MM` and `HH:MM:SS[.fff]`.
fn parse_clock(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
