//! Capture time and place of a photo, read from its Exif metadata.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use exif::{Exif, In, Rational, Tag, Value};
use thiserror::Error;
use tracing::debug;

use crate::sun::{GeoCoordinate, SunPosition};

const DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const GPS_DATE_FORMAT: &str = "%Y:%m:%d";

#[derive(Debug, Error)]
pub enum ExifError {
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read Exif metadata from {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifMetaData {
    /// Local wall-clock time the photo was taken (`DateTimeOriginal`).
    pub taken_at: Option<NaiveDateTime>,
    /// Absolute capture instant, from the GPS timestamp or the original
    /// time plus its UTC offset.
    pub taken_at_utc: Option<DateTime<Utc>>,
    pub location: Option<GeoCoordinate>,
}

impl ExifMetaData {
    pub fn read(path: &Path) -> Result<Self, ExifError> {
        let file = File::open(path).map_err(|source| ExifError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let exif = exif::Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .map_err(|source| ExifError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let meta_data = Self::from_exif(&exif);
        debug!(
            ?path,
            taken_at = ?meta_data.taken_at,
            taken_at_utc = ?meta_data.taken_at_utc,
            location = ?meta_data.location,
            "read Exif metadata"
        );
        Ok(meta_data)
    }

    pub fn from_exif(exif: &Exif) -> Self {
        let taken_at = ascii(exif, Tag::DateTimeOriginal)
            .and_then(|s| NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT).ok());

        let offset = ascii(exif, Tag::OffsetTimeOriginal)
            .or_else(|| ascii(exif, Tag::OffsetTime))
            .and_then(|s| FixedOffset::from_str(s).ok());
        let from_offset = taken_at
            .zip(offset)
            .and_then(|(local, offset)| local.and_local_timezone(offset).single())
            .map(|dt| dt.with_timezone(&Utc));

        let location = match (
            gps_degrees(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S"),
            gps_degrees(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W"),
        ) {
            (Some(latitude), Some(longitude)) => {
                Some(GeoCoordinate::new(latitude, longitude)).filter(GeoCoordinate::is_valid)
            }
            _ => None,
        };

        Self {
            taken_at,
            taken_at_utc: gps_timestamp(exif).or(from_offset),
            location,
        }
    }

    /// Where the Sun was when the photo was taken, if the photo says where
    /// and when that was.
    pub fn sun_position(&self) -> Option<SunPosition> {
        SunPosition::at(self.taken_at_utc?, self.location?)
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<&str> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values
            .first()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .map(|s| s.trim_end_matches('\0').trim()),
        _ => None,
    }
}

fn rationals(exif: &Exif, tag: Tag) -> Option<&[Rational]> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) => Some(values),
        _ => None,
    }
}

/// Degrees, minutes and seconds folded into signed degrees.
fn gps_degrees(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let [degrees, minutes, seconds] = rationals(exif, tag)? else {
        return None;
    };
    let value = degrees.to_f64() + minutes.to_f64() / 60.0 + seconds.to_f64() / 3600.0;
    if !value.is_finite() {
        return None;
    }
    match ascii(exif, ref_tag) {
        Some(r) if r.eq_ignore_ascii_case(negative_ref) => Some(-value),
        _ => Some(value),
    }
}

fn gps_timestamp(exif: &Exif) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(ascii(exif, Tag::GPSDateStamp)?, GPS_DATE_FORMAT).ok()?;
    let [hour, minute, second] = rationals(exif, Tag::GPSTimeStamp)? else {
        return None;
    };
    let seconds = hour.to_f64() * 3600.0 + minute.to_f64() * 60.0 + second.to_f64();
    if !(0.0..86_400.0).contains(&seconds) {
        return None;
    }
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)?;
    Some(date.and_time(time).and_utc())
}
