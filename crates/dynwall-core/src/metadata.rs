use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde_json::{Map, Value};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Whether the renderer should blend into the next frame while this one is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossFadeMode {
    #[default]
    NoCrossFade,
    CrossFade,
}

/// Identifies which wallpaper flavor the metadata belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaDataKind {
    Solar,
    DayNight,
}

impl fmt::Display for MetaDataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaDataKind::Solar => write!(f, "solar"),
            MetaDataKind::DayNight => write!(f, "day-night"),
        }
    }
}

/// Metadata of one frame in a solar (sun-position driven) wallpaper.
///
/// Every field is optional; `None` means the field was never set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolarMetaData {
    pub cross_fade: Option<CrossFadeMode>,
    /// Position within the day, 0.0 and 1.0 are midnight, 0.5 is noon.
    pub time: Option<f64>,
    pub solar_elevation: Option<f64>,
    pub solar_azimuth: Option<f64>,
    /// Index of the associated image in the package.
    pub index: Option<u32>,
}

impl SolarMetaData {
    /// Time and index are required, the solar coordinates come in pairs.
    pub fn is_valid(&self) -> bool {
        let Some(time) = self.time else {
            return false;
        };
        if self.index.is_none() {
            return false;
        }
        if self.solar_elevation.is_some() != self.solar_azimuth.is_some() {
            return false;
        }
        (0.0..=1.0).contains(&time)
    }

    pub fn has_solar_position(&self) -> bool {
        self.solar_elevation.is_some() && self.solar_azimuth.is_some()
    }

    pub fn cross_fade_mode(&self) -> CrossFadeMode {
        self.cross_fade.unwrap_or_default()
    }

    /// Returns an empty object if the metadata is invalid.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if !self.is_valid() {
            return Value::Object(object);
        }

        if let Some(mode) = self.cross_fade {
            object.insert("CrossFade".into(), Value::Bool(mode == CrossFadeMode::CrossFade));
        }
        if let Some(elevation) = self.solar_elevation {
            object.insert("Elevation".into(), elevation.into());
        }
        if let Some(azimuth) = self.solar_azimuth {
            object.insert("Azimuth".into(), azimuth.into());
        }
        if let Some(time) = self.time {
            object.insert("Time".into(), time.into());
        }
        if let Some(index) = self.index {
            object.insert("Index".into(), index.into());
        }
        Value::Object(object)
    }

    /// Fields with an unexpected JSON type are left unset.
    pub fn from_json(value: &Value) -> Self {
        let cross_fade = value.get("CrossFade").and_then(Value::as_bool).map(|b| {
            if b {
                CrossFadeMode::CrossFade
            } else {
                CrossFadeMode::NoCrossFade
            }
        });

        Self {
            cross_fade,
            time: value.get("Time").and_then(Value::as_f64),
            solar_elevation: value.get("Elevation").and_then(Value::as_f64),
            solar_azimuth: value.get("Azimuth").and_then(Value::as_f64),
            index: index_from_json(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeOfDay::Day => "day",
            TimeOfDay::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(TimeOfDay::Day),
            "night" => Some(TimeOfDay::Night),
            _ => None,
        }
    }
}

/// Metadata of one frame in a two-frame day/night wallpaper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayNightMetaData {
    pub time_of_day: Option<TimeOfDay>,
    pub index: Option<u32>,
}

impl DayNightMetaData {
    pub fn new(time_of_day: TimeOfDay, index: u32) -> Self {
        Self {
            time_of_day: Some(time_of_day),
            index: Some(index),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.time_of_day.is_some() && self.index.is_some()
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let (Some(tod), Some(index)) = (self.time_of_day, self.index) {
            object.insert("TimeOfDay".into(), Value::String(tod.as_str().into()));
            object.insert("Index".into(), index.into());
        }
        Value::Object(object)
    }

    pub fn from_json(value: &Value) -> Self {
        Self {
            time_of_day: value
                .get("TimeOfDay")
                .and_then(Value::as_str)
                .and_then(TimeOfDay::parse),
            index: index_from_json(value),
        }
    }
}

/// Metadata of a single frame, for either wallpaper flavor.
#[derive(Debug, Clone, PartialEq)]
pub enum WallpaperMetaData {
    Solar(SolarMetaData),
    DayNight(DayNightMetaData),
}

impl WallpaperMetaData {
    pub fn kind(&self) -> MetaDataKind {
        match self {
            WallpaperMetaData::Solar(_) => MetaDataKind::Solar,
            WallpaperMetaData::DayNight(_) => MetaDataKind::DayNight,
        }
    }

    pub fn index(&self) -> Option<u32> {
        match self {
            WallpaperMetaData::Solar(md) => md.index,
            WallpaperMetaData::DayNight(md) => md.index,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            WallpaperMetaData::Solar(md) => md.is_valid(),
            WallpaperMetaData::DayNight(md) => md.is_valid(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            WallpaperMetaData::Solar(md) => md.to_json(),
            WallpaperMetaData::DayNight(md) => md.to_json(),
        }
    }

    pub fn from_json(kind: MetaDataKind, value: &Value) -> Self {
        match kind {
            MetaDataKind::Solar => WallpaperMetaData::Solar(SolarMetaData::from_json(value)),
            MetaDataKind::DayNight => {
                WallpaperMetaData::DayNight(DayNightMetaData::from_json(value))
            }
        }
    }
}

impl From<SolarMetaData> for WallpaperMetaData {
    fn from(md: SolarMetaData) -> Self {
        WallpaperMetaData::Solar(md)
    }
}

impl From<DayNightMetaData> for WallpaperMetaData {
    fn from(md: DayNightMetaData) -> Self {
        WallpaperMetaData::DayNight(md)
    }
}

/// Convert a wall-clock time to a day position in `[0, 1)`.
pub fn time_from_clock(time: NaiveTime) -> f64 {
    let ms = time.num_seconds_from_midnight() as f64 * 1000.0
        + (time.nanosecond() / 1_000_000) as f64;
    ms / MS_PER_DAY
}

fn index_from_json(value: &Value) -> Option<u32> {
    value
        .get("Index")
        .and_then(Value::as_u64)
        .and_then(|i| u32::try_from(i).ok())
}
