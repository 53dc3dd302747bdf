//! Picks the frames a renderer shows at a given moment.
//!
//! With a location, solar frames are placed by where the Sun stood when
//! they were shot and day-night blending follows the Sun's elevation.
//! Without one, or when the metadata lacks sun positions, the `Time` of each
//! frame and the wall clock are used instead.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use tracing::debug;

use crate::handle::FrameHandle;
use crate::metadata::{CrossFadeMode, SolarMetaData, TimeOfDay, WallpaperMetaData};
use crate::sun::{GeoCoordinate, SunPath, SunPosition};

const SECS_PER_DAY: f64 = 86_400.0;
const SECS_PER_HOUR: f64 = 3_600.0;
/// Elevation range over which day-night wallpapers cross-fade, in degrees.
const TWILIGHT_ELEVATION: f64 = 6.0;

/// What to draw: `top` over `bottom` with opacity `blend_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layers {
    pub bottom: FrameHandle,
    pub top: Option<FrameHandle>,
    pub blend_factor: f64,
}

impl Layers {
    pub fn bottom_url(&self) -> String {
        self.bottom.to_url()
    }

    /// Empty when there is no top layer.
    pub fn top_url(&self) -> String {
        self.top.as_ref().map(FrameHandle::to_url).unwrap_or_default()
    }
}

/// Position within the day in `[0, 1)`, at one-second resolution.
pub fn progress_at(time: NaiveTime) -> f64 {
    f64::from(time.num_seconds_from_midnight()) / SECS_PER_DAY
}

/// How a solar schedule maps a moment onto the day.
#[derive(Debug, Clone)]
enum Clock {
    Wall,
    Sun {
        location: GeoCoordinate,
        path: SunPath,
        midnight: SunPosition,
        /// UTC date the path was computed for.
        date: NaiveDate,
    },
}

impl Clock {
    fn for_location(location: GeoCoordinate, now: DateTime<Utc>) -> Option<Self> {
        Some(Clock::Sun {
            location,
            path: SunPath::new(now, location)?,
            midnight: SunPosition::midnight(now, location)?,
            date: now.date_naive(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SolarSchedule {
    source: String,
    clock: Clock,
    /// Sorted by progress, one entry per distinct progress value.
    entries: Vec<(f64, SolarMetaData)>,
}

impl SolarSchedule {
    /// Schedule driven by the wall clock. Returns None if `meta_data` has no
    /// valid solar record.
    pub fn new(source: impl Into<String>, meta_data: &[WallpaperMetaData]) -> Option<Self> {
        Self::with_clock(source.into(), meta_data, Clock::Wall)
    }

    /// Schedule that follows the Sun at `location` on the day of `now`.
    ///
    /// Falls back to the wall clock unless every record carries a sun
    /// position and the Sun's path can be computed for `location`.
    pub fn at_location(
        source: impl Into<String>,
        meta_data: &[WallpaperMetaData],
        location: GeoCoordinate,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let all_positioned = meta_data.iter().all(|md| match md {
            WallpaperMetaData::Solar(solar) => solar.has_solar_position(),
            WallpaperMetaData::DayNight(_) => false,
        });
        let clock = all_positioned
            .then(|| Clock::for_location(location, now))
            .flatten()
            .unwrap_or(Clock::Wall);
        Self::with_clock(source.into(), meta_data, clock)
    }

    fn with_clock(source: String, meta_data: &[WallpaperMetaData], clock: Clock) -> Option<Self> {
        let mut schedule = Self {
            source,
            clock,
            entries: Vec::new(),
        };
        for md in meta_data {
            let WallpaperMetaData::Solar(solar) = md else {
                continue;
            };
            if !solar.is_valid() {
                continue;
            }
            let Some(progress) = schedule.progress_for_meta_data(solar) else {
                continue;
            };
            // A later record with the same progress replaces the earlier one.
            match schedule.entries.iter_mut().find(|(p, _)| *p == progress) {
                Some(entry) => entry.1 = solar.clone(),
                None => schedule.entries.push((progress, solar.clone())),
            }
        }
        if schedule.entries.is_empty() {
            return None;
        }
        schedule.entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        debug!(
            frames = schedule.entries.len(),
            follows_sun = schedule.follows_sun(),
            "solar schedule ready"
        );
        Some(schedule)
    }

    pub fn follows_sun(&self) -> bool {
        matches!(self.clock, Clock::Sun { .. })
    }

    /// A sun-following schedule is only accurate for the day it was built on.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match &self.clock {
            Clock::Wall => false,
            Clock::Sun { date, .. } => now.date_naive() != *date,
        }
    }

    fn progress_for_meta_data(&self, md: &SolarMetaData) -> Option<f64> {
        match &self.clock {
            Clock::Wall => md.time,
            Clock::Sun { path, midnight, .. } => {
                let position = SunPosition::new(md.solar_elevation?, md.solar_azimuth?);
                Some(path.progress(midnight, &position))
            }
        }
    }

    /// Progress of the day at `now`; local time for the wall clock.
    pub fn progress_for<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> f64 {
        match &self.clock {
            Clock::Sun {
                location,
                path,
                midnight,
                ..
            } => match SunPosition::at(now.with_timezone(&Utc), *location) {
                Some(position) => path.progress(midnight, &position),
                None => progress_at(now.time()),
            },
            Clock::Wall => progress_at(now.time()),
        }
    }

    pub fn layers_at(&self, progress: f64) -> Layers {
        let next = self
            .entries
            .iter()
            .position(|(p, _)| *p > progress)
            .unwrap_or(0);
        let current = if next == 0 {
            self.entries.len() - 1
        } else {
            next - 1
        };

        let (from, current_md) = &self.entries[current];
        let (to, next_md) = &self.entries[next];
        let bottom = self.handle(current_md);

        let layers = if current_md.cross_fade_mode() == CrossFadeMode::CrossFade {
            Layers {
                bottom,
                top: Some(self.handle(next_md)),
                blend_factor: blend_factor(*from, *to, progress),
            }
        } else {
            Layers {
                bottom,
                top: None,
                blend_factor: 0.0,
            }
        };

        debug!(progress, current, next, blend_factor = layers.blend_factor, "solar layers");
        layers
    }

    fn handle(&self, md: &SolarMetaData) -> FrameHandle {
        let mut handle = FrameHandle::default();
        handle.set_source(self.source.clone());
        handle.set_frame_index(md.index);
        handle
    }
}

#[derive(Debug, Clone)]
pub struct DayNightSchedule {
    day: FrameHandle,
    night: FrameHandle,
    location: Option<GeoCoordinate>,
}

impl DayNightSchedule {
    /// Returns None unless both a day and a night frame are described.
    pub fn new(source: impl Into<String>, meta_data: &[WallpaperMetaData]) -> Option<Self> {
        let source = source.into();
        let mut day = None;
        let mut night = None;
        for md in meta_data {
            let WallpaperMetaData::DayNight(dn) = md else {
                continue;
            };
            match (dn.time_of_day, dn.index) {
                (Some(TimeOfDay::Day), Some(index)) => day = Some(index),
                (Some(TimeOfDay::Night), Some(index)) => night = Some(index),
                _ => {}
            }
        }

        Some(Self {
            day: FrameHandle::new(source.clone(), day?),
            night: FrameHandle::new(source, night?),
            location: None,
        })
    }

    pub fn with_location(mut self, location: GeoCoordinate) -> Self {
        self.location = Some(location);
        self
    }

    /// Day is drawn over night.
    ///
    /// With a location the day frame fades in while the Sun climbs from 6
    /// degrees below the horizon to 6 above it. Otherwise it fades in between
    /// 06:00 and 07:00 and out between 18:00 and 19:00 local time.
    pub fn layers_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Layers {
        let sun = self
            .location
            .and_then(|location| SunPosition::at(now.with_timezone(&Utc), location));
        let blend_factor = match sun {
            Some(sun) => {
                (sun.elevation().clamp(-TWILIGHT_ELEVATION, TWILIGHT_ELEVATION) + TWILIGHT_ELEVATION)
                    / (2.0 * TWILIGHT_ELEVATION)
            }
            None => clock_blend_factor(now.time()),
        };

        Layers {
            bottom: self.night.clone(),
            top: Some(self.day.clone()),
            blend_factor,
        }
    }
}

/// Schedule for either wallpaper flavor.
#[derive(Debug, Clone)]
pub enum Schedule {
    Solar(SolarSchedule),
    DayNight(DayNightSchedule),
}

impl Schedule {
    /// Wall-clock schedule; the flavor follows the first metadata record.
    pub fn new(source: impl Into<String>, meta_data: &[WallpaperMetaData]) -> Option<Self> {
        match meta_data.first()? {
            WallpaperMetaData::Solar(_) => SolarSchedule::new(source, meta_data).map(Schedule::Solar),
            WallpaperMetaData::DayNight(_) => {
                DayNightSchedule::new(source, meta_data).map(Schedule::DayNight)
            }
        }
    }

    /// Schedule that follows the Sun at `location` where the metadata allows.
    pub fn at_location(
        source: impl Into<String>,
        meta_data: &[WallpaperMetaData],
        location: GeoCoordinate,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        match meta_data.first()? {
            WallpaperMetaData::Solar(_) => {
                SolarSchedule::at_location(source, meta_data, location, now).map(Schedule::Solar)
            }
            WallpaperMetaData::DayNight(_) => DayNightSchedule::new(source, meta_data)
                .map(|s| Schedule::DayNight(s.with_location(location))),
        }
    }

    pub fn layers_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Layers {
        match self {
            Schedule::Solar(s) => s.layers_at(s.progress_for(now)),
            Schedule::DayNight(s) => s.layers_at(now),
        }
    }

    /// True once the schedule should be rebuilt for a new day.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Schedule::Solar(s) => s.is_expired(now),
            Schedule::DayNight(_) => false,
        }
    }
}

fn clock_blend_factor(time: NaiveTime) -> f64 {
    let secs = f64::from(time.num_seconds_from_midnight());
    let hour = |h: u32| f64::from(h) * SECS_PER_HOUR;

    if secs < hour(6) {
        0.0
    } else if secs < hour(7) {
        (secs - hour(6)) / SECS_PER_HOUR
    } else if secs < hour(18) {
        1.0
    } else if secs < hour(19) {
        (hour(19) - secs) / SECS_PER_HOUR
    } else {
        0.0
    }
}

/// Cyclic distance from `from` forward to `to` on the unit day.
fn time_span(from: f64, to: f64) -> f64 {
    if to < from {
        (1.0 - from) + to
    } else {
        to - from
    }
}

fn ratio(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    (elapsed / duration).clamp(0.0, 1.0)
}

/// Blend between the frame at `from` and the one at `to` for `now`.
///
/// When the transition crosses the point mirrored around noon, the fade is
/// confined to the part of the interval on the far side of that point.
fn blend_factor(from: f64, to: f64, now: f64) -> f64 {
    let reflected_from = 1.0 - from;
    let reflected_to = 1.0 - to;

    let total_duration = time_span(from, to);
    let total_elapsed = time_span(from, now);

    if (reflected_from < from) != (reflected_to < to) {
        if reflected_from < to {
            let threshold = time_span(from, reflected_from);
            if total_elapsed < threshold {
                return 0.0;
            }
            return ratio(total_elapsed - threshold, total_duration - threshold);
        }
        if from < reflected_to {
            let threshold = time_span(from, reflected_to);
            if threshold < total_elapsed {
                return 1.0;
            }
            return ratio(total_elapsed, threshold);
        }
    }

    ratio(total_elapsed, total_duration)
}
