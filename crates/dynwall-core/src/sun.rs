//! Position of the Sun in the sky for a place and instant.
//!
//! Uses the NOAA solar position equations, accurate to well under a degree
//! for dates within a few centuries of J2000. Angles are in degrees;
//! azimuth is measured clockwise from north.

use std::f64::consts::TAU;

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use glam::DVec3;

const MS_PER_DAY: f64 = 86_400_000.0;
const MINUTES_PER_DAY: f64 = 1_440.0;
const JULIAN_UNIX_EPOCH: f64 = 2_440_587.5;
const JULIAN_J2000: f64 = 2_451_545.0;
const PATH_SAMPLES: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    elevation: f64,
    azimuth: f64,
}

impl SunPosition {
    pub fn new(elevation: f64, azimuth: f64) -> Self {
        Self { elevation, azimuth }
    }

    /// Returns None for an invalid location.
    pub fn at(date_time: DateTime<Utc>, location: GeoCoordinate) -> Option<Self> {
        if !location.is_valid() {
            return None;
        }
        let terms = SolarTerms::at(date_time);

        let minutes = f64::from(date_time.num_seconds_from_midnight()) / 60.0;
        let true_solar_time =
            (minutes + terms.equation_of_time + 4.0 * location.longitude).rem_euclid(MINUTES_PER_DAY);
        let hour_angle = (true_solar_time / 4.0 - 180.0).to_radians();

        let latitude = location.latitude.to_radians();
        let declination = terms.declination;

        let cos_zenith = (latitude.sin() * declination.sin()
            + latitude.cos() * declination.cos() * hour_angle.cos())
        .clamp(-1.0, 1.0);
        let elevation = 90.0 - cos_zenith.acos().to_degrees();

        let azimuth = hour_angle
            .sin()
            .atan2(hour_angle.cos() * latitude.sin() - declination.tan() * latitude.cos())
            .to_degrees()
            + 180.0;

        Some(Self::new(elevation, azimuth.rem_euclid(360.0)))
    }

    /// Position at solar midnight of the day containing `date_time`.
    pub fn midnight(date_time: DateTime<Utc>, location: GeoCoordinate) -> Option<Self> {
        Self::at(solar_midnight(date_time, location)?, location)
    }

    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    /// Unit vector in local east-north-up coordinates.
    pub fn to_vector(&self) -> DVec3 {
        let elevation = self.elevation.to_radians();
        let azimuth = self.azimuth.to_radians();
        DVec3::new(
            elevation.cos() * azimuth.sin(),
            elevation.cos() * azimuth.cos(),
            elevation.sin(),
        )
    }
}

/// The circle the Sun traces across the sky over one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPath {
    center: DVec3,
    normal: DVec3,
}

impl SunPath {
    /// Fit the path through hourly positions starting at solar midnight.
    ///
    /// The normal points along the direction of travel, so angles measured
    /// around it grow as the day goes on.
    pub fn new(date_time: DateTime<Utc>, location: GeoCoordinate) -> Option<Self> {
        let start = solar_midnight(date_time, location)?;
        let samples = (0..PATH_SAMPLES)
            .map(|hour| SunPosition::at(start + Duration::hours(hour), location).map(|p| p.to_vector()))
            .collect::<Option<Vec<_>>>()?;

        let center = samples.iter().fold(DVec3::ZERO, |acc, v| acc + *v) / samples.len() as f64;
        let normal = samples
            .iter()
            .zip(samples.iter().cycle().skip(1))
            .fold(DVec3::ZERO, |acc, (a, b)| acc + (*a - center).cross(*b - center))
            .try_normalize()?;

        Some(Self { center, normal })
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    /// Project `position` onto the plane of the path.
    pub fn project(&self, position: &SunPosition) -> DVec3 {
        let v = position.to_vector();
        v - self.normal * (v - self.center).dot(self.normal)
    }

    /// Fraction of a full turn travelled from `origin` to `position`, in `[0, 1)`.
    pub fn progress(&self, origin: &SunPosition, position: &SunPosition) -> f64 {
        let from = (self.project(origin) - self.center).normalize_or_zero();
        let to = (self.project(position) - self.center).normalize_or_zero();

        let det = self.normal.dot(from.cross(to));
        let mut angle = det.atan2(from.dot(to));
        if angle < 0.0 {
            angle += TAU;
        }
        angle / TAU
    }
}

struct SolarTerms {
    /// Radians.
    declination: f64,
    /// Minutes.
    equation_of_time: f64,
}

impl SolarTerms {
    fn at(date_time: DateTime<Utc>) -> Self {
        let julian_day = date_time.timestamp_millis() as f64 / MS_PER_DAY + JULIAN_UNIX_EPOCH;
        let t = (julian_day - JULIAN_J2000) / 36_525.0;

        let mean_longitude = (280.466_46 + t * (36_000.769_83 + t * 0.000_303_2)).rem_euclid(360.0);
        let mean_anomaly = 357.529_11 + t * (35_999.050_29 - 0.000_153_7 * t);
        let eccentricity = 0.016_708_634 - t * (0.000_042_037 + 0.000_000_126_7 * t);

        let m = mean_anomaly.to_radians();
        let center = m.sin() * (1.914_602 - t * (0.004_817 + 0.000_014 * t))
            + (2.0 * m).sin() * (0.019_993 - 0.000_101 * t)
            + (3.0 * m).sin() * 0.000_289;
        let omega = (125.04 - 1_934.136 * t).to_radians();
        let apparent_longitude = (mean_longitude + center - 0.005_69 - 0.004_78 * omega.sin()).to_radians();

        let mean_obliquity =
            23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.000_59 - t * 0.001_813))) / 60.0) / 60.0;
        let obliquity = (mean_obliquity + 0.002_56 * omega.cos()).to_radians();

        let declination = (obliquity.sin() * apparent_longitude.sin()).asin();

        let y = (obliquity / 2.0).tan().powi(2);
        let l0 = mean_longitude.to_radians();
        let e = eccentricity;
        let equation_of_time = 4.0
            * (y * (2.0 * l0).sin() - 2.0 * e * m.sin() + 4.0 * e * y * m.sin() * (2.0 * l0).cos()
                - 0.5 * y * y * (4.0 * l0).sin()
                - 1.25 * e * e * (2.0 * m).sin())
            .to_degrees();

        Self {
            declination,
            equation_of_time,
        }
    }
}

/// Solar midnight preceding solar noon on the UTC date of `date_time`.
fn solar_midnight(date_time: DateTime<Utc>, location: GeoCoordinate) -> Option<DateTime<Utc>> {
    if !location.is_valid() {
        return None;
    }
    let day = date_time.date_naive().and_time(NaiveTime::MIN).and_utc();
    let approximate_noon = day + minutes(720.0 - 4.0 * location.longitude);
    let equation_of_time = SolarTerms::at(approximate_noon).equation_of_time;
    let noon = day + minutes(720.0 - 4.0 * location.longitude - equation_of_time);
    Some(noon - Duration::hours(12))
}

fn minutes(m: f64) -> Duration {
    Duration::milliseconds((m * 60_000.0).round() as i64)
}
