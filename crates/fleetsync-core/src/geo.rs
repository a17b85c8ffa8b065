//! Defensive parsing of upstream field values and great-circle distance.
//!
//! Every parser here is fail-open: malformed input yields `None` (or the
//! current time for timestamps) and a `tracing` warning, never an error.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use regex::Regex;

/// Mean Earth radius used by [`haversine_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Timestamp layout used by the upstream vehicle feed (`Saat` field).
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static POINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"POINT\s*\(\s*([\d.-]+)\s+([\d.-]+)\s*\)").expect("valid POINT regex")
});

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Great-circle distance to `other` in kilometres.
    #[must_use]
    pub fn distance_km(self, other: GeoPoint) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Renders the internal `"lat,lon"` coordinate representation.
impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Parses a trimmed decimal string. Non-numeric and non-finite input
/// (`NaN`, `inf`) yields `None`.
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            tracing::warn!(value = raw, "could not parse numeric field");
            None
        }
    }
}

/// Parses the upstream `yyyy-MM-dd HH:mm:ss` format. The value carries no
/// zone; it is wall-clock time at `source_offset` and is returned in UTC.
#[must_use]
pub fn try_parse_timestamp(raw: &str, source_offset: FixedOffset) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), SOURCE_TIMESTAMP_FORMAT)
        .ok()?
        .and_local_timezone(source_offset)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// Like [`try_parse_timestamp`], but substitutes the current time when the
/// value is missing or malformed.
#[must_use]
pub fn parse_timestamp(raw: &str, source_offset: FixedOffset) -> DateTime<Utc> {
    try_parse_timestamp(raw, source_offset).unwrap_or_else(|| {
        tracing::warn!(value = raw, "could not parse timestamp; defaulting to now");
        Utc::now()
    })
}

/// Extracts a coordinate from a `POINT (lon lat)` geometry string.
///
/// The source order is longitude first; the returned point is swapped into
/// latitude/longitude.
#[must_use]
pub fn parse_geometry_point(raw: &str) -> Option<GeoPoint> {
    let Some(caps) = POINT_PATTERN.captures(raw) else {
        if !raw.trim().is_empty() {
            tracing::warn!(value = raw, "could not parse POINT geometry");
        }
        return None;
    };
    let lon = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let lat = caps.get(2)?.as_str().parse::<f64>().ok()?;
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    Some(GeoPoint { lat, lon })
}

/// Parses the internal `"lat,lon"` representation.
#[must_use]
pub fn parse_coordinate(raw: &str) -> Option<GeoPoint> {
    let (lat, lon) = raw.split_once(',')?;
    if lon.contains(',') {
        return None;
    }
    let lat = lat.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    let lon = lon.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(GeoPoint { lat, lon })
}

/// Haversine great-circle distance in kilometres between two points given
/// in decimal degrees.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + lat1.to_radians().cos()
            * lat2.to_radians().cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE_KM: f64 = 1e-6;

    #[test]
    fn haversine_of_identical_points_is_zero() {
        for (lat, lon) in [(0.0, 0.0), (41.0082, 28.9784), (-33.86, 151.21), (89.9, -179.9)] {
            assert!(haversine_km(lat, lon, lat, lon).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn haversine_is_symmetric() {
        let ab = haversine_km(41.0082, 28.9784, 39.9334, 32.8597);
        let ba = haversine_km(39.9334, 32.8597, 41.0082, 28.9784);
        assert!((ab - ba).abs() < TOLERANCE_KM);
    }

    #[test]
    fn haversine_is_additive_along_a_meridian() {
        let ac = haversine_km(10.0, 29.0, 30.0, 29.0);
        let ab = haversine_km(10.0, 29.0, 22.5, 29.0);
        let bc = haversine_km(22.5, 29.0, 30.0, 29.0);
        assert!((ac - (ab + bc)).abs() < TOLERANCE_KM);
    }

    #[test]
    fn haversine_is_additive_along_the_equator() {
        let ac = haversine_km(0.0, -20.0, 0.0, 40.0);
        let ab = haversine_km(0.0, -20.0, 0.0, 5.0);
        let bc = haversine_km(0.0, 5.0, 0.0, 40.0);
        assert!((ac - (ab + bc)).abs() < TOLERANCE_KM);
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        // 2πR / 360
        let expected = 2.0 * std::f64::consts::PI * EARTH_RADIUS_KM / 360.0;
        assert!((haversine_km(0.0, 0.0, 1.0, 0.0) - expected).abs() < TOLERANCE_KM);
    }

    #[test]
    fn parse_geometry_point_swaps_axes() {
        let point = parse_geometry_point("POINT (28.9 41.0)").expect("should parse");
        assert!((point.lat - 41.0).abs() < f64::EPSILON);
        assert!((point.lon - 28.9).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_geometry_point_tolerates_spacing() {
        let point = parse_geometry_point("POINT(28.79 41.07)").expect("should parse");
        assert!((point.lat - 41.07).abs() < f64::EPSILON);
        let point = parse_geometry_point("  POINT (  -3.7 40.4 )").expect("should parse");
        assert!((point.lon + 3.7).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_geometry_point_rejects_non_points() {
        assert!(parse_geometry_point("not a point").is_none());
        assert!(parse_geometry_point("").is_none());
        assert!(parse_geometry_point("POINT (-- 41.0)").is_none());
        assert!(parse_geometry_point("LINESTRING (1 2, 3 4)").is_none());
    }

    #[test]
    fn parse_number_trims_and_rejects_garbage() {
        assert_eq!(parse_number(" 42.5 "), Some(42.5));
        assert_eq!(parse_number("-7"), Some(-7.0));
        assert_eq!(parse_number("fast"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("zero offset")
    }

    #[test]
    fn parse_timestamp_reads_source_format() {
        let ts = parse_timestamp("2024-03-01 08:15:30", utc());
        assert_eq!(ts.to_rfc3339(), "2024-03-01T08:15:30+00:00");
    }

    #[test]
    fn parse_timestamp_converts_source_wall_clock_to_utc() {
        let istanbul = FixedOffset::east_opt(3 * 3600).expect("+03:00");
        let ts = try_parse_timestamp("2024-03-01 08:15:30", istanbul).expect("should parse");
        assert_eq!(ts.to_rfc3339(), "2024-03-01T05:15:30+00:00");

        let ts = try_parse_timestamp("2024-03-01 01:00:00", istanbul).expect("should parse");
        assert_eq!(ts.to_rfc3339(), "2024-02-29T22:00:00+00:00");
    }

    #[test]
    fn parse_timestamp_defaults_to_now_on_garbage() {
        let before = Utc::now();
        let ts = parse_timestamp("01/03/2024 8:15", utc());
        let after = Utc::now();
        assert!(ts >= before && ts <= after);
        assert!(try_parse_timestamp("01/03/2024 8:15", utc()).is_none());
    }

    #[test]
    fn coordinate_round_trips_through_display() {
        let point = GeoPoint {
            lat: 41.0,
            lon: 28.9,
        };
        let parsed = parse_coordinate(&point.to_string()).expect("should parse");
        assert_eq!(parsed, point);
        assert!(parse_coordinate("41.0").is_none());
        assert!(parse_coordinate("1,2,3").is_none());
    }
}
