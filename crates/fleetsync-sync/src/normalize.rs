//! Mapping of decoded upstream records onto domain types.
//!
//! Field-level parse failures never drop a record: the field is defaulted and
//! counted in a [`FieldReport`] so data-quality drift stays visible.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use fleetsync_core::{parse_geometry_point, parse_number, try_parse_timestamp, Facility, Vehicle};
use fleetsync_soap::RawRecord;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub mod fields {
    pub const FACILITY_ID: &str = "ID";
    pub const FACILITY_NAME: &str = "GARAJ_ADI";
    pub const FACILITY_CODE: &str = "GARAJ_KODU";
    pub const FACILITY_GEOMETRY: &str = "KOORDINAT";

    pub const VEHICLE_DOOR_NUMBER: &str = "KapiNo";
    pub const VEHICLE_OPERATOR: &str = "Operator";
    pub const VEHICLE_FACILITY_CODE: &str = "Garaj";
    pub const VEHICLE_LATITUDE: &str = "Enlem";
    pub const VEHICLE_LONGITUDE: &str = "Boylam";
    pub const VEHICLE_SPEED: &str = "Hiz";
    pub const VEHICLE_PLATE: &str = "Plaka";
    pub const VEHICLE_RECORDED_AT: &str = "Saat";
}

/// Counters of fields that were defaulted or synthesized during one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub records: usize,
    pub defaulted_timestamps: usize,
    pub unparsed_geometries: usize,
    pub defaulted_speeds: usize,
    pub missing_coordinates: usize,
    pub partial_coordinates: usize,
    pub synthesized_identities: usize,
    pub duplicates_collapsed: usize,
}

impl FieldReport {
    /// True when any field had to be defaulted, synthesized, or collapsed.
    #[must_use]
    pub fn has_defaults(&self) -> bool {
        self.defaulted_timestamps
            + self.unparsed_geometries
            + self.defaulted_speeds
            + self.missing_coordinates
            + self.partial_coordinates
            + self.synthesized_identities
            + self.duplicates_collapsed
            > 0
    }

    pub(crate) fn emit(&self, kind: fleetsync_core::DataKind) {
        if !self.has_defaults() {
            return;
        }
        tracing::warn!(
            kind = %kind,
            records = self.records,
            defaulted_timestamps = self.defaulted_timestamps,
            unparsed_geometries = self.unparsed_geometries,
            defaulted_speeds = self.defaulted_speeds,
            missing_coordinates = self.missing_coordinates,
            partial_coordinates = self.partial_coordinates,
            synthesized_identities = self.synthesized_identities,
            duplicates_collapsed = self.duplicates_collapsed,
            "normalization defaulted fields"
        );
    }
}

/// How a vehicle's id was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleIdentity {
    /// Hash of the licence plate.
    Plate(i64),
    /// Hash of door number, operator, and home facility code.
    Composite(i64),
}

impl VehicleIdentity {
    #[must_use]
    pub fn id(self) -> i64 {
        match self {
            VehicleIdentity::Plate(id) | VehicleIdentity::Composite(id) => id,
        }
    }
}

/// Stable, non-negative id for a vehicle.
///
/// The plate is preferred; without one the id is derived from
/// `(door_number, operator, facility_code)` so the same bus keeps its id
/// across refreshes.
#[must_use]
pub fn vehicle_identity(
    license_plate: Option<&str>,
    door_number: Option<&str>,
    operator: Option<&str>,
    facility_code: Option<&str>,
) -> VehicleIdentity {
    match license_plate.map(str::trim).filter(|p| !p.is_empty()) {
        Some(plate) => VehicleIdentity::Plate(stable_id(&["plate", plate])),
        None => VehicleIdentity::Composite(stable_id(&[
            "vehicle",
            door_number.unwrap_or(""),
            operator.unwrap_or(""),
            facility_code.unwrap_or(""),
        ])),
    }
}

/// First 8 bytes of SHA-256 over NUL-separated parts, sign bit cleared.
fn stable_id(parts: &[&str]) -> i64 {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.trim().as_bytes());
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix) & i64::MAX
}

fn text(record: &RawRecord, field: &str) -> Option<String> {
    record.get_non_blank(field).map(|v| v.trim().to_string())
}

/// Keeps the last occurrence of each id at the position of its first.
fn collapse_duplicate_ids<T>(items: Vec<T>, id: impl Fn(&T) -> i64) -> (Vec<T>, usize) {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(items.len());
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    let mut collapsed = 0;
    for item in items {
        let key = id(&item);
        if let Some(&position) = positions.get(&key) {
            kept[position] = item;
            collapsed += 1;
        } else {
            positions.insert(key, kept.len());
            kept.push(item);
        }
    }
    (kept, collapsed)
}

/// Maps facility records, assigning sequential ids after the largest source
/// id to records whose `ID` is missing or not an integer.
#[must_use]
pub fn normalize_facilities(
    records: &[RawRecord],
    now: DateTime<Utc>,
) -> (Vec<Facility>, FieldReport) {
    let mut report = FieldReport {
        records: records.len(),
        ..FieldReport::default()
    };

    let source_ids: Vec<Option<i64>> = records
        .iter()
        .map(|r| {
            r.get_non_blank(fields::FACILITY_ID)
                .and_then(|v| v.trim().parse::<i64>().ok())
        })
        .collect();
    let mut next_id = source_ids.iter().flatten().copied().max().unwrap_or(0);

    let mut facilities = Vec::with_capacity(records.len());
    for (record, source_id) in records.iter().zip(source_ids) {
        let id = source_id.unwrap_or_else(|| {
            report.synthesized_identities += 1;
            next_id = next_id.saturating_add(1);
            next_id
        });

        let coordinate = match record.get_non_blank(fields::FACILITY_GEOMETRY) {
            Some(raw) => {
                let point = parse_geometry_point(raw);
                if point.is_none() {
                    report.unparsed_geometries += 1;
                }
                point.map(|p| p.to_string())
            }
            None => {
                report.missing_coordinates += 1;
                None
            }
        };

        facilities.push(Facility {
            id,
            name: text(record, fields::FACILITY_NAME).unwrap_or_default(),
            code: text(record, fields::FACILITY_CODE).unwrap_or_default(),
            coordinate,
            last_updated: now,
        });
    }

    let (facilities, collapsed) = collapse_duplicate_ids(facilities, |f| f.id);
    report.duplicates_collapsed = collapsed;
    (facilities, report)
}

/// Maps vehicle records without nearest-facility enrichment.
///
/// `Saat` is wall-clock time at `source_offset`; it is converted to UTC so
/// parsed and defaulted (`now`) timestamps share one timeline.
#[must_use]
pub fn normalize_vehicles(
    records: &[RawRecord],
    now: DateTime<Utc>,
    source_offset: FixedOffset,
) -> (Vec<Vehicle>, FieldReport) {
    let mut report = FieldReport {
        records: records.len(),
        ..FieldReport::default()
    };

    let mut vehicles = Vec::with_capacity(records.len());
    for record in records {
        let door_number = text(record, fields::VEHICLE_DOOR_NUMBER);
        let operator = text(record, fields::VEHICLE_OPERATOR);
        let facility_code = text(record, fields::VEHICLE_FACILITY_CODE);
        let license_plate = text(record, fields::VEHICLE_PLATE);

        let latitude = record
            .get_non_blank(fields::VEHICLE_LATITUDE)
            .and_then(parse_number);
        let longitude = record
            .get_non_blank(fields::VEHICLE_LONGITUDE)
            .and_then(parse_number);
        let (latitude, longitude) = match (latitude, longitude) {
            (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
            (None, None) => {
                report.missing_coordinates += 1;
                (None, None)
            }
            _ => {
                report.partial_coordinates += 1;
                (None, None)
            }
        };

        // Only an omitted or null `Hiz` stays unknown; blanks count as unparseable.
        let speed = record.get(fields::VEHICLE_SPEED).map(|raw| {
            parse_number(raw).unwrap_or_else(|| {
                report.defaulted_speeds += 1;
                0.0
            })
        });

        let recorded_at = match record
            .get_non_blank(fields::VEHICLE_RECORDED_AT)
            .and_then(|raw| try_parse_timestamp(raw, source_offset))
        {
            Some(ts) => ts,
            None => {
                report.defaulted_timestamps += 1;
                now
            }
        };

        let identity = vehicle_identity(
            license_plate.as_deref(),
            door_number.as_deref(),
            operator.as_deref(),
            facility_code.as_deref(),
        );
        if matches!(identity, VehicleIdentity::Composite(_)) {
            report.synthesized_identities += 1;
        }

        vehicles.push(Vehicle {
            id: identity.id(),
            door_number,
            operator,
            facility_code,
            latitude,
            longitude,
            speed,
            license_plate,
            recorded_at,
            last_updated: now,
            nearest_facility_code: None,
            nearest_facility_name: None,
            distance_to_nearest_facility_km: None,
        });
    }

    let (vehicles, collapsed) = collapse_duplicate_ids(vehicles, |v| v.id);
    report.duplicates_collapsed = collapsed;
    (vehicles, report)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
