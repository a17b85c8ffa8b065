//! Domain types for the mirrored transit datasets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{parse_coordinate, GeoPoint};

/// The two datasets mirrored from the upstream SOAP source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataKind {
    Facility,
    Vehicle,
}

impl DataKind {
    pub const ALL: [DataKind; 2] = [DataKind::Facility, DataKind::Vehicle];

    /// Value stored in `data_retrieval_log.data_kind`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Facility => "FACILITY",
            DataKind::Vehicle => "VEHICLE",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data kind '{0}'")]
pub struct ParseDataKindError(pub String);

impl FromStr for DataKind {
    type Err = ParseDataKindError;

    /// Accepts the stored form (`FACILITY`) as well as the plural route
    /// segments used by the API and CLI (`facilities`, `vehicles`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facility" | "facilities" | "garage" | "garages" => Ok(DataKind::Facility),
            "vehicle" | "vehicles" | "bus" | "buses" => Ok(DataKind::Vehicle),
            _ => Err(ParseDataKindError(s.to_string())),
        }
    }
}

/// A garage/depot with an optional coordinate stored as `"lat,lon"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub coordinate: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl Facility {
    /// The parsed coordinate, or `None` when absent or malformed.
    #[must_use]
    pub fn position(&self) -> Option<GeoPoint> {
        self.coordinate.as_deref().and_then(parse_coordinate)
    }
}

/// A tracked bus with its last reported position and nearest-facility data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub door_number: Option<String>,
    pub operator: Option<String>,
    pub facility_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub license_plate: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub nearest_facility_code: Option<String>,
    pub nearest_facility_name: Option<String>,
    pub distance_to_nearest_facility_km: Option<f64>,
}

impl Vehicle {
    #[must_use]
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        }
    }
}

/// One append-only entry of the retrieval audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub id: i64,
    pub kind: DataKind,
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub error_message: Option<String>,
}
