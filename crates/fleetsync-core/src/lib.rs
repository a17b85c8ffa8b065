//! Shared domain types, geographic helpers, and configuration for fleetsync.

pub mod app_config;
pub mod config;
pub mod geo;
pub mod tracking;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, SoapServiceConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{
    haversine_km, parse_coordinate, parse_geometry_point, parse_number, parse_timestamp,
    try_parse_timestamp, GeoPoint, EARTH_RADIUS_KM, SOURCE_TIMESTAMP_FORMAT,
};
pub use tracking::{DataKind, Facility, ParseDataKindError, RetrievalRecord, Vehicle};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
