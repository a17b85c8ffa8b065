use std::net::SocketAddr;

use chrono::FixedOffset;

use crate::tracking::DataKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Location and SOAP method of one upstream dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapServiceConfig {
    pub url: String,
    pub method: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub facility_service: SoapServiceConfig,
    pub vehicle_service: SoapServiceConfig,
    pub soap_namespace: String,
    pub soap_timeout_secs: u64,
    pub user_agent: String,
    pub cache_window_minutes: u32,
    /// Offset of the upstream clock; vehicle `Saat` values are local to it.
    pub source_utc_offset: FixedOffset,
    pub refresh_cron: Option<String>,
}

impl AppConfig {
    #[must_use]
    pub fn service_for(&self, kind: DataKind) -> &SoapServiceConfig {
        match kind {
            DataKind::Facility => &self.facility_service,
            DataKind::Vehicle => &self.vehicle_service,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("facility_service", &self.facility_service)
            .field("vehicle_service", &self.vehicle_service)
            .field("soap_namespace", &self.soap_namespace)
            .field("soap_timeout_secs", &self.soap_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("cache_window_minutes", &self.cache_window_minutes)
            .field("source_utc_offset", &self.source_utc_offset)
            .field("refresh_cron", &self.refresh_cron)
            .finish()
    }
}
