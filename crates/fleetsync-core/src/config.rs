use crate::app_config::{AppConfig, Environment, SoapServiceConfig};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("FLEETSYNC_ENV", "development"))?;

    let bind_addr = or_default("FLEETSYNC_BIND_ADDR", "0.0.0.0:8080")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("FLEETSYNC_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("FLEETSYNC_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("FLEETSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("FLEETSYNC_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "FLEETSYNC_DB_MIN_CONNECTIONS",
            format!("must not exceed FLEETSYNC_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("FLEETSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let facility_service = SoapServiceConfig {
        url: validate_service_url(
            "FLEETSYNC_FACILITY_SERVICE_URL",
            require("FLEETSYNC_FACILITY_SERVICE_URL")?,
        )?,
        method: validate_method_name(
            "FLEETSYNC_FACILITY_METHOD",
            require("FLEETSYNC_FACILITY_METHOD")?,
        )?,
    };
    let vehicle_service = SoapServiceConfig {
        url: validate_service_url(
            "FLEETSYNC_VEHICLE_SERVICE_URL",
            require("FLEETSYNC_VEHICLE_SERVICE_URL")?,
        )?,
        method: validate_method_name(
            "FLEETSYNC_VEHICLE_METHOD",
            require("FLEETSYNC_VEHICLE_METHOD")?,
        )?,
    };

    let soap_namespace = or_default("FLEETSYNC_SOAP_NAMESPACE", "http://tempuri.org");
    let soap_timeout_secs = parse_u64("FLEETSYNC_SOAP_TIMEOUT_SECS", "30")?;
    if soap_timeout_secs == 0 {
        return Err(invalid(
            "FLEETSYNC_SOAP_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let user_agent = or_default("FLEETSYNC_USER_AGENT", "fleetsync/0.1 (transit-tracking)");

    let cache_window_minutes = parse_u32("FLEETSYNC_CACHE_WINDOW_MINUTES", "5")?;
    if cache_window_minutes == 0 {
        return Err(invalid(
            "FLEETSYNC_CACHE_WINDOW_MINUTES",
            "must be greater than zero".to_string(),
        ));
    }
    let source_utc_offset = or_default("FLEETSYNC_SOURCE_UTC_OFFSET", "+03:00")
        .trim()
        .parse::<chrono::FixedOffset>()
        .map_err(|e| invalid("FLEETSYNC_SOURCE_UTC_OFFSET", e.to_string()))?;
    let refresh_cron = lookup("FLEETSYNC_REFRESH_CRON")
        .ok()
        .filter(|v| !v.trim().is_empty());

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        facility_service,
        vehicle_service,
        soap_namespace,
        soap_timeout_secs,
        user_agent,
        cache_window_minutes,
        source_utc_offset,
        refresh_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FLEETSYNC_ENV".to_string(),
            reason: format!("unknown environment '{other}' (expected development, test, or production)"),
        }),
    }
}

fn validate_service_url(var: &str, url: String) -> Result<String, ConfigError> {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("'{trimmed}' is not an http(s) URL"),
        })
    }
}

/// The method name is interpolated into the request envelope as an element
/// name, so it must be a plain XML name.
fn validate_method_name(var: &str, method: String) -> Result<String, ConfigError> {
    let trimmed = method.trim();
    let mut chars = trimmed.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_start && valid_rest {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("'{trimmed}' is not a valid SOAP method name"),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
