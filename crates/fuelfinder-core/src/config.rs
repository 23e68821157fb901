use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://www.fuel-finder.service.gov.uk/api/v1";

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
/// Decoupled from the process environment so tests can pass a `HashMap` lookup.
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
    let client_id = require("FUELFINDER_CLIENT_ID")?;
    let client_secret = require("FUELFINDER_CLIENT_SECRET")?;

    let env = parse_environment(&or_default("FUELFINDER_ENV", "development"));

    let bind_addr = or_default("FUELFINDER_BIND_ADDR", "0.0.0.0:8080")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("FUELFINDER_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("FUELFINDER_LOG_LEVEL", "info");

    let api_base_url = or_default("FUELFINDER_API_BASE_URL", DEFAULT_API_BASE_URL);
    if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
        return Err(invalid(
            "FUELFINDER_API_BASE_URL",
            "must be an http(s) URL".to_string(),
        ));
    }
    let request_timeout_secs = parse_u64("FUELFINDER_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("FUELFINDER_USER_AGENT", "fuelfinder/0.1 (price-ingestion)");

    let db_max_connections = parse_u32("FUELFINDER_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("FUELFINDER_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("FUELFINDER_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let max_bbox_span_meters = or_default("FUELFINDER_MAX_BBOX_SPAN_METERS", "50000")
        .parse::<f64>()
        .map_err(|e| invalid("FUELFINDER_MAX_BBOX_SPAN_METERS", e.to_string()))?;
    if !max_bbox_span_meters.is_finite() || max_bbox_span_meters <= 0.0 {
        return Err(invalid(
            "FUELFINDER_MAX_BBOX_SPAN_METERS",
            "must be a positive number of meters".to_string(),
        ));
    }

    let stations_schedule = or_default("FUELFINDER_STATIONS_SCHEDULE", "0 0 */6 * * *");
    let prices_schedule = or_default("FUELFINDER_PRICES_SCHEDULE", "0 10 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        client_id,
        client_secret,
        api_base_url,
        request_timeout_secs,
        user_agent,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        max_bbox_span_meters,
        stations_schedule,
        prices_schedule,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
