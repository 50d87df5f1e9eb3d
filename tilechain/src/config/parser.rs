//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use crate::coord::MAX_ZOOM;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [orchestrator] section
    if let Some(section) = ini.section(Some("orchestrator")) {
        if let Some(v) = section.get("backoff_schedule_ms") {
            config.orchestrator.backoff_schedule_ms = parse_millis_list(v).ok_or_else(|| {
                invalid(
                    "orchestrator",
                    "backoff_schedule_ms",
                    v,
                    "expected a non-empty comma-separated list of milliseconds",
                )
            })?;
        }
        if let Some(v) = section.get("degraded_mode") {
            config.orchestrator.degraded_mode = v.parse().map_err(|_| {
                invalid(
                    "orchestrator",
                    "degraded_mode",
                    v,
                    "must be one of: never, when_offline, always",
                )
            })?;
        }
        config.orchestrator.event_capacity = parse_number(
            section,
            "orchestrator",
            "event_capacity",
            config.orchestrator.event_capacity,
        )?;
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        config.cache.max_tiles =
            parse_number(section, "cache", "max_tiles", config.cache.max_tiles)?;
    }

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = non_empty(section, "name") {
            config.source.name = v.to_string();
        }
        if let Some(v) = non_empty(section, "url") {
            config.source.url = v.to_string();
        }
        if let Some(v) = non_empty(section, "extension") {
            config.source.extension = v.trim_start_matches('.').to_string();
        }
        config.source.min_zoom =
            parse_number(section, "source", "min_zoom", config.source.min_zoom)?;
        config.source.max_zoom =
            parse_number(section, "source", "max_zoom", config.source.max_zoom)?;
        config.source.max_age_secs =
            parse_number(section, "source", "max_age_secs", config.source.max_age_secs)?;

        if config.source.max_zoom > MAX_ZOOM {
            return Err(invalid(
                "source",
                "max_zoom",
                &config.source.max_zoom.to_string(),
                &format!("must be at most {}", MAX_ZOOM),
            ));
        }
        if config.source.min_zoom > config.source.max_zoom {
            return Err(invalid(
                "source",
                "min_zoom",
                &config.source.min_zoom.to_string(),
                "must not exceed max_zoom",
            ));
        }
    }

    // [disk] section
    if let Some(section) = ini.section(Some("disk")) {
        if let Some(v) = section.get("enabled") {
            config.disk.enabled = parse_bool(v);
        }
        if let Some(v) = non_empty(section, "directory") {
            config.disk.directory = expand_tilde(v);
        }
    }

    // [network] section
    if let Some(section) = ini.section(Some("network")) {
        if let Some(v) = section.get("enabled") {
            config.network.enabled = parse_bool(v);
        }
        config.network.timeout_secs =
            parse_number(section, "network", "timeout_secs", config.network.timeout_secs)?;
    }

    // [worker] section
    if let Some(section) = ini.section(Some("worker")) {
        config.worker.threads = parse_number(section, "worker", "threads", config.worker.threads)?;
        config.worker.queue_size =
            parse_number(section, "worker", "queue_size", config.worker.queue_size)?;
    }

    Ok(config)
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn parse_millis_list(value: &str) -> Option<Vec<u64>> {
    let millis = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect::<Option<Vec<u64>>>()?;
    (!millis.is_empty()).then_some(millis)
}

fn parse_number<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    current: T,
) -> Result<T, ConfigFileError> {
    match section.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| invalid(section_name, key, v, "must be a non-negative integer")),
        None => Ok(current),
    }
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
