//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::file::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let backoff = config
        .orchestrator
        .backoff_schedule_ms
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"; tilechain configuration

[orchestrator]
; Delay after each consecutive failure to fetch a tile, in milliseconds.
; The last entry repeats once the list is used up.
backoff_schedule_ms = {}
; Whether stale cached tiles are served without a refresh: never, when_offline, always
degraded_mode = {}
; Buffered tile events per subscriber before the oldest are dropped
event_capacity = {}

[cache]
; Tiles kept in memory
max_tiles = {}

[source]
name = {}
; {{z}}, {{x}} and {{y}} are replaced with the tile coordinates
url = {}
min_zoom = {}
max_zoom = {}
extension = {}
; Tiles older than this are considered expired
max_age_secs = {}

[disk]
enabled = {}
directory = {}

[network]
enabled = {}
timeout_secs = {}

[worker]
; Concurrent loads per backend
threads = {}
; Requests a backend accepts before reporting overflow
queue_size = {}
"#,
        backoff,
        config.orchestrator.degraded_mode,
        config.orchestrator.event_capacity,
        config.cache.max_tiles,
        config.source.name,
        config.source.url,
        config.source.min_zoom,
        config.source.max_zoom,
        config.source.extension,
        config.source.max_age_secs,
        config.disk.enabled,
        path_to_string(&config.disk.directory),
        config.network.enabled,
        config.network.timeout_secs,
        config.worker.threads,
        config.worker.queue_size,
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_lists_every_section() {
        let text = to_config_string(&ConfigFile::default());
        for section in [
            "[orchestrator]",
            "[cache]",
            "[source]",
            "[disk]",
            "[network]",
            "[worker]",
        ] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains("backoff_schedule_ms = 5000, 15000, 60000, 120000, 300000"));
        assert!(text.contains("degraded_mode = never"));
    }

    #[test]
    fn test_default_round_trips() {
        let config = ConfigFile::default();
        let parsed = ConfigFile::from_ini_str(&to_config_string(&config)).unwrap();
        assert_eq!(parsed, config);
    }
}
