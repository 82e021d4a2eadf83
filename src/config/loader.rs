//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Prefix for per-field environment overrides, e.g. `PEER_RELAY__PORT=8080`
/// or `PEER_RELAY__WEBSOCKET__ALIVE_TIMEOUT_SECS=30`.
pub const ENV_OVERRIDE_PREFIX: &str = "PEER_RELAY__";

/// Load configuration, merging sources from lowest to highest precedence:
/// 1) Defaults compiled into the binary
/// 2) `config.json` next to the executable
/// 3) `config.json` in the current working directory
/// 4) File named by `PEER_RELAY_CONFIG_PATH`
/// 5) JSON read from stdin when `PEER_RELAY_CONFIG_STDIN` is truthy
/// 6) Raw JSON in `PEER_RELAY_CONFIG_JSON`
/// 7) `PEER_RELAY__SECTION__FIELD` environment overrides
///
/// Read and parse failures are reported on stderr and the offending source is
/// skipped. Validation problems are reported but not propagated; callers that
/// need a hard failure should run [`validate_config`] themselves.
#[must_use]
pub fn load() -> Config {
    let layers = collect_layers();
    let config = from_layers(layers, std::env::vars());

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

/// Build a config from JSON layers (lowest precedence first) and
/// environment-style overrides.
pub fn from_layers<I>(layers: Vec<Value>, env: I) -> Config
where
    I: IntoIterator<Item = (String, String)>,
{
    let defaults = Config::default();
    let mut merged = serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(Map::new()));

    for layer in layers {
        merge_values(&mut merged, layer);
    }
    apply_env_overrides(&mut merged, env);

    match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    }
}

fn collect_layers() -> Vec<Value> {
    use std::env;
    use std::io::Read;

    let mut layers = Vec::new();

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            layers.extend(read_file_layer(&exe_dir.join("config.json")));
        }
    }

    layers.extend(read_file_layer(Path::new("config.json")));

    if let Ok(path) = env::var("PEER_RELAY_CONFIG_PATH") {
        layers.extend(read_file_layer(&PathBuf::from(path)));
    }

    if env::var("PEER_RELAY_CONFIG_STDIN").is_ok_and(|val| env_var_truthy(&val)) {
        let mut buf = String::new();
        match std::io::stdin().read_to_string(&mut buf) {
            Ok(_) => layers.extend(parse_json_document(&buf, "stdin")),
            Err(e) => eprintln!("Failed to read config from stdin: {e}"),
        }
    }

    if let Ok(json) = env::var("PEER_RELAY_CONFIG_JSON") {
        layers.extend(parse_json_document(&json, "PEER_RELAY_CONFIG_JSON"));
    }

    layers
}

fn read_file_layer(path: &Path) -> Option<Value> {
    if path.as_os_str().is_empty() || !path.exists() {
        return None;
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => parse_json_document(&contents, &format!("file {}", path.display())),
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
            None
        }
    }
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

/// Deep-merge `source` into `target`. Objects merge key by key; anything else
/// (including arrays such as `mounts`) is replaced wholesale.
fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides<I>(root: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_OVERRIDE_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_env_value(&raw_value));
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Interpret an override as JSON when it parses (numbers, booleans, objects),
/// otherwise as a plain string.
fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.insert(first.clone(), value);
    } else {
        let entry = map
            .entry(first.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        set_nested_value(entry, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn later_layers_win_and_nested_fields_merge() {
        let config = from_layers(
            vec![
                json!({"port": 7000, "websocket": {"alive_timeout_secs": 30}}),
                json!({"port": 7001}),
            ],
            Vec::new(),
        );
        assert_eq!(config.port, 7001);
        assert_eq!(config.websocket.alive_timeout_secs, 30);
        assert_eq!(config.websocket.cleanup_interval_secs, 5);
    }

    #[test]
    fn env_overrides_beat_layers() {
        let config = from_layers(
            vec![json!({"port": 7000})],
            env(&[
                ("PEER_RELAY__PORT", "8088"),
                ("PEER_RELAY__LOGGING__LEVEL", "debug"),
                ("PEER_RELAY__SECURITY__CORS_ORIGINS", "https://a.example,https://b.example"),
                ("UNRELATED", "1"),
            ]),
        );
        assert_eq!(config.port, 8088);
        assert_eq!(
            config.logging.level,
            Some(crate::config::LogLevel::Debug)
        );
        assert_eq!(
            config.security.cors_origins,
            "https://a.example,https://b.example"
        );
    }

    #[test]
    fn mounts_array_is_replaced_not_merged() {
        let config = from_layers(
            vec![json!({"mounts": [
                {"name": "meet", "signaling_prefix": "/peerjs"},
                {"name": "airsoft", "http_prefix": "/airsoft", "signaling_prefix": "/airsoft"}
            ]})],
            Vec::new(),
        );
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[1].http_prefix, "/airsoft");
        assert_eq!(config.mounts[1].key, "peerjs");
    }

    #[test]
    fn invalid_document_falls_back_to_defaults() {
        let config = from_layers(vec![json!({"port": "not a port"})], Vec::new());
        assert_eq!(config.port, 9000);
        assert!(parse_json_document("{ nope", "test").is_none());
        assert!(parse_json_document("   ", "test").is_none());
    }

    #[test]
    fn truthy_values() {
        assert!(env_var_truthy("1"));
        assert!(env_var_truthy(" TRUE "));
        assert!(env_var_truthy("yes"));
        assert!(!env_var_truthy("0"));
    }
}
