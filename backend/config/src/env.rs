//! Environment variable handling for config values.
//!
//! String values may reference `${VAR_NAME}` (uppercase names only),
//! resolved at load time; `$${VAR_NAME}` escapes to a literal `${VAR_NAME}`.
//! A referenced variable that is unset or empty fails the load.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::schema::CapforgeConfig;

static VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\$?)\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references across a config value tree.
pub fn substitute_env(value: &Value) -> Result<Value> {
    substitute_with(value, &std::env::vars().collect(), "")
}

/// Substitute using a provided map (useful for testing).
pub fn substitute_env_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_with(value, env, "")
}

fn substitute_with(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(items) => {
            let substituted: Result<Vec<_>> = items
                .iter()
                .enumerate()
                .map(|(i, item)| substitute_with(item, env, &format!("{path}[{i}]")))
                .collect();
            Ok(Value::Array(substituted?))
        }
        Value::Object(map) => {
            let mut substituted = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                substituted.insert(key.clone(), substitute_with(item, env, &child)?);
            }
            Ok(Value::Object(substituted))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(input: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in VAR_PATTERN.captures_iter(input) {
        let whole = caps.get(0).expect("match always has a full capture");
        out.push_str(&input[last..whole.start()]);
        let name = &caps[2];
        if caps[1].is_empty() {
            match env.get(name).filter(|v| !v.is_empty()) {
                Some(resolved) => out.push_str(resolved),
                None => {
                    return Err(MissingEnvVarError {
                        var_name: name.to_string(),
                        config_path: path.to_string(),
                    }
                    .into())
                }
            }
        } else {
            // Escaped reference: drop the extra `$`, keep the braces.
            out.push_str("${");
            out.push_str(name);
            out.push('}');
        }
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}

/// Apply `CAPFORGE_*` process-environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut CapforgeConfig) {
    apply_overrides_from(config, &std::env::vars().collect());
}

fn apply_overrides_from(config: &mut CapforgeConfig, env: &HashMap<String, String>) {
    if let Some(turns) = env.get("CAPFORGE_MAX_SESSION_TURNS") {
        if let Ok(parsed) = turns.parse() {
            config.session.max_session_turns = parsed;
        }
    }
    if let Some(debug) = env.get("CAPFORGE_DEBUG") {
        config.session.debug = matches!(debug.as_str(), "1" | "true" | "yes");
    }
    if let Some(level) = env.get("CAPFORGE_LOG_LEVEL") {
        if !level.is_empty() {
            config.logging.level = level.clone();
        }
    }
}
