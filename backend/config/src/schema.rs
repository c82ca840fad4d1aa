//! capforge configuration schema, typed for serde YAML deserialization.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for capforge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapforgeConfig {
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Maximum turns per session; negative means unlimited.
    pub max_session_turns: i64,
    /// Verbose diagnostics on stderr.
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_session_turns: -1,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    /// Authentication mode descriptor, surfaced in fatal-error hints.
    pub mode: String,
    /// Named credential profile, when one is selected.
    pub profile: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: "api-key".to_string(),
            profile: None,
        }
    }
}

impl AuthConfig {
    /// Human-readable auth context for diagnostics.
    pub fn describe(&self) -> String {
        match &self.profile {
            Some(profile) => format!("{} ({profile})", self.mode),
            None => self.mode.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Directory for NDJSON telemetry logs; defaults to the config dir.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    /// Upper bound for `read_file`, in bytes.
    pub max_read_bytes: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_read_bytes: 256 * 1024,
        }
    }
}
