use crate::annotate::Align;
use crate::parser::is_server_log;
use crate::query::LogView;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeaConfig {
    /// Free-form label for the loaded profile.
    pub profile_name: String,
    pub view: ViewDefaults,
}

impl Default for SeaConfig {
    fn default() -> Self {
        Self {
            profile_name: "base".to_string(),
            view: ViewDefaults::default(),
        }
    }
}

/// Control values used when a query leaves them unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewDefaults {
    pub filter: String,
    pub start: String,
    pub end: String,
    pub text: String,
    pub id: String,
    pub color: String,
    pub details: String,
    pub align_for_other_logs: Align,
    pub align_for_server_log: Align,
    /// Logs with at least this many records start hidden.
    pub threshold_for_visible: usize,
}

impl Default for ViewDefaults {
    fn default() -> Self {
        Self {
            filter: String::new(),
            start: String::new(),
            end: String::new(),
            text: "title || line".to_string(),
            id: "id".to_string(),
            color: "title".to_string(),
            details: "message".to_string(),
            align_for_other_logs: Align::Left,
            align_for_server_log: Align::Right,
            threshold_for_visible: 2000,
        }
    }
}

impl ViewDefaults {
    /// Default visibility and alignment for a log holding `count` records.
    pub fn log_view(&self, log: &str, count: usize) -> LogView {
        LogView {
            visible: count < self.threshold_for_visible,
            align: if is_server_log(log) {
                self.align_for_server_log
            } else {
                self.align_for_other_logs
            },
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<SeaConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<SeaConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<SeaConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}

pub fn default_config() -> &'static SeaConfig {
    static DEFAULT_CONFIG: LazyLock<SeaConfig> = LazyLock::new(SeaConfig::default);
    &DEFAULT_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_view_table_keeps_other_defaults() {
        let config: SeaConfig = toml::from_str(
            r#"
            [view]
            text = "body"
            align_for_server_log = "center"
            "#,
        )
        .unwrap();
        assert_eq!(config.profile_name, "base");
        assert_eq!(config.view.text, "body");
        assert_eq!(config.view.align_for_server_log, Align::Center);
        assert_eq!(config.view.id, "id");
        assert_eq!(config.view.threshold_for_visible, 2000);
    }

    #[test]
    fn server_logs_align_right_by_default() {
        let view = ViewDefaults::default();
        assert_eq!(view.log_view("server", 1).align, Align::Right);
        assert_eq!(view.log_view("lsp:server", 1).align, Align::Right);
        assert_eq!(view.log_view("client", 1).align, Align::Left);
        assert!(!view.log_view("client", 2000).visible);
    }
}
