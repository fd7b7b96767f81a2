//! Runtime configuration.
//!
//! Loaded from `~/.hydra/config.yaml`, best-effort: a missing or malformed
//! file falls back to defaults so the binary always starts. `HYDRA_COMMAND`
//! overrides the configured command for one-off runs.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::SpawnSpec;

fn default_command() -> String {
    "claude".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydraConfig {
    /// The wrapped interactive command.
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the PTY child.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for HydraConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

impl HydraConfig {
    /// Load from a YAML file, applying the `HYDRA_COMMAND` override.
    pub fn load(path: &Path) -> Self {
        let mut config = if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "malformed config, using defaults");
                    Self::default()
                }),
                Err(_) => Self::default(),
            }
        } else {
            Self::default()
        };

        if let Ok(command) = std::env::var("HYDRA_COMMAND") {
            if !command.is_empty() {
                config.command = command;
            }
        }
        config
    }

    pub fn spawn_spec(&self) -> SpawnSpec {
        SpawnSpec {
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HydraConfig::default();
        assert_eq!(config.command, "claude");
        assert!(config.args.is_empty());
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let config: HydraConfig = serde_yaml::from_str(
            "command: aider\nargs: [\"--model\", \"gpt\"]\nenv:\n  FOO: bar\n",
        )
        .unwrap();
        assert_eq!(config.command, "aider");
        assert_eq!(config.args, vec!["--model", "gpt"]);
        assert_eq!(config.env.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: HydraConfig = serde_yaml::from_str("args: [\"-v\"]\n").unwrap();
        assert_eq!(config.command, "claude");
        assert_eq!(config.args, vec!["-v"]);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = HydraConfig::load(Path::new("/nonexistent/hydra/config.yaml"));
        assert_eq!(config.command, "claude");
    }
}
