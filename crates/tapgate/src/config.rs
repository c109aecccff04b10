use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_registry_file")]
    pub registry_file: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tap: TapConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_file: default_registry_file(),
            logging: LoggingConfig::default(),
            tap: TapConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_audit_path")]
    pub audit_log_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            audit_log_path: default_audit_path(),
        }
    }
}

/// Settings applied to taps entered on the command line.
#[derive(Debug, Default, Deserialize)]
pub struct TapConfig {
    /// Reader id recorded when `--device` is not given.
    #[serde(default)]
    pub default_device_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_registry_file() -> PathBuf {
    PathBuf::from("registry.yaml")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("audit.jsonl")
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// Returns `None` when the file does not exist, so a fresh checkout can be
/// driven entirely from command-line flags. Runs before logging is set up,
/// so reporting the fallback is left to the caller.
pub fn load(path: &Path) -> anyhow::Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    parse(&contents)
        .map(Some)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))
}

fn parse(yaml: &str) -> Result<Config, serde_yml::Error> {
    serde_yml::from_str(yaml)
}
