use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub upload: Upload,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: Default::default(),
            upload: Default::default(),
            logging: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Api {
    /// Base URL of the code-scanning API, e.g. "https://api.github.com".
    pub base_url: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    pub timeout_seconds: u64,
}
impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".into(),
            token_env: "SARIF_RELAY_TOKEN".into(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    /// Suffix used to select result files when the input is a directory.
    pub results_suffix: String,
    pub validate_schema: bool,
    pub add_fingerprints: bool,
    /// Reject serialized payloads over this many bytes before any network
    /// call; the server enforces the same ceiling.
    pub max_payload_bytes: u64,
    /// Skip delivery entirely (sentinel handling still runs). For tests and
    /// dry runs.
    pub test_mode: bool,
}
impl Default for Upload {
    fn default() -> Self {
        Self {
            results_suffix: ".sarif".into(),
            validate_schema: true,
            add_fingerprints: true,
            max_payload_bytes: 10 * 1024 * 1024,
            test_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
