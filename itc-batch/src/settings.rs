use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_NODE: &str = "https://testnet.intelchain.network/";
pub const DEFAULT_CONFIG: &str = "config/itc-csv";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub node: String,
    pub batch_size: usize,
    pub timeout_per_tx: u64,
    pub cli_timeout: u64,
    pub default_passphrase: String,
    #[serde(default)]
    pub itc_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Defaults, then `path` (if present), then `ITC_CSV_*` variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with(path, Environment::with_prefix("ITC_CSV"))
    }

    fn load_with(path: &str, environment: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("node", DEFAULT_NODE)?
            .set_default("batch_size", 4i64)?
            .set_default("timeout_per_tx", 40i64)?
            .set_default("cli_timeout", 200i64)?
            .set_default("default_passphrase", "")?
            .add_source(File::with_name(path).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        if settings.batch_size == 0 {
            return Err(ConfigError::Message("batch_size must be at least 1".to_string()));
        }
        Ok(settings)
    }

    /// Directory holding the `itc` binary; defaults to where this program lives.
    pub fn itc_dir(&self) -> PathBuf {
        self.itc_dir.clone().unwrap_or_else(executable_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| self.itc_dir())
    }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.canonicalize().ok())
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
