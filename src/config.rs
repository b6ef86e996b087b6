// Tue Jan 13 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_ENABLE: &str = "MODDUMP_ENABLE";
pub const ENV_CONFIG: &str = "MODDUMP_CONFIG";
pub const ENV_OUTPUT: &str = "MODDUMP_OUTPUT";
pub const ENV_CHUNK_SIZE: &str = "MODDUMP_CHUNK_SIZE";
pub const ENV_SCAN_INTERVAL: &str = "MODDUMP_SCAN_INTERVAL_MS";
pub const ENV_SETTLE_DELAY: &str = "MODDUMP_SETTLE_DELAY_MS";
pub const ENV_HOOKS: &str = "MODDUMP_HOOKS";
pub const ENV_LOG: &str = "MODDUMP_LOG";
pub const ENV_VERBOSE: &str = "MODDUMP_VERBOSE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: String, value: String },
    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bytes per outbound chunk.
    pub chunk_size: usize,
    pub scan_interval_ms: u64,
    /// Wait between a loader call returning and resolving the new module.
    pub settle_delay_ms: u64,
    pub loader_functions: Vec<String>,
    pub library_extensions: Vec<String>,
    /// Substring a loader path must contain to be treated as a library.
    pub library_indicator: String,
    /// Sink target; `{pid}` is replaced with the process id.
    pub output: String,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 65536,
            scan_interval_ms: 10_000,
            settle_delay_ms: 250,
            loader_functions: vec!["dlopen".to_string(), "android_dlopen_ext".to_string()],
            library_extensions: vec![".so".to_string()],
            library_indicator: ".so".to_string(),
            output: "/tmp/module-dumper-{pid}.bin".to_string(),
            log_file: None,
            verbose: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_scan_interval_ms(mut self, interval: u64) -> Self {
        self.scan_interval_ms = interval;
        self
    }

    pub fn with_settle_delay_ms(mut self, delay: u64) -> Self {
        self.settle_delay_ms = delay;
        self
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    pub fn with_loader_functions(mut self, functions: Vec<String>) -> Self {
        self.loader_functions = functions;
        self
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn resolved_output(&self) -> String {
        self.output.replace("{pid}", &std::process::id().to_string())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// True when the environment asks for a dumping session in this process.
    pub fn requested_by_env() -> bool {
        std::env::var(ENV_ENABLE).map(|v| v == "1").unwrap_or(false)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults, then the JSON file named by `MODDUMP_CONFIG`, then individual
    /// `MODDUMP_*` overrides. The result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(value) = lookup(ENV_CHUNK_SIZE) {
            config.chunk_size = parse_env(ENV_CHUNK_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_SCAN_INTERVAL) {
            config.scan_interval_ms = parse_env(ENV_SCAN_INTERVAL, &value)?;
        }
        if let Some(value) = lookup(ENV_SETTLE_DELAY) {
            config.settle_delay_ms = parse_env(ENV_SETTLE_DELAY, &value)?;
        }
        if let Some(value) = lookup(ENV_OUTPUT) {
            config.output = value;
        }
        if let Some(value) = lookup(ENV_HOOKS) {
            config.loader_functions = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup(ENV_LOG) {
            config.log_file = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_VERBOSE) {
            config.verbose = value == "1";
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Validation("chunk_size must be greater than 0".to_string()));
        }
        if self.scan_interval_ms == 0 {
            return Err(ConfigError::Validation("scan_interval_ms must be greater than 0".to_string()));
        }
        if self.library_extensions.iter().all(|e| e.is_empty()) {
            return Err(ConfigError::Validation("library_extensions must name at least one extension".to_string()));
        }
        if self.library_indicator.is_empty() {
            return Err(ConfigError::Validation("library_indicator must not be empty".to_string()));
        }
        if self.loader_functions.iter().any(|f| f.is_empty()) {
            return Err(ConfigError::Validation("loader_functions must not contain empty names".to_string()));
        }
        if self.output.is_empty() {
            return Err(ConfigError::Validation("output must be set".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
