//! The Serializable configuration data structures used for setup.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "POLLSHIM_CONFIG";

#[derive(Error, Debug)]
pub enum ConfError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegistryConf {
    #[serde(default = "default_max_descriptors")]
    pub max_descriptors: usize,

    /// Pre-install handles 0, 1 and 2 as terminals.
    #[serde(default = "default_reserve_stdio")]
    pub reserve_stdio: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PollConf {
    /// Sleep between readiness scans while nothing is ready.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_probe_label")]
    pub probe_label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EpollConf {
    #[serde(default = "default_epoll_label")]
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LogConf {
    /// An env_logger filter, e.g. `debug` or `pollshim::poll=trace`.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_cfg_ver")]
    pub version: u32,

    #[serde(default = "default_registry_config")]
    pub registry: RegistryConf,

    #[serde(default = "default_poll_config")]
    pub poll: PollConf,

    #[serde(default = "default_epoll_config")]
    pub epoll: EpollConf,

    #[serde(default = "default_log_config")]
    pub log: LogConf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_cfg_ver(),
            registry: default_registry_config(),
            poll: default_poll_config(),
            epoll: default_epoll_config(),
            log: default_log_config(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfError> {
        let path = path.as_ref();
        let read = || {
            fs::read_to_string(path).map_err(|source| ConfError::Io {
                path: path.to_owned(),
                source,
            })
        };
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&read()?)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&read()?)?),
            Some("json") => Ok(serde_json::from_str(&read()?)?),
            _ => Err(ConfError::UnsupportedFormat(path.to_owned())),
        }
    }

    /// Load from `$POLLSHIM_CONFIG` when it is set, defaults otherwise.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            warn!("ignoring {}: {}", CONFIG_ENV, e);
            Self::default()
        })
    }
}

fn default_cfg_ver() -> u32 {
    1
}

fn default_registry_config() -> RegistryConf {
    RegistryConf {
        max_descriptors: default_max_descriptors(),
        reserve_stdio: default_reserve_stdio(),
    }
}

fn default_poll_config() -> PollConf {
    PollConf {
        interval_ms: default_poll_interval_ms(),
        probe_label: default_probe_label(),
    }
}

fn default_epoll_config() -> EpollConf {
    EpollConf {
        label: default_epoll_label(),
    }
}

fn default_log_config() -> LogConf {
    LogConf {
        level: default_log_level(),
        file: None,
    }
}

fn default_max_descriptors() -> usize {
    256
}

fn default_reserve_stdio() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_probe_label() -> String {
    "poll".to_owned()
}

fn default_epoll_label() -> String {
    "pollshim-epoll".to_owned()
}

fn default_log_level() -> String {
    "warn".to_owned()
}
