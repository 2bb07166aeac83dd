use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::http::parser::ReadOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to deserialize {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,

    /// Initial size of the per-connection read buffer.
    pub buffer_size: usize,
    /// The read buffer doubles when full but never grows past this.
    pub max_buffer_size: usize,

    /// Idle timeout for each socket read, in seconds. `0` disables it.
    #[serde(deserialize_with = "deserialize_timeout")]
    pub read_timeout: Option<Duration>,

    pub assets_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 42069,

            buffer_size: 1024,
            max_buffer_size: 1024 * 1024, // 1 MB

            read_timeout: Some(Duration::from_secs(5)),

            assets_dir: PathBuf::from("./assets"),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str::<ServerConfig>(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`ServerConfig::load`] but falls back to the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "falling back to default config");
                ServerConfig::default()
            }
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            initial_capacity: self.buffer_size,
            max_capacity: self.max_buffer_size,
            idle_timeout: self.read_timeout,
        }
    }
}

fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if secs < 0.0 || !secs.is_finite() {
        return Err(serde::de::Error::custom(format!(
            "invalid timeout {secs}, expected seconds >= 0"
        )));
    }
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(serde::de::Error::custom)
}
