use anyhow::Result;
use figment::{
    providers::{Data, Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::analysis::CostAssumptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub population: PopulationConfig,
    pub costs: CostAssumptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Empty `url` selects the in-memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub connect_attempts: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            connect_attempts: 5,
        }
    }
}

impl DbConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Rows per insert request for panels, meters and circuits
    pub batch_size: usize,
    pub rollback_on_failure: bool,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            rollback_on_failure: false,
        }
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `EVCAP__` environment variables
    pub fn load() -> Result<Self> {
        Self::figment(Toml::file("config/default.toml"))
    }

    fn figment(file: Data<Toml>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(file)
            .merge(Env::prefixed("EVCAP__").split("__"));
        Ok(figment.extract()?)
    }
}
