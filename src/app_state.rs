use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::population::{ElectricalRepository, MemoryRepository};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub repo: Arc<dyn ElectricalRepository>,
    /// Name of the store backing `repo`, reported by the health check
    pub store: &'static str,
}

impl AppState {
    pub fn new(cfg: Config, repo: Arc<dyn ElectricalRepository>, store: &'static str) -> Self {
        Self {
            cfg: Arc::new(cfg),
            repo,
            store,
        }
    }

    pub fn in_memory(cfg: Config) -> Self {
        Self::new(cfg, Arc::new(MemoryRepository::new()), "memory")
    }

    /// Postgres when `db.url` is set and the `db` feature is compiled in,
    /// otherwise the in-memory store
    pub async fn from_config(cfg: Config) -> Result<Self> {
        if !cfg.db.is_configured() {
            info!("no database configured, using in-memory store");
            return Ok(Self::in_memory(cfg));
        }

        #[cfg(feature = "db")]
        {
            let repo = crate::population::PgElectricalRepository::connect(&cfg.db).await?;
            Ok(Self::new(cfg, Arc::new(repo), "postgres"))
        }

        #[cfg(not(feature = "db"))]
        {
            tracing::warn!("db.url is set but the binary was built without the `db` feature; using in-memory store");
            Ok(Self::in_memory(cfg))
        }
    }
}
