#![cfg(feature = "db")]

//! Postgres store. Rows are shipped as JSON and expanded server side with
//! `json_populate_recordset`, so one statement writes a whole batch.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::repository::{
    batch_table, DeleteFilter, ElectricalRepository, NewRecord, RecordPatch, RepositoryError,
    RepositoryResult, Table,
};
use crate::config::DbConfig;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

fn columns(table: Table) -> &'static str {
    match table {
        Table::Panels => {
            "id, project_id, name, panel_type, voltage, phase, bus_rating, main_breaker_amps, \
             spaces, location, fed_from, fed_from_type, meter_stack_id, notes"
        }
        Table::MeterStacks => "id, project_id, name, num_meters, bus_rating, voltage, phase, location",
        Table::Meters => "id, project_id, meter_stack_id, panel_id, meter_number, meter_type",
        Table::Circuits => {
            "id, project_id, panel_id, circuit_number, description, breaker_amps, poles, \
             load_watts, conductor_size, load_type"
        }
        Table::Feeders => {
            "id, project_id, name, source_panel_id, destination_panel_id, conductor_size, length_ft"
        }
        Table::Transformers => "id, project_id",
    }
}

fn map_db_error(table: Table, error: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &error {
        match db.code().as_deref() {
            Some(CHECK_VIOLATION) => {
                return RepositoryError::CheckViolation {
                    table,
                    message: db.message().to_string(),
                }
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return RepositoryError::Backend(format!("{}: {}", table, db.message()))
            }
            _ => {}
        }
    }
    RepositoryError::Database(error)
}

pub struct PgElectricalRepository {
    pool: PgPool,
}

impl PgElectricalRepository {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with exponential backoff, then run a health check
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        let pool = loop {
            attempt += 1;
            let result = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
                .connect(&config.url)
                .await;
            match result {
                Ok(pool) => break pool,
                Err(e) if attempt >= config.connect_attempts => {
                    return Err(e).context(format!(
                        "failed to connect to database after {} attempts",
                        attempt
                    ));
                }
                Err(e) => {
                    warn!(attempt, error = %e, ?delay, "database connection failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        };

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("database health check failed")?;
        info!("database pool ready");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Serialize records with client-assigned ids so the batch order is kept
fn with_ids(records: Vec<NewRecord>) -> RepositoryResult<(Vec<Uuid>, Value)> {
    let mut ids = Vec::with_capacity(records.len());
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut row = serde_json::to_value(&record)
            .map_err(|e| RepositoryError::Backend(format!("encode row: {}", e)))?;
        let id = Uuid::new_v4();
        if let Value::Object(map) = &mut row {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
        ids.push(id);
        rows.push(row);
    }
    Ok((ids, Value::Array(rows)))
}

#[async_trait]
impl ElectricalRepository for PgElectricalRepository {
    async fn insert(&self, record: NewRecord) -> RepositoryResult<Uuid> {
        let mut ids = self.insert_batch(vec![record]).await?;
        ids.pop()
            .ok_or_else(|| RepositoryError::Backend("insert returned no id".to_string()))
    }

    async fn insert_batch(&self, records: Vec<NewRecord>) -> RepositoryResult<Vec<Uuid>> {
        let Some(table) = batch_table(&records)? else {
            return Ok(Vec::new());
        };
        let (ids, rows) = with_ids(records)?;
        let cols = columns(table);
        let sql = format!(
            "INSERT INTO {table} ({cols}) SELECT {cols} FROM json_populate_recordset(NULL::{table}, $1::json)"
        );

        sqlx::query(&sql)
            .bind(rows)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(table, e))?;
        debug!(%table, count = ids.len(), "inserted rows");
        Ok(ids)
    }

    async fn update(&self, table: Table, id: Uuid, patch: RecordPatch) -> RepositoryResult<()> {
        if table != Table::Panels {
            return Err(RepositoryError::UnsupportedUpdate { table });
        }
        let done = sqlx::query(
            "UPDATE panels SET \
                fed_from = COALESCE($2, fed_from), \
                fed_from_type = COALESCE($3, fed_from_type), \
                meter_stack_id = COALESCE($4, meter_stack_id) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.fed_from)
        .bind(patch.fed_from_type.map(|t| t.to_string()))
        .bind(patch.meter_stack_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(table, e))?;

        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { table, id });
        }
        Ok(())
    }

    async fn delete(&self, table: Table, filter: DeleteFilter) -> RepositoryResult<u64> {
        let done = match filter {
            DeleteFilter::Project(project_id) => {
                sqlx::query(&format!("DELETE FROM {table} WHERE project_id = $1"))
                    .bind(project_id)
                    .execute(&self.pool)
                    .await
            }
            DeleteFilter::Ids(ids) => {
                sqlx::query(&format!("DELETE FROM {table} WHERE id = ANY($1)"))
                    .bind(ids)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| map_db_error(table, e))?;
        Ok(done.rows_affected())
    }

    async fn count(&self, table: Table, project_id: Uuid) -> RepositoryResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE project_id = $1"))
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }
}
