//! Persistence seam for electrical records.
//!
//! The orchestrator only ever talks to [`ElectricalRepository`]; the
//! in-memory and Postgres stores both implement it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Phase;
use crate::generator::{MeterKind, PanelKind};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    Panels,
    MeterStacks,
    Meters,
    Circuits,
    Feeders,
    Transformers,
}

/// What a panel is fed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FedFromType {
    Service,
    Panel,
    MeterStack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPanel {
    pub project_id: Uuid,
    pub name: String,
    pub panel_type: PanelKind,
    pub voltage: i32,
    pub phase: Phase,
    pub bus_rating: i32,
    pub main_breaker_amps: i32,
    pub spaces: i32,
    pub location: String,
    pub fed_from: Option<Uuid>,
    pub fed_from_type: FedFromType,
    pub meter_stack_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeterStack {
    pub project_id: Uuid,
    pub name: String,
    pub num_meters: i32,
    pub bus_rating: i32,
    pub voltage: i32,
    pub phase: Phase,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeter {
    pub project_id: Uuid,
    pub meter_stack_id: Uuid,
    pub panel_id: Uuid,
    pub meter_number: String,
    pub meter_type: MeterKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCircuit {
    pub project_id: Uuid,
    pub panel_id: Uuid,
    pub circuit_number: i32,
    pub description: String,
    pub breaker_amps: i32,
    pub poles: i16,
    pub load_watts: f64,
    pub conductor_size: String,
    pub load_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeeder {
    pub project_id: Uuid,
    pub name: String,
    pub source_panel_id: Uuid,
    pub destination_panel_id: Uuid,
    pub conductor_size: String,
    pub length_ft: Option<f64>,
}

/// A row to insert; the store assigns its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NewRecord {
    Panel(NewPanel),
    MeterStack(NewMeterStack),
    Meter(NewMeter),
    Circuit(NewCircuit),
    Feeder(NewFeeder),
}

impl NewRecord {
    pub fn table(&self) -> Table {
        match self {
            NewRecord::Panel(_) => Table::Panels,
            NewRecord::MeterStack(_) => Table::MeterStacks,
            NewRecord::Meter(_) => Table::Meters,
            NewRecord::Circuit(_) => Table::Circuits,
            NewRecord::Feeder(_) => Table::Feeders,
        }
    }

    pub fn project_id(&self) -> Uuid {
        match self {
            NewRecord::Panel(r) => r.project_id,
            NewRecord::MeterStack(r) => r.project_id,
            NewRecord::Meter(r) => r.project_id,
            NewRecord::Circuit(r) => r.project_id,
            NewRecord::Feeder(r) => r.project_id,
        }
    }
}

/// Columns changed by an update; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fed_from: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fed_from_type: Option<FedFromType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_stack_id: Option<Uuid>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.fed_from.is_none() && self.fed_from_type.is_none() && self.meter_stack_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeleteFilter {
    Project(Uuid),
    Ids(Vec<Uuid>),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{table}.{column} references missing row {id}")]
    ForeignKey {
        table: Table,
        column: &'static str,
        id: Uuid,
    },

    #[error("{table} row {id} is still referenced by {referenced_by}")]
    StillReferenced {
        table: Table,
        id: Uuid,
        referenced_by: Table,
    },

    #[error("check constraint violated on {table}: {message}")]
    CheckViolation { table: Table, message: String },

    #[error("{table} row {id} not found")]
    NotFound { table: Table, id: Uuid },

    #[error("batch mixes rows for {first} and {other}")]
    MixedBatch { first: Table, other: Table },

    #[error("{table} does not accept updates")]
    UnsupportedUpdate { table: Table },

    #[error("backend error: {0}")]
    Backend(String),

    #[cfg(feature = "db")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Insert, update and delete electrical records scoped by project
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ElectricalRepository: Send + Sync {
    async fn insert(&self, record: NewRecord) -> RepositoryResult<Uuid>;

    /// All rows must target the same table; ids come back in input order.
    /// A batch is applied entirely or not at all.
    async fn insert_batch(&self, records: Vec<NewRecord>) -> RepositoryResult<Vec<Uuid>>;

    async fn update(&self, table: Table, id: Uuid, patch: RecordPatch) -> RepositoryResult<()>;

    /// Returns the number of rows removed
    async fn delete(&self, table: Table, filter: DeleteFilter) -> RepositoryResult<u64>;

    async fn count(&self, table: Table, project_id: Uuid) -> RepositoryResult<u64>;
}

/// Table shared by every record of a batch
pub fn batch_table(records: &[NewRecord]) -> RepositoryResult<Option<Table>> {
    let mut tables = records.iter().map(NewRecord::table);
    let Some(first) = tables.next() else {
        return Ok(None);
    };
    match tables.find(|t| *t != first) {
        Some(other) => Err(RepositoryError::MixedBatch { first, other }),
        None => Ok(Some(first)),
    }
}
