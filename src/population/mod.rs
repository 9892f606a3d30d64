//! Persistence of generated electrical entities.

pub mod clear;
pub mod memory;
pub mod orchestrator;
#[cfg(feature = "db")]
pub mod pg;
pub mod repository;

pub use clear::{clear_project, ClearSummary, CLEAR_ORDER};
pub use memory::MemoryRepository;
pub use orchestrator::{
    CreatedEntities, PopulateOptions, PopulationError, PopulationOrchestrator, PopulationProgress,
    PopulationResult, PopulationStep, PopulationSummary,
};
#[cfg(feature = "db")]
pub use pg::PgElectricalRepository;
pub use repository::{
    DeleteFilter, ElectricalRepository, FedFromType, NewRecord, RecordPatch, RepositoryError,
    RepositoryResult, Table,
};
