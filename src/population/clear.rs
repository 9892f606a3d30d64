use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::repository::{DeleteFilter, ElectricalRepository, RepositoryResult, Table};

/// Reverse dependency order; each table is emptied before the ones it references
pub const CLEAR_ORDER: [Table; 6] = [
    Table::Feeders,
    Table::Meters,
    Table::MeterStacks,
    Table::Circuits,
    Table::Panels,
    Table::Transformers,
];

/// Rows deleted per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSummary {
    pub feeders: u64,
    pub meters: u64,
    pub meter_stacks: u64,
    pub circuits: u64,
    pub panels: u64,
    pub transformers: u64,
}

impl ClearSummary {
    pub fn total(&self) -> u64 {
        self.feeders + self.meters + self.meter_stacks + self.circuits + self.panels + self.transformers
    }

    fn slot(&mut self, table: Table) -> &mut u64 {
        match table {
            Table::Feeders => &mut self.feeders,
            Table::Meters => &mut self.meters,
            Table::MeterStacks => &mut self.meter_stacks,
            Table::Circuits => &mut self.circuits,
            Table::Panels => &mut self.panels,
            Table::Transformers => &mut self.transformers,
        }
    }
}

/// Wipe a project's electrical records.
///
/// Stops at the first failing table; tables already cleared stay cleared and
/// running it again finishes the job.
pub async fn clear_project<R: ElectricalRepository + ?Sized>(
    repo: &R,
    project_id: Uuid,
) -> RepositoryResult<ClearSummary> {
    let mut summary = ClearSummary::default();
    for table in CLEAR_ORDER {
        *summary.slot(table) = repo.delete(table, DeleteFilter::Project(project_id)).await?;
    }
    info!(%project_id, deleted = summary.total(), "cleared electrical data");
    Ok(summary)
}
