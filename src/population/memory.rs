use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::repository::{
    batch_table, DeleteFilter, ElectricalRepository, FedFromType, NewPanel, NewRecord,
    RecordPatch, RepositoryError, RepositoryResult, Table,
};

#[derive(Debug, Clone)]
struct StoredRow {
    id: Uuid,
    record: NewRecord,
}

/// Fails the insert that would push a table past `allow` rows
#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    table: Table,
    allow: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: HashMap<Table, Vec<StoredRow>>,
    inserted: HashMap<Table, usize>,
    failure: Option<InjectedFailure>,
    requests: usize,
}

impl MemoryState {
    fn table(&self, table: Table) -> &[StoredRow] {
        self.rows.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn exists(&self, table: Table, id: Uuid) -> bool {
        self.table(table).iter().any(|row| row.id == id)
    }

    fn panel_mut(&mut self, id: Uuid) -> Option<&mut NewPanel> {
        self.rows
            .get_mut(&Table::Panels)?
            .iter_mut()
            .find(|row| row.id == id)
            .and_then(|row| match &mut row.record {
                NewRecord::Panel(panel) => Some(panel),
                _ => None,
            })
    }

    fn require(&self, table: Table, column: &'static str, id: Uuid, target: Table) -> RepositoryResult<()> {
        if self.exists(target, id) {
            Ok(())
        } else {
            Err(RepositoryError::ForeignKey { table, column, id })
        }
    }

    /// Foreign keys and check constraints for a row about to be written
    fn check(&self, record: &NewRecord) -> RepositoryResult<()> {
        let table = record.table();
        let require =
            |column: &'static str, id: Uuid, target: Table| self.require(table, column, id, target);

        match record {
            NewRecord::Panel(panel) => {
                check_panel(panel)?;
                if let Some(source) = panel.fed_from {
                    require("fed_from", source, Table::Panels)?;
                }
                if let Some(stack) = panel.meter_stack_id {
                    require("meter_stack_id", stack, Table::MeterStacks)?;
                }
            }
            NewRecord::MeterStack(_) => {}
            NewRecord::Meter(meter) => {
                require("meter_stack_id", meter.meter_stack_id, Table::MeterStacks)?;
                require("panel_id", meter.panel_id, Table::Panels)?;
            }
            NewRecord::Circuit(circuit) => {
                require("panel_id", circuit.panel_id, Table::Panels)?;
            }
            NewRecord::Feeder(feeder) => {
                require("source_panel_id", feeder.source_panel_id, Table::Panels)?;
                require("destination_panel_id", feeder.destination_panel_id, Table::Panels)?;
            }
        }
        Ok(())
    }

    fn take_quota(&mut self, table: Table, rows: usize) -> RepositoryResult<()> {
        self.requests += 1;
        let inserted = self.inserted.get(&table).copied().unwrap_or(0);
        if let Some(failure) = self.failure.filter(|f| f.table == table) {
            if inserted + rows > failure.allow {
                return Err(RepositoryError::Backend(format!(
                    "injected failure writing {}",
                    table
                )));
            }
        }
        *self.inserted.entry(table).or_default() += rows;
        Ok(())
    }

    /// First surviving row that still points at one of `ids`
    fn first_reference(&self, table: Table, ids: &HashSet<Uuid>) -> Option<(Uuid, Table)> {
        let referencing: Vec<(Table, Vec<Uuid>)> = [
            Table::Panels,
            Table::Meters,
            Table::Circuits,
            Table::Feeders,
        ]
        .into_iter()
        .map(|t| {
            let refs = self
                .table(t)
                .iter()
                .filter(|row| !(t == table && ids.contains(&row.id)))
                .flat_map(|row| restricting_refs(&row.record, table))
                .collect();
            (t, refs)
        })
        .collect();

        referencing.into_iter().find_map(|(t, refs)| {
            refs.into_iter().find(|id| ids.contains(id)).map(|id| (id, t))
        })
    }
}

fn check_panel(panel: &NewPanel) -> RepositoryResult<()> {
    let violation = match panel.fed_from_type {
        FedFromType::Service if panel.fed_from.is_some() => {
            Some("fed_from must be empty when fed from the service")
        }
        FedFromType::Panel if panel.fed_from.is_none() => {
            Some("fed_from is required when fed from a panel")
        }
        FedFromType::MeterStack if panel.meter_stack_id.is_none() => {
            Some("meter_stack_id is required when fed from a meter stack")
        }
        _ => None,
    };
    match violation {
        Some(message) => Err(RepositoryError::CheckViolation {
            table: Table::Panels,
            message: message.to_string(),
        }),
        None => Ok(()),
    }
}

/// Panels linked to a doomed meter stack, with the link nulled (ON DELETE SET NULL).
///
/// A panel fed from the stack falls back to its feeding panel, or the service
/// when it has none, so the row still satisfies `check_panel`. Nothing is
/// returned unless every rewritten row passes.
fn detach_meter_stacks(
    panels: &[StoredRow],
    doomed: &HashSet<Uuid>,
) -> RepositoryResult<HashMap<Uuid, NewPanel>> {
    let mut detached = HashMap::new();
    for row in panels {
        let NewRecord::Panel(panel) = &row.record else {
            continue;
        };
        if !panel.meter_stack_id.is_some_and(|s| doomed.contains(&s)) {
            continue;
        }
        let mut panel = panel.clone();
        panel.meter_stack_id = None;
        if panel.fed_from_type == FedFromType::MeterStack {
            panel.fed_from_type = if panel.fed_from.is_some() {
                FedFromType::Panel
            } else {
                FedFromType::Service
            };
        }
        check_panel(&panel)?;
        detached.insert(row.id, panel);
    }
    Ok(detached)
}

/// Ids in `record` that block deleting rows of `target` (ON DELETE RESTRICT).
/// `panels.meter_stack_id` is ON DELETE SET NULL and never blocks.
fn restricting_refs(record: &NewRecord, target: Table) -> Vec<Uuid> {
    match (record, target) {
        (NewRecord::Panel(p), Table::Panels) => p.fed_from.into_iter().collect(),
        (NewRecord::Meter(m), Table::Panels) => vec![m.panel_id],
        (NewRecord::Meter(m), Table::MeterStacks) => vec![m.meter_stack_id],
        (NewRecord::Circuit(c), Table::Panels) => vec![c.panel_id],
        (NewRecord::Feeder(f), Table::Panels) => vec![f.source_panel_id, f.destination_panel_id],
        _ => Vec::new(),
    }
}

/// In-process store enforcing the same keys and constraints as the database
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inserts into `table` fail once `allow` rows have been written
    pub fn fail_after(&self, table: Table, allow: usize) {
        self.state.write().failure = Some(InjectedFailure { table, allow });
    }

    pub fn clear_failure(&self) {
        self.state.write().failure = None;
    }

    /// Insert and insert-batch calls received so far
    pub fn request_count(&self) -> usize {
        self.state.read().requests
    }

    pub fn rows(&self, table: Table) -> Vec<(Uuid, NewRecord)> {
        self.state
            .read()
            .table(table)
            .iter()
            .map(|row| (row.id, row.record.clone()))
            .collect()
    }

    pub fn panel(&self, id: Uuid) -> Option<NewPanel> {
        self.state
            .read()
            .table(Table::Panels)
            .iter()
            .find(|row| row.id == id)
            .and_then(|row| match &row.record {
                NewRecord::Panel(panel) => Some(panel.clone()),
                _ => None,
            })
    }
}

#[async_trait]
impl ElectricalRepository for MemoryRepository {
    async fn insert(&self, record: NewRecord) -> RepositoryResult<Uuid> {
        let mut ids = self.insert_batch(vec![record]).await?;
        ids.pop()
            .ok_or_else(|| RepositoryError::Backend("insert returned no id".to_string()))
    }

    async fn insert_batch(&self, records: Vec<NewRecord>) -> RepositoryResult<Vec<Uuid>> {
        let Some(table) = batch_table(&records)? else {
            return Ok(Vec::new());
        };

        let mut state = self.state.write();
        for record in &records {
            state.check(record)?;
        }
        state.take_quota(table, records.len())?;

        let rows = state.rows.entry(table).or_default();
        let ids: Vec<Uuid> = records
            .into_iter()
            .map(|record| {
                let id = Uuid::new_v4();
                rows.push(StoredRow { id, record });
                id
            })
            .collect();
        debug!(%table, count = ids.len(), "inserted rows");
        Ok(ids)
    }

    async fn update(&self, table: Table, id: Uuid, patch: RecordPatch) -> RepositoryResult<()> {
        if table != Table::Panels {
            return Err(RepositoryError::UnsupportedUpdate { table });
        }
        let mut state = self.state.write();
        let mut updated = state
            .panel_mut(id)
            .cloned()
            .ok_or(RepositoryError::NotFound { table, id })?;

        if let Some(fed_from) = patch.fed_from {
            updated.fed_from = Some(fed_from);
        }
        if let Some(kind) = patch.fed_from_type {
            updated.fed_from_type = kind;
        }
        if let Some(stack) = patch.meter_stack_id {
            updated.meter_stack_id = Some(stack);
        }
        state.check(&NewRecord::Panel(updated.clone()))?;

        if let Some(panel) = state.panel_mut(id) {
            *panel = updated;
        }
        Ok(())
    }

    async fn delete(&self, table: Table, filter: DeleteFilter) -> RepositoryResult<u64> {
        let mut state = self.state.write();
        let doomed: HashSet<Uuid> = state
            .table(table)
            .iter()
            .filter(|row| match &filter {
                DeleteFilter::Project(project) => row.record.project_id() == *project,
                DeleteFilter::Ids(ids) => ids.contains(&row.id),
            })
            .map(|row| row.id)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        if let Some((id, referenced_by)) = state.first_reference(table, &doomed) {
            return Err(RepositoryError::StillReferenced {
                table,
                id,
                referenced_by,
            });
        }

        if table == Table::MeterStacks {
            let detached = detach_meter_stacks(state.table(Table::Panels), &doomed)?;
            if let Some(panels) = state.rows.get_mut(&Table::Panels) {
                for row in panels.iter_mut() {
                    if let Some(panel) = detached.get(&row.id) {
                        row.record = NewRecord::Panel(panel.clone());
                    }
                }
            }
        }

        let rows = state.rows.entry(table).or_default();
        rows.retain(|row| !doomed.contains(&row.id));
        debug!(%table, count = doomed.len(), "deleted rows");
        Ok(doomed.len() as u64)
    }

    async fn count(&self, table: Table, project_id: Uuid) -> RepositoryResult<u64> {
        let state = self.state.read();
        Ok(state
            .table(table)
            .iter()
            .filter(|row| row.record.project_id() == project_id)
            .count() as u64)
    }
}
