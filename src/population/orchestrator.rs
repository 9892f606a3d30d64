//! Six-step, dependency-ordered persistence of an [`EntityGraph`].
//!
//! Steps run strictly one after another and every batch is awaited before
//! the next is sent. A failed step stops the run; rows committed earlier stay
//! in place unless compensation is enabled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::clear::{clear_project, ClearSummary};
use super::repository::{
    DeleteFilter, ElectricalRepository, FedFromType, NewCircuit, NewFeeder, NewMeter,
    NewMeterStack, NewPanel, NewRecord, RecordPatch, RepositoryError, Table,
};
use crate::config::PopulationConfig;
use crate::generator::{EntityGraph, GraphError, PanelDescriptor, PanelKind, PanelRef};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum PopulationStep {
    #[strum(to_string = "Creating main distribution panel")]
    MainPanel,
    #[strum(to_string = "Creating meter stack")]
    MeterStack,
    #[strum(to_string = "Creating panels")]
    Panels,
    #[strum(to_string = "Creating meters")]
    Meters,
    #[strum(to_string = "Creating circuits")]
    Circuits,
    #[strum(to_string = "Creating feeders")]
    Feeders,
}

impl PopulationStep {
    pub const TOTAL: u8 = 6;

    pub fn number(&self) -> u8 {
        PopulationStep::iter()
            .position(|s| s == *self)
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PopulationProgress {
    pub step: PopulationStep,
    pub current: u8,
    pub total: u8,
}

/// Ids of everything written so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatedEntities {
    pub mdp_id: Option<Uuid>,
    pub meter_stack_id: Option<Uuid>,
    pub house_panel_id: Option<Uuid>,
    pub ev_panel_id: Option<Uuid>,
    /// Exactly the unit panels inserted, in unit order
    pub unit_panel_ids: Vec<Uuid>,
    pub meter_ids: Vec<Uuid>,
    pub circuit_ids: Vec<Uuid>,
    pub feeder_ids: Vec<Uuid>,
}

impl CreatedEntities {
    pub fn panel_count(&self) -> usize {
        [self.mdp_id, self.house_panel_id, self.ev_panel_id]
            .iter()
            .flatten()
            .count()
            + self.unit_panel_ids.len()
    }

    pub fn summary(&self) -> PopulationSummary {
        PopulationSummary {
            total_panels: self.panel_count(),
            total_circuits: self.circuit_ids.len(),
            total_meters: self.meter_ids.len(),
            total_feeders: self.feeder_ids.len(),
        }
    }

    fn sub_panel_ids(&self) -> Vec<Uuid> {
        self.unit_panel_ids
            .iter()
            .copied()
            .chain(self.ev_panel_id)
            .chain(self.house_panel_id)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub total_panels: usize,
    pub total_circuits: usize,
    pub total_meters: usize,
    pub total_feeders: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<PopulationStep>,
    pub created: CreatedEntities,
    pub summary: PopulationSummary,
    /// Committed rows were removed after the failure
    pub rolled_back: bool,
    /// Present when existing data was cleared first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<ClearSummary>,
}

/// Reasons a run is refused before anything is written
#[derive(Debug, Error)]
pub enum PopulationError {
    #[error("invalid entity graph: {0}")]
    InvalidGraph(#[from] GraphError),

    #[error("project {project_id} already has {panels} panel(s); clear it or request replacement")]
    ExistingData { project_id: Uuid, panels: u64 },

    #[error("pre-flight check failed: {0}")]
    Preflight(#[source] RepositoryError),

    #[error("{step} failed: {source}")]
    Step {
        step: PopulationStep,
        #[source]
        source: RepositoryError,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PopulateOptions {
    /// Clear the project's existing electrical data first
    pub replace_existing: bool,
}

pub struct PopulationOrchestrator<'a, R: ElectricalRepository + ?Sized> {
    repo: &'a R,
    config: PopulationConfig,
}

struct Run<'g> {
    project_id: Uuid,
    graph: &'g EntityGraph,
    created: CreatedEntities,
    panel_ids: HashMap<PanelRef, Uuid>,
}

impl<'a, R: ElectricalRepository + ?Sized> PopulationOrchestrator<'a, R> {
    pub fn new(repo: &'a R, config: PopulationConfig) -> Self {
        Self { repo, config }
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Persist `graph` for `project_id`.
    ///
    /// `Err` means the run was refused and nothing was written. Step failures
    /// come back as `Ok` with `success == false` and the manifest of rows that
    /// were committed before the failure.
    pub async fn populate(
        &self,
        project_id: Uuid,
        graph: &EntityGraph,
        options: PopulateOptions,
        mut on_progress: impl FnMut(PopulationProgress),
    ) -> Result<PopulationResult, PopulationError> {
        graph.validate_references()?;

        let existing = self
            .repo
            .count(Table::Panels, project_id)
            .await
            .map_err(PopulationError::Preflight)?;

        let mut replaced = None;
        if existing > 0 {
            if !options.replace_existing {
                return Err(PopulationError::ExistingData {
                    project_id,
                    panels: existing,
                });
            }
            info!(%project_id, existing, "clearing existing electrical data before regeneration");
            replaced = Some(
                clear_project(self.repo, project_id)
                    .await
                    .map_err(PopulationError::Preflight)?,
            );
        }

        let mut run = Run {
            project_id,
            graph,
            created: CreatedEntities::default(),
            panel_ids: HashMap::new(),
        };

        for step in PopulationStep::iter() {
            on_progress(PopulationProgress {
                step,
                current: step.number(),
                total: PopulationStep::TOTAL,
            });

            if let Err(source) = self.run_step(step, &mut run).await {
                error!(%project_id, %step, error = %source, "population step failed");
                let rolled_back = self.config.rollback_on_failure && self.compensate(&run.created).await;
                return Ok(PopulationResult {
                    success: false,
                    error: Some(PopulationError::Step { step, source }.to_string()),
                    failed_step: Some(step),
                    summary: run.created.summary(),
                    created: run.created,
                    rolled_back,
                    replaced,
                });
            }
        }

        let summary = run.created.summary();
        info!(
            %project_id,
            panels = summary.total_panels,
            circuits = summary.total_circuits,
            meters = summary.total_meters,
            "electrical entities populated"
        );

        Ok(PopulationResult {
            success: true,
            error: None,
            failed_step: None,
            created: run.created,
            summary,
            rolled_back: false,
            replaced,
        })
    }

    async fn run_step(&self, step: PopulationStep, run: &mut Run<'_>) -> Result<(), RepositoryError> {
        match step {
            PopulationStep::MainPanel => self.insert_mdp(run).await,
            PopulationStep::MeterStack => self.insert_meter_stack(run).await,
            PopulationStep::Panels => self.insert_panels(run).await,
            PopulationStep::Meters => self.insert_meters(run).await,
            PopulationStep::Circuits => self.insert_circuits(run).await,
            PopulationStep::Feeders => self.insert_feeders(run).await,
        }
    }

    async fn insert_mdp(&self, run: &mut Run<'_>) -> Result<(), RepositoryError> {
        // Fed from the service until the meter stack exists
        let record = panel_record(run.project_id, &run.graph.mdp, None, FedFromType::Service, None);
        let id = self.repo.insert(record).await?;
        run.created.mdp_id = Some(id);
        run.panel_ids.insert(PanelRef::Mdp, id);
        Ok(())
    }

    async fn insert_meter_stack(&self, run: &mut Run<'_>) -> Result<(), RepositoryError> {
        let stack = &run.graph.meter_stack;
        let record = NewRecord::MeterStack(NewMeterStack {
            project_id: run.project_id,
            name: stack.name.clone(),
            num_meters: stack.positions as i32,
            bus_rating: stack.bus_rating as i32,
            voltage: stack.voltage as i32,
            phase: stack.phase,
            location: stack.location.clone(),
        });
        let stack_id = self.repo.insert(record).await?;
        run.created.meter_stack_id = Some(stack_id);

        let mdp_id = run.resolve(PanelRef::Mdp, Table::Panels)?;
        self.repo
            .update(
                Table::Panels,
                mdp_id,
                RecordPatch {
                    fed_from_type: Some(FedFromType::MeterStack),
                    meter_stack_id: Some(stack_id),
                    ..Default::default()
                },
            )
            .await
    }

    async fn insert_panels(&self, run: &mut Run<'_>) -> Result<(), RepositoryError> {
        let mdp_id = run.resolve(PanelRef::Mdp, Table::Panels)?;
        let stack_id = run
            .created
            .meter_stack_id
            .ok_or_else(|| RepositoryError::Backend("meter stack was not created".to_string()))?;

        let graph = run.graph;
        let panels: Vec<&PanelDescriptor> = graph.sub_panels().map(|p| &p.panel).collect();
        for chunk in panels.chunks(self.batch_size()) {
            let records = chunk
                .iter()
                .map(|panel| {
                    if panel.metered {
                        panel_record(run.project_id, panel, Some(mdp_id), FedFromType::MeterStack, Some(stack_id))
                    } else {
                        panel_record(run.project_id, panel, Some(mdp_id), FedFromType::Panel, None)
                    }
                })
                .collect();
            let ids = self.repo.insert_batch(records).await?;
            for (panel, id) in chunk.iter().zip(ids) {
                run.record_panel(panel, id);
            }
        }
        Ok(())
    }

    async fn insert_meters(&self, run: &mut Run<'_>) -> Result<(), RepositoryError> {
        let stack_id = run
            .created
            .meter_stack_id
            .ok_or_else(|| RepositoryError::Backend("meter stack was not created".to_string()))?;

        let graph = run.graph;
        for chunk in graph.meters.chunks(self.batch_size()) {
            let records = chunk
                .iter()
                .map(|meter| -> Result<NewRecord, RepositoryError> {
                    Ok(NewRecord::Meter(NewMeter {
                        project_id: run.project_id,
                        meter_stack_id: stack_id,
                        panel_id: run.resolve(meter.panel, Table::Meters)?,
                        meter_number: meter.meter_number.clone(),
                        meter_type: meter.kind,
                    }))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let ids = self.repo.insert_batch(records).await?;
            run.created.meter_ids.extend(ids);
        }
        Ok(())
    }

    async fn insert_circuits(&self, run: &mut Run<'_>) -> Result<(), RepositoryError> {
        let graph = run.graph;
        for panel in graph.sub_panels() {
            let panel_id = run.resolve(panel.panel.handle, Table::Circuits)?;
            for chunk in panel.circuits.chunks(self.batch_size()) {
                let records = chunk
                    .iter()
                    .map(|c| {
                        NewRecord::Circuit(NewCircuit {
                            project_id: run.project_id,
                            panel_id,
                            circuit_number: c.circuit_number as i32,
                            description: c.description.clone(),
                            breaker_amps: c.breaker_amps as i32,
                            poles: c.poles as i16,
                            load_watts: c.load_va,
                            conductor_size: c.conductor_size.clone(),
                            load_type: c.load_type.to_string(),
                        })
                    })
                    .collect();
                let ids = self.repo.insert_batch(records).await?;
                run.created.circuit_ids.extend(ids);
            }
        }
        Ok(())
    }

    async fn insert_feeders(&self, run: &mut Run<'_>) -> Result<(), RepositoryError> {
        let records: Vec<NewRecord> = run
            .graph
            .feeders
            .iter()
            .filter_map(|feeder| {
                let (Some(source), Some(destination)) = (
                    run.panel_ids.get(&feeder.source),
                    run.panel_ids.get(&feeder.destination),
                ) else {
                    warn!(feeder = %feeder.name, "dropping feeder with unresolved panel");
                    return None;
                };
                Some(NewRecord::Feeder(NewFeeder {
                    project_id: run.project_id,
                    name: feeder.name.clone(),
                    source_panel_id: *source,
                    destination_panel_id: *destination,
                    conductor_size: feeder.conductor_size.clone(),
                    length_ft: feeder.length_ft,
                }))
            })
            .collect();

        for chunk in records.chunks(self.batch_size()) {
            let ids = self.repo.insert_batch(chunk.to_vec()).await?;
            run.created.feeder_ids.extend(ids);
        }
        Ok(())
    }

    /// Delete committed rows in reverse dependency order; true when all went
    async fn compensate(&self, created: &CreatedEntities) -> bool {
        let plan: Vec<(Table, Vec<Uuid>)> = vec![
            (Table::Feeders, created.feeder_ids.clone()),
            (Table::Circuits, created.circuit_ids.clone()),
            (Table::Meters, created.meter_ids.clone()),
            (Table::Panels, created.sub_panel_ids()),
            (Table::Panels, created.mdp_id.into_iter().collect()),
            (Table::MeterStacks, created.meter_stack_id.into_iter().collect()),
        ];

        for (table, ids) in plan.into_iter().filter(|(_, ids)| !ids.is_empty()) {
            if let Err(e) = self.repo.delete(table, DeleteFilter::Ids(ids)).await {
                error!(%table, error = %e, "rollback failed; run clear to recover");
                return false;
            }
        }
        warn!("rolled back partially populated project");
        true
    }
}

impl Run<'_> {
    fn resolve(&self, handle: PanelRef, table: Table) -> Result<Uuid, RepositoryError> {
        self.panel_ids
            .get(&handle)
            .copied()
            .ok_or_else(|| RepositoryError::CheckViolation {
                table,
                message: format!("panel '{}' has not been created", handle),
            })
    }

    fn record_panel(&mut self, panel: &PanelDescriptor, id: Uuid) {
        self.panel_ids.insert(panel.handle, id);
        match panel.kind {
            PanelKind::House => self.created.house_panel_id = Some(id),
            PanelKind::Ev => self.created.ev_panel_id = Some(id),
            PanelKind::Unit => self.created.unit_panel_ids.push(id),
            PanelKind::Mdp => self.created.mdp_id = Some(id),
        }
    }
}

fn panel_record(
    project_id: Uuid,
    panel: &PanelDescriptor,
    fed_from: Option<Uuid>,
    fed_from_type: FedFromType,
    meter_stack_id: Option<Uuid>,
) -> NewRecord {
    NewRecord::Panel(NewPanel {
        project_id,
        name: panel.name.clone(),
        panel_type: panel.kind,
        voltage: panel.voltage as i32,
        phase: panel.phase,
        bus_rating: panel.bus_rating as i32,
        main_breaker_amps: panel.main_breaker_amps as i32,
        spaces: panel.spaces as i32,
        location: panel.location.clone(),
        fed_from,
        fed_from_type,
        meter_stack_id,
        notes: panel.notes.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisOptions, ScenarioKey};
    use crate::domain::{
        BuildingProfile, ChargerLevel, EvChargerRequest, Phase, ServiceVoltage, UnitAppliances,
    };
    use crate::generator::{generate_entities, FeederDescriptor, GenerationRequest};
    use crate::population::memory::MemoryRepository;
    use crate::population::repository::MockElectricalRepository;

    fn graph(units: u32) -> EntityGraph {
        let profile = BuildingProfile::new(units, 900.0, ServiceVoltage::V208, Phase::Three, 800);
        let request = EvChargerRequest::new(20, ChargerLevel::Level2, 48.0);
        let analysis = analyze(&profile, &request, &AnalysisOptions::default()).unwrap();
        generate_entities(&GenerationRequest {
            analysis: &analysis,
            scenario: ScenarioKey::WithEvems,
            building: &profile,
            appliances: &UnitAppliances::default(),
        })
    }

    fn config() -> PopulationConfig {
        PopulationConfig::default()
    }

    #[tokio::test]
    async fn test_populate_success_and_progress() {
        let repo = MemoryRepository::new();
        let project = Uuid::new_v4();
        let graph = graph(20);
        let mut steps = Vec::new();

        let result = PopulationOrchestrator::new(&repo, config())
            .populate(project, &graph, PopulateOptions::default(), |p| steps.push(p))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0].current, 1);
        assert_eq!(steps[5].step, PopulationStep::Feeders);
        assert!(steps.iter().all(|p| p.total == 6));

        let expected = graph.summary();
        assert_eq!(result.summary.total_panels, expected.total_panels);
        assert_eq!(result.summary.total_circuits, expected.total_circuits);
        assert_eq!(result.summary.total_meters, expected.total_meters);
        assert_eq!(result.created.unit_panel_ids.len(), 20);

        let mdp = repo.panel(result.created.mdp_id.unwrap()).unwrap();
        assert_eq!(mdp.fed_from_type, FedFromType::MeterStack);
        assert_eq!(mdp.meter_stack_id, result.created.meter_stack_id);

        let unit = repo.panel(result.created.unit_panel_ids[0]).unwrap();
        assert_eq!(unit.fed_from, result.created.mdp_id);
        assert_eq!(unit.fed_from_type, FedFromType::MeterStack);
    }

    #[tokio::test]
    async fn test_panels_written_in_batches() {
        let repo = MemoryRepository::new();
        let graph = graph(20);
        PopulationOrchestrator::new(&repo, config())
            .populate(Uuid::new_v4(), &graph, PopulateOptions::default(), |_| {})
            .await
            .unwrap();
        // 22 sub-panels in batches of 10 = 3 panel requests
        let panel_rows = repo.rows(Table::Panels).len();
        assert_eq!(panel_rows, 23);
    }

    #[tokio::test]
    async fn test_partial_failure_manifest() {
        let repo = MemoryRepository::new();
        // MDP + first batch of 10 sub-panels succeed, second batch fails
        repo.fail_after(Table::Panels, 11);
        let graph = graph(20);

        let result = PopulationOrchestrator::new(&repo, config())
            .populate(Uuid::new_v4(), &graph, PopulateOptions::default(), |_| {})
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_step, Some(PopulationStep::Panels));
        assert!(result.error.as_deref().unwrap().contains("Creating panels"));
        assert!(result.created.house_panel_id.is_some());
        assert!(result.created.ev_panel_id.is_some());
        // house + EV + 8 units in the first batch
        assert_eq!(result.created.unit_panel_ids.len(), 8);
        assert!(result.created.meter_ids.is_empty());
        assert!(result.created.circuit_ids.is_empty());
        assert_eq!(repo.rows(Table::Panels).len(), 11);
        assert!(!result.rolled_back);
    }

    #[tokio::test]
    async fn test_rollback_on_failure() {
        let repo = MemoryRepository::new();
        repo.fail_after(Table::Circuits, 25);
        let graph = graph(20);
        let cfg = PopulationConfig {
            rollback_on_failure: true,
            ..config()
        };

        let result = PopulationOrchestrator::new(&repo, cfg)
            .populate(Uuid::new_v4(), &graph, PopulateOptions::default(), |_| {})
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.rolled_back);
        for table in [Table::Panels, Table::Meters, Table::Circuits, Table::MeterStacks] {
            assert!(repo.rows(table).is_empty(), "{} not rolled back", table);
        }
    }

    #[tokio::test]
    async fn test_refuses_existing_data_unless_replacing() {
        let repo = MemoryRepository::new();
        let project = Uuid::new_v4();
        let graph = graph(6);
        let orchestrator = PopulationOrchestrator::new(&repo, config());

        orchestrator
            .populate(project, &graph, PopulateOptions::default(), |_| {})
            .await
            .unwrap();

        let refused = orchestrator
            .populate(project, &graph, PopulateOptions::default(), |_| {})
            .await;
        assert!(matches!(refused, Err(PopulationError::ExistingData { panels: 9, .. })));

        let replaced = orchestrator
            .populate(project, &graph, PopulateOptions { replace_existing: true }, |_| {})
            .await
            .unwrap();
        assert!(replaced.success);
        assert_eq!(replaced.replaced.unwrap().panels, 9);
        assert_eq!(repo.rows(Table::Panels).len(), 9);
    }

    #[tokio::test]
    async fn test_unresolvable_feeders_dropped() {
        let repo = MemoryRepository::new();
        let mut graph = graph(4);
        graph.feeders = vec![
            FeederDescriptor {
                name: "F-HP".into(),
                source: PanelRef::Mdp,
                destination: PanelRef::House,
                conductor_size: "3/0 AWG".into(),
                length_ft: Some(40.0),
            },
            FeederDescriptor {
                name: "F-X".into(),
                source: PanelRef::Mdp,
                destination: PanelRef::Unit(42),
                conductor_size: "3/0 AWG".into(),
                length_ft: None,
            },
        ];

        let result = PopulationOrchestrator::new(&repo, config())
            .populate(Uuid::new_v4(), &graph, PopulateOptions::default(), |_| {})
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.created.feeder_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_graph_writes_nothing() {
        let mut mock = MockElectricalRepository::new();
        mock.expect_count().never();
        mock.expect_insert().never();
        mock.expect_insert_batch().never();

        let mut graph = graph(4);
        graph.meters[0].panel = PanelRef::Unit(77);

        let result = PopulationOrchestrator::new(&mock, config())
            .populate(Uuid::new_v4(), &graph, PopulateOptions::default(), |_| {})
            .await;
        assert!(matches!(result, Err(PopulationError::InvalidGraph(_))));
    }

    #[tokio::test]
    async fn test_stops_after_failed_step() {
        let mut mock = MockElectricalRepository::new();
        mock.expect_count().times(1).returning(|_, _| Ok(0));
        mock.expect_insert()
            .times(1)
            .returning(|_| Err(RepositoryError::Backend("connection reset".into())));
        mock.expect_insert_batch().never();
        mock.expect_update().never();

        let graph = graph(4);
        let mut steps = Vec::new();
        let result = PopulationOrchestrator::new(&mock, config())
            .populate(Uuid::new_v4(), &graph, PopulateOptions::default(), |p| steps.push(p.step))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_step, Some(PopulationStep::MainPanel));
        assert_eq!(steps, vec![PopulationStep::MainPanel]);
        assert_eq!(result.summary, PopulationSummary::default());
    }
}
