// Archivo: service.rs
// Propósito: implementar `ProductionService`, una capa orquestadora que
// expone las operaciones de alto nivel (crear items, aplicar transiciones,
// consultar colas e historial). Es la API que consume la capa de
// aplicación/UI.
use crate::catalog::StageCatalog;
use crate::clock::Clock;
use crate::engine::{PlannedTransition, TransitionEngine, TransitionEngineConfig, TransitionRequest};
use crate::errors::{FlowError, Result};
use crate::ledger::{ActionSummary, ConsistencyReport, HistoryLedger};
use crate::queue::{QueueEntry, QueueProjector, StationLoad};
use crate::repository::{ItemRepository, PersistResult};
use chrono::NaiveDate;
use indexmap::IndexMap;
use log::info;
use prod_domain::{OrderItem, Priority, TransitionRecord};
use std::sync::Arc;
use uuid::Uuid;

/// Servicio de alto nivel sobre items de producción.
///
/// Construye internamente el motor, el ledger y el proyector de colas sobre
/// el mismo repositorio y catálogo.
pub struct ProductionService<R>
    where R: ItemRepository + ?Sized
{
    repo: Arc<R>,
    catalog: Arc<StageCatalog>,
    clock: Arc<dyn Clock>,
    engine: TransitionEngine<R>,
    ledger: HistoryLedger<R>,
    projector: QueueProjector<R>,
}

impl<R> ProductionService<R> where R: ItemRepository + ?Sized
{
    pub fn new(repo: Arc<R>, catalog: Arc<StageCatalog>, clock: Arc<dyn Clock>, config: TransitionEngineConfig) -> Self {
        let engine = TransitionEngine::new(repo.clone(), catalog.clone(), clock.clone(), config);
        let ledger = HistoryLedger::new(repo.clone(), catalog.clone());
        let projector = QueueProjector::new(repo.clone(), catalog.clone());
        Self { repo,
               catalog,
               clock,
               engine,
               ledger,
               projector }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn engine(&self) -> &TransitionEngine<R> {
        &self.engine
    }

    pub fn ledger(&self) -> &HistoryLedger<R> {
        &self.ledger
    }

    pub fn projector(&self) -> &QueueProjector<R> {
        &self.projector
    }

    /// Crea un item al confirmarse un pedido: toda la cantidad en la primera
    /// etapa del workflow y `status=pending`.
    pub fn create_item(&self,
                       order_id: &str,
                       workflow_id: &str,
                       quantity_total: u32,
                       priority: Priority,
                       due_date: NaiveDate)
                       -> Result<OrderItem> {
        let workflow = self.catalog.get_workflow(workflow_id)?;
        let item = OrderItem::new(order_id, workflow, quantity_total, priority, due_date, self.clock.now())?;
        self.repo.insert_item(&item)?;
        info!("item {} creado para {} ({} x{})", item.id, item.order_id, workflow_id, quantity_total);
        Ok(item)
    }

    pub fn get_item(&self, item_id: &Uuid) -> Result<OrderItem> {
        self.repo.load_item(item_id)
    }

    pub fn list_items(&self) -> Result<Vec<OrderItem>> {
        self.repo.list_items()
    }

    pub fn apply_transition(&self, request: &TransitionRequest) -> Result<TransitionRecord> {
        self.engine.apply_transition(request)
    }

    pub fn validate_transition(&self, request: &TransitionRequest) -> Result<PlannedTransition> {
        self.engine.validate(request)
    }

    /// Cambia la prioridad de un item activo. No genera registro de
    /// transición.
    pub fn set_priority(&self, item_id: &Uuid, priority: Priority) -> Result<OrderItem> {
        self.update_item(item_id, |item| item.priority = priority)
    }

    /// Cambia la fecha de entrega de un item activo.
    pub fn set_due_date(&self, item_id: &Uuid, due_date: NaiveDate) -> Result<OrderItem> {
        self.update_item(item_id, |item| item.due_date = due_date)
    }

    fn update_item<F>(&self, item_id: &Uuid, apply: F) -> Result<OrderItem>
        where F: Fn(&mut OrderItem)
    {
        let mut retries = 0;
        loop {
            let current = self.repo.load_item(item_id)?;
            if current.is_terminal() {
                return Err(FlowError::ItemTerminal { item_id: current.id, status: current.status });
            }
            let mut next = current.clone();
            apply(&mut next);
            match self.repo.save_item(&next, current.version)? {
                PersistResult::Ok { new_version } => {
                    next.version = new_version;
                    return Ok(next);
                }
                PersistResult::Conflict if retries < self.engine.config().conflict_retries => retries += 1,
                PersistResult::Conflict => {
                    return Err(FlowError::VersionConflict { item_id: *item_id,
                                                            expected: current.version })
                }
            }
        }
    }

    pub fn queue_for_stage(&self, workflow_id: &str, stage: &str) -> Result<Vec<QueueEntry>> {
        self.projector.queue_for_stage(workflow_id, stage)
    }

    pub fn station_load(&self, workflow_id: &str) -> Result<Vec<StationLoad>> {
        self.projector.station_load(workflow_id)
    }

    pub fn bottlenecks(&self, workflow_id: &str) -> Result<Vec<StationLoad>> {
        self.projector.bottlenecks(workflow_id)
    }

    pub fn history(&self, item_id: &Uuid) -> Result<Vec<TransitionRecord>> {
        self.ledger.records_for(item_id)
    }

    pub fn station_history(&self, station_id: &str) -> Result<Vec<TransitionRecord>> {
        self.ledger.records_for_station(station_id)
    }

    pub fn replay(&self, item_id: &Uuid) -> Result<IndexMap<String, u32>> {
        self.ledger.replay(item_id)
    }

    pub fn check_consistency(&self, item_id: &Uuid) -> Result<ConsistencyReport> {
        self.ledger.check_consistency(item_id)
    }

    pub fn summary_counts(&self, item_id: &Uuid) -> Result<ActionSummary> {
        self.ledger.summary_counts(item_id)
    }

    pub fn verify_chain(&self, item_id: &Uuid) -> Result<()> {
        self.ledger.verify_chain(item_id)
    }
}
