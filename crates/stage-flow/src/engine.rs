// Archivo: engine.rs
// Propósito: implementar `TransitionEngine`, que valida y aplica una única
// transición (advance / reject / hold / resume) sobre un item y la persiste
// junto con su registro de auditoría.
//
// Nota sobre concurrencia:
// - Las transiciones sobre un mismo item se serializan con un mutex por item
//   dentro del proceso y con `expected_version` en el repositorio.
// - Un `PersistResult::Conflict` se reintenta `conflict_retries` veces
//   recargando y revalidando antes de devolver `VersionConflict`.
// - La capacidad de la etapa destino se lee sin bloqueo global; con la
//   política `Soft` se trata como límite orientativo.
use crate::catalog::{NextStage, StageCatalog};
use crate::clock::{Clock, Operator};
use crate::errors::{FlowError, Result};
use crate::ledger::record_digest;
use crate::repository::{ItemRepository, PersistResult};
use dashmap::DashMap;
use log::{debug, info, warn};
use prod_domain::{ItemStatus, OrderItem, StageDefinition, TransitionAction, TransitionRecord, Workflow};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Qué hacer cuando un avance superaría la capacidad de la etapa destino.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityPolicy {
    /// Registrar un `warn!` y permitir la sobrecarga.
    #[default]
    Soft,
    /// Rechazar con `CapacityExceeded`.
    Hard,
}

impl FromStr for CapacityPolicy {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "soft" | "blanda" => Ok(CapacityPolicy::Soft),
            "hard" | "dura" => Ok(CapacityPolicy::Hard),
            other => Err(FlowError::Validation(format!("política de capacidad desconocida: {}", other))),
        }
    }
}

/// Configuración del motor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEngineConfig {
    pub capacity_policy: CapacityPolicy,
    /// Si es `true`, el operador debe tener el `required_role` de la etapa
    /// de origen.
    pub enforce_roles: bool,
    /// Reintentos internos ante `PersistResult::Conflict`.
    pub conflict_retries: u32,
}

impl Default for TransitionEngineConfig {
    fn default() -> Self {
        Self { capacity_policy: CapacityPolicy::Soft,
               enforce_roles: false,
               conflict_retries: 1 }
    }
}

/// Petición de transición emitida desde una estación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub item_id: Uuid,
    pub action: TransitionAction,
    pub quantity: u32,
    pub notes: String,
    pub station_id: String,
    /// Etapa sobre la que actúa la estación. `None` toma la etapa más
    /// temprana con cantidad.
    #[serde(default)]
    pub stage: Option<String>,
    pub operator: Operator,
}

impl TransitionRequest {
    pub fn new(item_id: Uuid,
               action: TransitionAction,
               quantity: u32,
               notes: &str,
               station_id: &str,
               operator: Operator)
               -> Self {
        Self { item_id,
               action,
               quantity,
               notes: notes.to_string(),
               station_id: station_id.to_string(),
               stage: None,
               operator }
    }

    pub fn at_stage(mut self, stage: &str) -> Self {
        self.stage = Some(stage.to_string());
        self
    }
}

/// Estado resultante de una transición validada, todavía sin persistir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransition {
    pub item: OrderItem,
    pub record: TransitionRecord,
}

/// Motor de transiciones.
pub struct TransitionEngine<R>
    where R: ItemRepository + ?Sized
{
    repo: Arc<R>,
    catalog: Arc<StageCatalog>,
    clock: Arc<dyn Clock>,
    config: TransitionEngineConfig,
    /// Un mutex por item para serializar read-modify-write locales.
    item_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<R> TransitionEngine<R> where R: ItemRepository + ?Sized
{
    pub fn new(repo: Arc<R>, catalog: Arc<StageCatalog>, clock: Arc<dyn Clock>, config: TransitionEngineConfig) -> Self {
        Self { repo,
               catalog,
               clock,
               config,
               item_locks: DashMap::new() }
    }

    pub fn config(&self) -> &TransitionEngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Items con un mutex de serialización vivo. Se libera al llegar a un
    /// estado terminal.
    pub fn tracked_items(&self) -> usize {
        self.item_locks.len()
    }

    /// Valida y aplica la transición. Persiste item y registro de forma
    /// atómica y devuelve el registro escrito.
    pub fn apply_transition(&self, request: &TransitionRequest) -> Result<TransitionRecord> {
        let lock = self.item_locks.entry(request.item_id).or_default().value().clone();
        let guard = lock.lock()
                        .map_err(|e| FlowError::Storage(format!("mutex poisoned: {:?}", e)))?;
        let outcome = self.commit_with_retry(request);
        drop(guard);

        // un item terminal o inexistente no vuelve a necesitar su mutex
        let finished = match &outcome {
            Ok((_, item)) => item.is_terminal(),
            Err(FlowError::ItemTerminal { .. }) => true,
            Err(FlowError::NotFound(_)) => self.repo.load_item(&request.item_id).is_err(),
            Err(_) => false,
        };
        if finished {
            self.item_locks.remove(&request.item_id);
        }
        outcome.map(|(record, _)| record)
    }

    fn commit_with_retry(&self, request: &TransitionRequest) -> Result<(TransitionRecord, OrderItem)> {
        let mut retries = 0;
        loop {
            let current = self.repo.load_item(&request.item_id)?;
            let planned = self.plan(&current, request)?;
            match self.repo.commit_transition(&planned.item, current.version, &planned.record)? {
                PersistResult::Ok { new_version } => {
                    let rec = &planned.record;
                    info!("item {} #{} {} x{} {} → {} por {} en {} (v{})",
                          rec.item_id,
                          rec.sequence,
                          rec.action,
                          rec.quantity,
                          rec.from_stage,
                          rec.to_stage.as_deref().unwrap_or("-"),
                          rec.operator_id,
                          rec.station_id,
                          new_version);
                    return Ok((planned.record, planned.item));
                }
                PersistResult::Conflict => {
                    if retries >= self.config.conflict_retries {
                        return Err(FlowError::VersionConflict { item_id: request.item_id,
                                                                expected: current.version });
                    }
                    retries += 1;
                    warn!("conflicto de versión en {} (v{}), reintento {}", request.item_id, current.version, retries);
                }
            }
        }
    }

    /// Ejecuta todas las validaciones sin persistir nada.
    pub fn validate(&self, request: &TransitionRequest) -> Result<PlannedTransition> {
        let current = self.repo.load_item(&request.item_id)?;
        self.plan(&current, request)
    }

    /// Calcula el nuevo estado del item y su registro. Las precondiciones se
    /// evalúan en orden: terminal, cantidad, notas, rol y reglas propias de
    /// cada acción.
    fn plan(&self, item: &OrderItem, request: &TransitionRequest) -> Result<PlannedTransition> {
        let workflow = self.catalog.get_workflow(&item.workflow_id)?;

        if item.is_terminal() {
            return Err(FlowError::ItemTerminal { item_id: item.id, status: item.status });
        }

        let source = self.source_stage(workflow, item, request)?;

        let available = item.quantity_at(&source.name);
        if request.quantity == 0 || request.quantity > available {
            return Err(FlowError::InsufficientQuantity { stage: source.name.clone(),
                                                         requested: request.quantity,
                                                         available });
        }

        if request.notes.trim().is_empty() {
            return Err(FlowError::MissingAuditTrail);
        }

        if self.config.enforce_roles {
            if let Some(role) = &source.required_role {
                if !request.operator.has_role(role) {
                    return Err(FlowError::RoleMismatch { stage: source.name.clone(), required: role.clone() });
                }
            }
        }

        let mut next = item.clone();
        let to_stage = match request.action {
            TransitionAction::Advance => {
                self.require_not_held(item, request.action)?;
                let dest = match self.catalog.next_stage(workflow.id(), &source.name)? {
                    NextStage::Stage(dest) => dest,
                    NextStage::Terminal => return Err(FlowError::NoNextStage { stage: source.name.clone() }),
                };
                self.check_capacity(workflow, dest, request.quantity)?;
                next.take(&source.name, request.quantity)?;
                next.put(&dest.name, request.quantity);
                next.status = if next.all_at_final_stage(workflow) {
                    ItemStatus::Completed
                } else {
                    ItemStatus::InProgress
                };
                Some(dest.name.clone())
            }
            TransitionAction::Reject => {
                self.require_not_held(item, request.action)?;
                next.take(&source.name, request.quantity)?;
                next.rejected_quantity += request.quantity;
                if next.active_quantity() == 0 {
                    next.status = ItemStatus::Rejected;
                } else if next.all_at_final_stage(workflow) {
                    next.status = ItemStatus::Completed;
                }
                None
            }
            TransitionAction::Hold => {
                if item.status != ItemStatus::InProgress {
                    return Err(FlowError::IllegalStatusTransition { status: item.status, action: request.action });
                }
                next.status = ItemStatus::OnHold;
                None
            }
            TransitionAction::Resume => {
                if item.status != ItemStatus::OnHold {
                    return Err(FlowError::IllegalStatusTransition { status: item.status, action: request.action });
                }
                next.status = ItemStatus::InProgress;
                None
            }
        };
        next.check_invariants(workflow)?;

        let history = self.repo.query_records(&item.id)?;
        let (sequence, prev_digest) = match history.iter().max_by_key(|r| r.sequence) {
            Some(last) => (last.sequence + 1, last.digest.clone()),
            None => (1, String::new()),
        };

        // el historial debe quedar ordenado también por tiempo
        let timestamp = std::cmp::max(self.clock.now(), item.updated_at);
        next.updated_at = timestamp;
        next.version = item.version + 1;

        let mut record = TransitionRecord { id: Uuid::new_v4(),
                                            item_id: item.id,
                                            sequence,
                                            from_stage: source.name.clone(),
                                            to_stage,
                                            action: request.action,
                                            quantity: request.quantity,
                                            timestamp,
                                            operator_id: request.operator.id.clone(),
                                            notes: request.notes.trim().to_string(),
                                            station_id: request.station_id.clone(),
                                            prev_digest,
                                            digest: String::new() };
        record.digest = record_digest(&record);
        debug!("transición validada para {}: {:?} → {:?}", item.id, item.status, next.status);

        Ok(PlannedTransition { item: next, record })
    }

    fn source_stage<'w>(&self,
                        workflow: &'w Workflow,
                        item: &OrderItem,
                        request: &TransitionRequest)
                        -> Result<&'w StageDefinition> {
        let name = match &request.stage {
            Some(name) => name.as_str(),
            None => match item.current_stage(workflow) {
                Some(name) => name,
                None => {
                    return Err(FlowError::InsufficientQuantity { stage: "-".to_string(),
                                                                 requested: request.quantity,
                                                                 available: 0 })
                }
            },
        };
        workflow.stage(name)
                .ok_or_else(|| FlowError::NotFound(format!("etapa '{}' en workflow {}", name, workflow.id())))
    }

    fn require_not_held(&self, item: &OrderItem, action: TransitionAction) -> Result<()> {
        if item.status == ItemStatus::OnHold {
            return Err(FlowError::IllegalStatusTransition { status: item.status, action });
        }
        Ok(())
    }

    /// Suma la cantidad presente en `dest` en todos los items no completados
    /// (de cualquier workflow) y la compara con la capacidad declarada.
    fn check_capacity(&self, workflow: &Workflow, dest: &StageDefinition, quantity: u32) -> Result<()> {
        let capacity = match dest.capacity {
            Some(c) => c,
            None => return Ok(()),
        };
        let occupancy = self.occupancy(&dest.name)?;
        if occupancy.saturating_add(quantity) <= capacity {
            return Ok(());
        }
        match self.config.capacity_policy {
            CapacityPolicy::Hard => Err(FlowError::CapacityExceeded { stage: dest.name.clone(),
                                                                      capacity,
                                                                      occupancy,
                                                                      requested: quantity }),
            CapacityPolicy::Soft => {
                warn!("sobrecarga en '{}' ({}): ocupación {} + {} > capacidad {}",
                      dest.name,
                      workflow.id(),
                      occupancy,
                      quantity,
                      capacity);
                Ok(())
            }
        }
    }

    /// Cantidad total en la estación `stage` sobre los items activos de
    /// todos los workflows.
    pub fn occupancy(&self, stage: &str) -> Result<u32> {
        Ok(self.repo
               .query_items_at_station(stage)?
               .iter()
               .filter(|i| i.status != ItemStatus::Completed)
               .map(|i| i.quantity_at(stage))
               .sum())
    }
}
