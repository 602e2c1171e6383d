// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// `InMemoryItemRepository` no es durable; se usa en demos y pruebas locales.
use crate::errors::{FlowError, Result};
use crate::repository::{ItemRepository, PersistResult};
use crate::store::StoreState;
use prod_domain::{OrderItem, TransitionRecord};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

// Minimal in-memory repository for wiring examples (not durable)
pub struct InMemoryItemRepository {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryItemRepository {
    /// Crea una nueva instancia del repositorio en memoria.
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(StoreState::new())) }
    }

    /// Crea el repositorio a partir de un estado previo (por ejemplo un
    /// volcado cargado desde disco).
    pub fn from_state(state: StoreState) -> Self {
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Copia del estado completo, útil para inspección en pruebas.
    pub fn snapshot(&self) -> Result<StoreState> {
        Ok(self.lock()?.clone())
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `FlowError::Storage`.
    fn lock(&self) -> std::result::Result<MutexGuard<'_, StoreState>, FlowError> {
        self.state
            .lock()
            .map_err(|e| FlowError::Storage(format!("mutex poisoned: {:?}", e)))
    }
}

impl Default for InMemoryItemRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemRepository for InMemoryItemRepository {
    fn load_item(&self, id: &Uuid) -> Result<OrderItem> {
        self.lock()?.load_item(id)
    }

    fn insert_item(&self, item: &OrderItem) -> Result<()> {
        self.lock()?.insert_item(item)
    }

    fn save_item(&self, item: &OrderItem, expected_version: i64) -> Result<PersistResult> {
        self.lock()?.save_item(item, expected_version)
    }

    /// Item y registro se escriben bajo el mismo lock.
    fn commit_transition(&self, item: &OrderItem, expected_version: i64, record: &TransitionRecord)
                         -> Result<PersistResult> {
        self.lock()?.commit_transition(item, expected_version, record)
    }

    fn query_records(&self, item_id: &Uuid) -> Result<Vec<TransitionRecord>> {
        Ok(self.lock()?.records_for(item_id))
    }

    fn query_records_for_station(&self, station_id: &str) -> Result<Vec<TransitionRecord>> {
        Ok(self.lock()?.records_for_station(station_id))
    }

    fn query_items_at_stage(&self, workflow_id: &str, stage: &str) -> Result<Vec<OrderItem>> {
        Ok(self.lock()?.items_at_stage(workflow_id, stage))
    }

    fn query_items_at_station(&self, stage: &str) -> Result<Vec<OrderItem>> {
        Ok(self.lock()?.items_at_station(stage))
    }

    fn list_items(&self) -> Result<Vec<OrderItem>> {
        Ok(self.lock()?.list_items())
    }
}
