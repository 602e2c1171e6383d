// Archivo: store.rs
// Propósito: estado de almacenamiento compartido por los repositorios que
// mantienen todo en memoria (el stub in-memory y el repositorio en archivo
// JSON). Centraliza el control de versión y la escritura atómica
// item + registro.
use crate::errors::{FlowError, Result};
use crate::repository::PersistResult;
use prod_domain::{OrderItem, TransitionRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Items indexados por id y el historial completo en orden de inserción.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub items: BTreeMap<Uuid, OrderItem>,
    pub records: Vec<TransitionRecord>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_item(&self, id: &Uuid) -> Result<OrderItem> {
        self.items
            .get(id)
            .cloned()
            .ok_or(FlowError::NotFound(format!("item {}", id)))
    }

    pub fn insert_item(&mut self, item: &OrderItem) -> Result<()> {
        if self.items.contains_key(&item.id) {
            return Err(FlowError::Validation(format!("el item {} ya existe", item.id)));
        }
        let mut stored = item.clone();
        stored.version = 0;
        self.items.insert(item.id, stored);
        Ok(())
    }

    /// Comprueba la versión y sustituye el item. No toca el historial.
    pub fn save_item(&mut self, item: &OrderItem, expected_version: i64) -> Result<PersistResult> {
        let current = self.items
                          .get_mut(&item.id)
                          .ok_or(FlowError::NotFound(format!("item {}", item.id)))?;
        // Optimistic concurrency: check expected_version
        if current.version != expected_version {
            return Ok(PersistResult::Conflict);
        }
        let new_version = expected_version.saturating_add(1);
        let mut stored = item.clone();
        stored.version = new_version;
        *current = stored;
        Ok(PersistResult::Ok { new_version })
    }

    /// Variante atómica: si la versión coincide se guardan item y registro;
    /// si no, no se modifica nada.
    pub fn commit_transition(&mut self,
                             item: &OrderItem,
                             expected_version: i64,
                             record: &TransitionRecord)
                             -> Result<PersistResult> {
        if record.item_id != item.id {
            return Err(FlowError::Validation(format!("el registro {} no pertenece al item {}", record.id, item.id)));
        }
        if self.records.iter().any(|r| r.id == record.id) {
            return Err(FlowError::Validation(format!("el registro {} ya existe", record.id)));
        }
        match self.save_item(item, expected_version)? {
            PersistResult::Ok { new_version } => {
                self.records.push(record.clone());
                Ok(PersistResult::Ok { new_version })
            }
            PersistResult::Conflict => Ok(PersistResult::Conflict),
        }
    }

    pub fn records_for(&self, item_id: &Uuid) -> Vec<TransitionRecord> {
        self.records.iter().filter(|r| &r.item_id == item_id).cloned().collect()
    }

    pub fn records_for_station(&self, station_id: &str) -> Vec<TransitionRecord> {
        self.records
            .iter()
            .filter(|r| r.station_id == station_id)
            .cloned()
            .collect()
    }

    pub fn items_at_stage(&self, workflow_id: &str, stage: &str) -> Vec<OrderItem> {
        self.items
            .values()
            .filter(|i| i.workflow_id == workflow_id && i.quantity_at(stage) > 0)
            .cloned()
            .collect()
    }

    pub fn items_at_station(&self, stage: &str) -> Vec<OrderItem> {
        self.items
            .values()
            .filter(|i| i.quantity_at(stage) > 0)
            .cloned()
            .collect()
    }

    pub fn list_items(&self) -> Vec<OrderItem> {
        self.items.values().cloned().collect()
    }
}
