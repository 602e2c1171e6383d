// Archivo: repository.rs
// Propósito: definir el trait `ItemRepository`, el contrato que deben
// implementar las persistencias (archivo JSON, in-memory, etc.).
use crate::errors::Result;
use prod_domain::{OrderItem, TransitionRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resultado de una escritura con locking optimista.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistResult {
    /// Persistido; `new_version` es la versión almacenada tras escribir.
    Ok { new_version: i64 },
    /// La versión almacenada no coincide con la esperada.
    Conflict,
}

/// Contrato mínimo de persistencia de items y su historial.
///
/// El repositorio no conoce las reglas del motor: sólo garantiza el control
/// de versión y que `commit_transition` escriba item y registro de forma
/// atómica (ambos o ninguno).
pub trait ItemRepository: Send + Sync {
    /// Carga un item por id. `NotFound` si no existe.
    fn load_item(&self, id: &Uuid) -> Result<OrderItem>;

    /// Inserta un item nuevo (versión 0). Falla con `Validation` si el id ya
    /// existe.
    fn insert_item(&self, item: &OrderItem) -> Result<()>;

    /// Guarda el item si la versión almacenada es `expected_version`. La
    /// versión persistida pasa a `expected_version + 1`.
    fn save_item(&self, item: &OrderItem, expected_version: i64) -> Result<PersistResult>;

    /// Guarda el item y añade `record` al historial en una sola operación
    /// atómica, con el mismo control de versión que `save_item`.
    fn commit_transition(&self, item: &OrderItem, expected_version: i64, record: &TransitionRecord)
                         -> Result<PersistResult>;

    /// Registros de un item, en orden de inserción.
    fn query_records(&self, item_id: &Uuid) -> Result<Vec<TransitionRecord>>;

    /// Registros emitidos por una estación, en orden de inserción.
    fn query_records_for_station(&self, station_id: &str) -> Result<Vec<TransitionRecord>>;

    /// Items del workflow con cantidad > 0 en `stage`.
    fn query_items_at_stage(&self, workflow_id: &str, stage: &str) -> Result<Vec<OrderItem>>;

    /// Items de cualquier workflow con cantidad > 0 en una etapa llamada
    /// `stage`. Una estación física la comparten todos los pipelines.
    fn query_items_at_station(&self, stage: &str) -> Result<Vec<OrderItem>>;

    /// Todos los items (útil para listados y pruebas).
    fn list_items(&self) -> Result<Vec<OrderItem>>;
}
