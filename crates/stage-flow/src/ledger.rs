// Archivo: ledger.rs
// Propósito: lectura del historial append-only de transiciones. Permite
// reconstruir la línea de tiempo de un item, rehacer su reparto de cantidades
// por replay (chequeo de consistencia) y verificar la cadena de digests.
use crate::catalog::StageCatalog;
use crate::errors::{FlowError, Result};
use crate::repository::ItemRepository;
use indexmap::IndexMap;
use log::{debug, error};
use prod_domain::{OrderItem, TransitionAction, TransitionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const FIELD_SEP: &[u8] = b"\x1f";

/// Digest blake3 de un registro, encadenado con `prev_digest`.
pub fn record_digest(record: &TransitionRecord) -> String {
    let mut hasher = blake3::Hasher::new();
    let sequence = record.sequence.to_string();
    let quantity = record.quantity.to_string();
    let timestamp = record.timestamp.to_rfc3339();
    let fields: [&[u8]; 12] = [record.prev_digest.as_bytes(),
                               record.id.as_bytes(),
                               record.item_id.as_bytes(),
                               sequence.as_bytes(),
                               record.from_stage.as_bytes(),
                               record.to_stage.as_deref().unwrap_or("").as_bytes(),
                               record.action.as_str().as_bytes(),
                               quantity.as_bytes(),
                               timestamp.as_bytes(),
                               record.operator_id.as_bytes(),
                               record.notes.as_bytes(),
                               record.station_id.as_bytes()];
    for f in fields {
        hasher.update(f);
        hasher.update(FIELD_SEP);
    }
    hasher.finalize().to_hex().to_string()
}

/// Conteo de registros por tipo de acción.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub advanced: usize,
    pub rejected: usize,
    pub held: usize,
    pub resumed: usize,
}

/// Resultado de comparar el estado almacenado con el reconstruido.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub item_id: Uuid,
    pub stored: IndexMap<String, u32>,
    pub replayed: IndexMap<String, u32>,
    pub stored_rejected: u32,
    pub replayed_rejected: u32,
    pub consistent: bool,
}

/// Estado reconstruido por replay.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Replayed {
    quantity_by_stage: IndexMap<String, u32>,
    rejected: u32,
}

/// Vista de sólo lectura sobre el historial almacenado en el repositorio.
pub struct HistoryLedger<R>
    where R: ItemRepository + ?Sized
{
    repo: Arc<R>,
    catalog: Arc<StageCatalog>,
}

impl<R> HistoryLedger<R> where R: ItemRepository + ?Sized
{
    pub fn new(repo: Arc<R>, catalog: Arc<StageCatalog>) -> Self {
        Self { repo, catalog }
    }

    /// Registros del item, del más antiguo al más reciente.
    pub fn records_for(&self, item_id: &Uuid) -> Result<Vec<TransitionRecord>> {
        // asegura NotFound para items desconocidos
        self.repo.load_item(item_id)?;
        let mut records = self.repo.query_records(item_id)?;
        records.sort_by(|a, b| a.sequence.cmp(&b.sequence).then(a.timestamp.cmp(&b.timestamp)));
        Ok(records)
    }

    /// Historial de una estación, el más reciente primero.
    pub fn records_for_station(&self, station_id: &str) -> Result<Vec<TransitionRecord>> {
        let mut records = self.repo.query_records_for_station(station_id)?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.sequence.cmp(&a.sequence)));
        Ok(records)
    }

    /// Reconstruye `quantity_by_stage` aplicando el historial desde el
    /// estado inicial del item.
    pub fn replay(&self, item_id: &Uuid) -> Result<IndexMap<String, u32>> {
        let item = self.repo.load_item(item_id)?;
        Ok(self.replay_item(&item)?.quantity_by_stage)
    }

    fn replay_item(&self, item: &OrderItem) -> Result<Replayed> {
        let workflow = self.catalog.get_workflow(&item.workflow_id)?;
        let records = self.records_for(&item.id)?;

        let mut state = Replayed { quantity_by_stage: IndexMap::new(), rejected: 0 };
        state.quantity_by_stage
             .insert(workflow.first_stage().name.clone(), item.quantity_total);

        for (idx, rec) in records.iter().enumerate() {
            let expected_seq = idx as i64 + 1;
            if rec.sequence != expected_seq {
                return Err(FlowError::Validation(format!("historial de {} no contiguo: se esperaba #{} y llegó #{}",
                                                         item.id, expected_seq, rec.sequence)));
            }
            match rec.action {
                TransitionAction::Advance => {
                    let to = rec.to_stage
                                .as_deref()
                                .ok_or_else(|| FlowError::Validation(format!("avance #{} sin etapa destino", rec.sequence)))?;
                    take(&mut state.quantity_by_stage, &rec.from_stage, rec.quantity, rec.sequence)?;
                    *state.quantity_by_stage.entry(to.to_string()).or_insert(0) += rec.quantity;
                }
                TransitionAction::Reject => {
                    take(&mut state.quantity_by_stage, &rec.from_stage, rec.quantity, rec.sequence)?;
                    state.rejected += rec.quantity;
                }
                TransitionAction::Hold | TransitionAction::Resume => {}
            }
        }
        Ok(state)
    }

    /// Compara el estado almacenado con el reconstruido. Una divergencia
    /// indica un defecto, nunca un estado válido.
    pub fn check_consistency(&self, item_id: &Uuid) -> Result<ConsistencyReport> {
        let item = self.repo.load_item(item_id)?;
        let replayed = self.replay_item(&item)?;
        let consistent =
            replayed.quantity_by_stage == item.quantity_by_stage && replayed.rejected == item.rejected_quantity;
        if consistent {
            debug!("replay consistente para {}", item_id);
        } else {
            error!("divergencia en {}: almacenado {:?} / rechazado {}, replay {:?} / rechazado {}",
                   item_id, item.quantity_by_stage, item.rejected_quantity, replayed.quantity_by_stage, replayed.rejected);
        }
        Ok(ConsistencyReport { item_id: *item_id,
                               stored: item.quantity_by_stage,
                               replayed: replayed.quantity_by_stage,
                               stored_rejected: item.rejected_quantity,
                               replayed_rejected: replayed.rejected,
                               consistent })
    }

    pub fn summary_counts(&self, item_id: &Uuid) -> Result<ActionSummary> {
        let records = self.records_for(item_id)?;
        let mut summary = ActionSummary::default();
        for rec in records.iter() {
            match rec.action {
                TransitionAction::Advance => summary.advanced += 1,
                TransitionAction::Reject => summary.rejected += 1,
                TransitionAction::Hold => summary.held += 1,
                TransitionAction::Resume => summary.resumed += 1,
            }
        }
        Ok(summary)
    }

    /// Recalcula la cadena de digests del item. Devuelve `Validation` con la
    /// secuencia del primer eslabón roto.
    pub fn verify_chain(&self, item_id: &Uuid) -> Result<()> {
        let records = self.records_for(item_id)?;
        let mut prev = String::new();
        for rec in records.iter() {
            if rec.prev_digest != prev || record_digest(rec) != rec.digest {
                error!("cadena de auditoría rota en {} #{}", item_id, rec.sequence);
                return Err(FlowError::Validation(format!("cadena de auditoría rota en el registro #{}", rec.sequence)));
            }
            prev = rec.digest.clone();
        }
        Ok(())
    }

    /// Digest del último registro del item (vacío si no hay historial).
    pub fn head_digest(&self, item_id: &Uuid) -> Result<String> {
        Ok(self.records_for(item_id)?
               .last()
               .map(|r| r.digest.clone())
               .unwrap_or_default())
    }
}

fn take(map: &mut IndexMap<String, u32>, stage: &str, quantity: u32, sequence: i64) -> Result<()> {
    let available = map.get(stage).copied().unwrap_or(0);
    if quantity > available {
        return Err(FlowError::Validation(format!("replay #{}: {} piezas en '{}' pero sólo hay {}",
                                                 sequence, quantity, stage, available)));
    }
    if available == quantity {
        map.shift_remove(stage);
    } else {
        map.insert(stage.to_string(), available - quantity);
    }
    Ok(())
}
