// Archivo: queue.rs
// Propósito: proyecciones de sólo lectura por estación: la cola de trabajo de
// una etapa y la carga/cuellos de botella del pipeline. No mantiene estado
// propio; todo se deriva de los items del repositorio.
use crate::catalog::StageCatalog;
use crate::errors::Result;
use crate::repository::ItemRepository;
use prod_domain::{ItemStatus, OrderItem};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;

/// Umbral (porcentaje de capacidad) a partir del cual una etapa se marca en
/// advertencia.
pub const WARNING_UTILIZATION: u32 = 75;
/// Umbral a partir del cual una etapa se considera crítica.
pub const CRITICAL_UTILIZATION: u32 = 90;

/// Un item en la cola de una estación con la cantidad que tiene en ella.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub item: OrderItem,
    pub quantity_at_stage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadLevel {
    Normal,
    Warning,
    Critical,
}

/// Carga actual de una etapa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationLoad {
    pub stage: String,
    pub order: u32,
    pub quantity: u32,
    pub items: usize,
    pub capacity: Option<u32>,
    /// Porcentaje de la capacidad ocupado (puede superar 100).
    pub utilization: Option<u32>,
    pub level: LoadLevel,
}

pub struct QueueProjector<R>
    where R: ItemRepository + ?Sized
{
    repo: Arc<R>,
    catalog: Arc<StageCatalog>,
}

impl<R> QueueProjector<R> where R: ItemRepository + ?Sized
{
    pub fn new(repo: Arc<R>, catalog: Arc<StageCatalog>) -> Self {
        Self { repo, catalog }
    }

    /// Cola de la etapa: prioridad descendente, fecha de entrega ascendente
    /// y, a igualdad, id del item. Los items completados no aparecen.
    pub fn queue_for_stage(&self, workflow_id: &str, stage_name: &str) -> Result<Vec<QueueEntry>> {
        self.catalog.stage(workflow_id, stage_name)?;
        let mut entries: Vec<QueueEntry> = self.repo
                                               .query_items_at_stage(workflow_id, stage_name)?
                                               .into_iter()
                                               .filter(|i| i.status != ItemStatus::Completed)
                                               .map(|item| {
                                                   let quantity_at_stage = item.quantity_at(stage_name);
                                                   QueueEntry { item, quantity_at_stage }
                                               })
                                               .filter(|e| e.quantity_at_stage > 0)
                                               .collect();
        entries.sort_by_key(|e| (Reverse(e.item.priority), e.item.due_date, e.item.id));
        Ok(entries)
    }

    /// Carga de cada etapa del workflow, en orden de pipeline. La ocupación
    /// de una estación incluye los items de todos los workflows que pasan
    /// por ella, igual que el control de capacidad del motor.
    pub fn station_load(&self, workflow_id: &str) -> Result<Vec<StationLoad>> {
        let workflow = self.catalog.get_workflow(workflow_id)?;
        let mut out = Vec::with_capacity(workflow.len());
        for stage in workflow.stages() {
            let active: Vec<OrderItem> = self.repo
                                             .query_items_at_station(&stage.name)?
                                             .into_iter()
                                             .filter(|i| i.status != ItemStatus::Completed)
                                             .collect();
            let quantity: u32 = active.iter().map(|i| i.quantity_at(&stage.name)).sum();
            let utilization = stage.capacity.map(|cap| quantity.saturating_mul(100) / cap);
            let level = match utilization {
                Some(u) if u > CRITICAL_UTILIZATION => LoadLevel::Critical,
                Some(u) if u > WARNING_UTILIZATION => LoadLevel::Warning,
                _ => LoadLevel::Normal,
            };
            out.push(StationLoad { stage: stage.name.clone(),
                                   order: stage.order,
                                   quantity,
                                   items: active.len(),
                                   capacity: stage.capacity,
                                   utilization,
                                   level });
        }
        Ok(out)
    }

    /// Etapas en advertencia o críticas, la más cargada primero.
    pub fn bottlenecks(&self, workflow_id: &str) -> Result<Vec<StationLoad>> {
        let mut loads: Vec<StationLoad> = self.station_load(workflow_id)?
                                              .into_iter()
                                              .filter(|l| l.level != LoadLevel::Normal)
                                              .collect();
        loads.sort_by_key(|l| (Reverse(l.level), Reverse(l.utilization), l.order));
        Ok(loads)
    }
}
