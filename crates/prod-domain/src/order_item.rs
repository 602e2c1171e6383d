// order_item.rs
use crate::{DomainError, Workflow};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Estado de una unidad de producción.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
  Pending,
  InProgress,
  Completed,
  Rejected,
  OnHold,
}

impl ItemStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ItemStatus::Pending => "pending",
      ItemStatus::InProgress => "in_progress",
      ItemStatus::Completed => "completed",
      ItemStatus::Rejected => "rejected",
      ItemStatus::OnHold => "on_hold",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, ItemStatus::Completed | ItemStatus::Rejected)
  }
}

impl fmt::Display for ItemStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Prioridad de un item. El orden derivado es `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  Medium,
  High,
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Priority::Low => "low",
      Priority::Medium => "medium",
      Priority::High => "high",
    };
    f.write_str(s)
  }
}

impl std::str::FromStr for Priority {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "low" | "baja" => Ok(Priority::Low),
      "medium" | "media" => Ok(Priority::Medium),
      "high" | "alta" => Ok(Priority::High),
      other => Err(DomainError::ValidationError(format!("Prioridad desconocida: {}", other))),
    }
  }
}

/// Una unidad de producción (línea de pedido) que recorre un workflow.
///
/// `quantity_by_stage` sólo contiene etapas con cantidad > 0, en el orden
/// en que se fueron abriendo. La suma de sus valores más `rejected_quantity`
/// es siempre `quantity_total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: String,
  pub workflow_id: String,
  pub quantity_total: u32,
  pub quantity_by_stage: IndexMap<String, u32>,
  pub rejected_quantity: u32,
  pub status: ItemStatus,
  pub priority: Priority,
  pub due_date: NaiveDate,
  /// Versión para locking optimista; la incrementa cada escritura.
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl OrderItem {
  /// Crea un item con toda la cantidad en la primera etapa del workflow y
  /// `status=pending`.
  pub fn new(order_id: &str,
             workflow: &Workflow,
             quantity_total: u32,
             priority: Priority,
             due_date: NaiveDate,
             now: DateTime<Utc>)
             -> Result<Self, DomainError> {
    if order_id.trim().is_empty() {
      return Err(DomainError::ValidationError("El pedido (order_id) no puede estar vacío".to_string()));
    }
    if quantity_total == 0 {
      return Err(DomainError::ValidationError("La cantidad total debe ser mayor que 0".to_string()));
    }
    let mut quantity_by_stage = IndexMap::new();
    quantity_by_stage.insert(workflow.first_stage().name.clone(), quantity_total);
    Ok(Self { id: Uuid::new_v4(),
              order_id: order_id.trim().to_string(),
              workflow_id: workflow.id().to_string(),
              quantity_total,
              quantity_by_stage,
              rejected_quantity: 0,
              status: ItemStatus::Pending,
              priority,
              due_date,
              version: 0,
              created_at: now,
              updated_at: now })
  }

  pub fn quantity_at(&self, stage: &str) -> u32 {
    self.quantity_by_stage.get(stage).copied().unwrap_or(0)
  }

  /// Cantidad todavía activa (no rechazada) en el pipeline.
  pub fn active_quantity(&self) -> u32 {
    self.quantity_by_stage.values().sum()
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  /// Etapa más temprana (menor `order`) que aún tiene cantidad.
  pub fn current_stage<'a>(&self, workflow: &'a Workflow) -> Option<&'a str> {
    workflow.stages()
            .iter()
            .find(|s| self.quantity_at(&s.name) > 0)
            .map(|s| s.name.as_str())
  }

  /// Mayor `order` alcanzado por alguna parte del lote.
  pub fn furthest_stage_order(&self, workflow: &Workflow) -> Option<u32> {
    workflow.stages()
            .iter()
            .rev()
            .find(|s| self.quantity_at(&s.name) > 0)
            .map(|s| s.order)
  }

  /// `true` si queda cantidad activa y toda ella está en la etapa final.
  pub fn all_at_final_stage(&self, workflow: &Workflow) -> bool {
    let active = self.active_quantity();
    active > 0 && self.quantity_at(&workflow.final_stage().name) == active
  }

  /// Resta `quantity` de `stage`, eliminando la entrada si llega a 0.
  pub fn take(&mut self, stage: &str, quantity: u32) -> Result<(), DomainError> {
    let available = self.quantity_at(stage);
    if quantity > available {
      return Err(DomainError::ValidationError(format!("No hay {} piezas en '{}' (disponibles: {})",
                                                      quantity, stage, available)));
    }
    if available == quantity {
      self.quantity_by_stage.shift_remove(stage);
    } else {
      self.quantity_by_stage.insert(stage.to_string(), available - quantity);
    }
    Ok(())
  }

  /// Suma `quantity` a `stage`, creando la entrada si no existe.
  pub fn put(&mut self, stage: &str, quantity: u32) {
    if quantity == 0 {
      return;
    }
    *self.quantity_by_stage.entry(stage.to_string()).or_insert(0) += quantity;
  }

  /// Verifica los invariantes de conservación y de pertenencia al workflow.
  pub fn check_invariants(&self, workflow: &Workflow) -> Result<(), DomainError> {
    if self.active_quantity() + self.rejected_quantity != self.quantity_total {
      return Err(DomainError::ValidationError(format!("Conservación rota en {}: activo {} + rechazado {} != total {}",
                                                      self.id,
                                                      self.active_quantity(),
                                                      self.rejected_quantity,
                                                      self.quantity_total)));
    }
    if let Some(stage) = self.quantity_by_stage.keys().find(|s| !workflow.contains(s)) {
      return Err(DomainError::ValidationError(format!("La etapa '{}' no pertenece al workflow '{}'",
                                                      stage,
                                                      workflow.id())));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn wf() -> Workflow {
    Workflow::from_names("mini", &["Design", "Corte", "QC"]).unwrap()
  }

  fn due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 25).unwrap()
  }

  #[test]
  fn new_item_starts_at_first_stage() {
    let item = OrderItem::new("ORD-2024-00121", &wf(), 50, Priority::High, due(), Utc::now()).unwrap();
    assert_eq!(item.quantity_at("Design"), 50);
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(item.version, 0);
    assert_eq!(item.current_stage(&wf()), Some("Design"));
    item.check_invariants(&wf()).unwrap();
  }

  #[test]
  fn zero_quantity_is_rejected() {
    assert!(OrderItem::new("ORD-1", &wf(), 0, Priority::Low, due(), Utc::now()).is_err());
    assert!(OrderItem::new("  ", &wf(), 5, Priority::Low, due(), Utc::now()).is_err());
  }

  #[test]
  fn take_and_put_keep_only_positive_entries() {
    let w = wf();
    let mut item = OrderItem::new("ORD-1", &w, 10, Priority::Low, due(), Utc::now()).unwrap();
    item.take("Design", 4).unwrap();
    item.put("Corte", 4);
    assert_eq!(item.quantity_at("Design"), 6);
    assert_eq!(item.current_stage(&w), Some("Design"));
    assert_eq!(item.furthest_stage_order(&w), Some(1));

    item.take("Design", 6).unwrap();
    item.put("Corte", 6);
    assert!(!item.quantity_by_stage.contains_key("Design"));
    assert_eq!(item.quantity_at("Corte"), 10);
    assert!(item.take("Corte", 11).is_err());
  }

  #[test]
  fn invariants_detect_foreign_stage() {
    let w = wf();
    let mut item = OrderItem::new("ORD-1", &w, 10, Priority::Low, due(), Utc::now()).unwrap();
    item.take("Design", 10).unwrap();
    item.put("Planchado", 10);
    assert!(item.check_invariants(&w).is_err());
  }

  #[test]
  fn priority_ordering_and_parsing() {
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
    assert_eq!("Alta".parse::<Priority>().unwrap(), Priority::High);
    assert!("urgent".parse::<Priority>().is_err());
  }
}
