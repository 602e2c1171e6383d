// transition.rs
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Acción solicitada sobre un item en una estación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionAction {
  Advance,
  Reject,
  Hold,
  Resume,
}

impl TransitionAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      TransitionAction::Advance => "advance",
      TransitionAction::Reject => "reject",
      TransitionAction::Hold => "hold",
      TransitionAction::Resume => "resume",
    }
  }
}

impl fmt::Display for TransitionAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TransitionAction {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "advance" | "avanzar" => Ok(TransitionAction::Advance),
      "reject" | "rechazar" => Ok(TransitionAction::Reject),
      "hold" | "retener" => Ok(TransitionAction::Hold),
      "resume" | "reanudar" => Ok(TransitionAction::Resume),
      other => Err(DomainError::ValidationError(format!("Acción desconocida: {}", other))),
    }
  }
}

/// Entrada inmutable del historial de transiciones.
///
/// `sequence` es contiguo desde 1 por item. `prev_digest`/`digest` encadenan
/// los registros de un mismo item (el primero parte de un digest vacío).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub id: Uuid,
  pub item_id: Uuid,
  pub sequence: i64,
  pub from_stage: String,
  pub to_stage: Option<String>,
  pub action: TransitionAction,
  pub quantity: u32,
  pub timestamp: DateTime<Utc>,
  pub operator_id: String,
  pub notes: String,
  pub station_id: String,
  pub prev_digest: String,
  pub digest: String,
}

impl fmt::Display for TransitionRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let to = self.to_stage.as_deref().unwrap_or("-");
    write!(f,
           "#{} {} {} x{} {} → {} por {} en {}: {}",
           self.sequence,
           self.timestamp.to_rfc3339(),
           self.action,
           self.quantity,
           self.from_stage,
           to,
           self.operator_id,
           self.station_id,
           self.notes)
  }
}
