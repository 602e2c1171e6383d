// workflow.rs
use crate::{DomainError, StageDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Pipeline nombrado y ordenado de etapas (`basica`, `sublimado`, ...).
///
/// Un `Workflow` es inmutable una vez construido: sólo se expone por
/// referencia y no tiene mutadores. Cambiar un pipeline implica registrar un
/// workflow con otro `id` (por ejemplo `basica-v2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWorkflow")]
pub struct Workflow {
  id: String,
  name: String,
  version: u32,
  stages: Vec<StageDefinition>,
}

/// Forma deserializable sin validar; `Workflow` se construye a partir de ella.
#[derive(Deserialize)]
struct RawWorkflow {
  id: String,
  #[serde(default)]
  name: Option<String>,
  #[serde(default = "default_version")]
  version: u32,
  stages: Vec<StageDefinition>,
}

fn default_version() -> u32 {
  1
}

impl TryFrom<RawWorkflow> for Workflow {
  type Error = DomainError;

  fn try_from(raw: RawWorkflow) -> Result<Self, Self::Error> {
    let name = raw.name.unwrap_or_else(|| raw.id.clone());
    Workflow::new(&raw.id, &name, raw.version, raw.stages)
  }
}

impl Workflow {
  /// Valida y construye el workflow.
  ///
  /// Reglas: id no vacío, al menos una etapa, nombres únicos y no vacíos, y
  /// `order` contiguo desde 0 coincidiendo con la posición.
  pub fn new(id: &str, name: &str, version: u32, stages: Vec<StageDefinition>) -> Result<Self, DomainError> {
    if id.trim().is_empty() {
      return Err(DomainError::ValidationError("El id del workflow no puede estar vacío".to_string()));
    }
    if stages.is_empty() {
      return Err(DomainError::ValidationError(format!("El workflow '{}' debe tener al menos una etapa", id)));
    }
    let mut seen = HashSet::new();
    for (idx, stage) in stages.iter().enumerate() {
      if stage.name.trim().is_empty() {
        return Err(DomainError::ValidationError(format!("Etapa sin nombre en la posición {} de '{}'", idx, id)));
      }
      if !seen.insert(stage.name.as_str()) {
        return Err(DomainError::ValidationError(format!("Etapa duplicada '{}' en '{}'", stage.name, id)));
      }
      if stage.order as usize != idx {
        return Err(DomainError::ValidationError(format!("La etapa '{}' tiene order {} pero ocupa la posición {}",
                                                        stage.name, stage.order, idx)));
      }
      if stage.capacity == Some(0) {
        return Err(DomainError::ValidationError(format!("La capacidad de '{}' debe ser mayor que 0", stage.name)));
      }
    }
    Ok(Self { id: id.to_string(), name: name.to_string(), version, stages })
  }

  /// Atajo para construir un workflow a partir de nombres en orden.
  pub fn from_names(id: &str, names: &[&str]) -> Result<Self, DomainError> {
    let stages = names.iter()
                      .enumerate()
                      .map(|(i, n)| StageDefinition::new(n, i as u32))
                      .collect();
    Self::new(id, id, 1, stages)
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn version(&self) -> u32 {
    self.version
  }

  pub fn stages(&self) -> &[StageDefinition] {
    &self.stages
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  pub fn first_stage(&self) -> &StageDefinition {
    // `new` garantiza al menos una etapa
    &self.stages[0]
  }

  pub fn final_stage(&self) -> &StageDefinition {
    &self.stages[self.stages.len() - 1]
  }

  pub fn stage(&self, name: &str) -> Option<&StageDefinition> {
    self.stages.iter().find(|s| s.name == name)
  }

  pub fn stage_at(&self, order: u32) -> Option<&StageDefinition> {
    self.stages.get(order as usize)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.stage(name).is_some()
  }

  pub fn is_terminal(&self, name: &str) -> bool {
    self.final_stage().name == name
  }
}

impl fmt::Display for Workflow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let names: Vec<&str> = self.stages.iter().map(|s| s.name.as_str()).collect();
    write!(f, "Workflow({} v{}: {})", self.id, self.version, names.join(" → "))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_names_assigns_contiguous_orders() {
    let wf = Workflow::from_names("basica", &["Design", "Corte", "QC"]).unwrap();
    assert_eq!(wf.len(), 3);
    assert_eq!(wf.first_stage().name, "Design");
    assert_eq!(wf.final_stage().name, "QC");
    assert_eq!(wf.stage_at(1).unwrap().name, "Corte");
    assert!(wf.is_terminal("QC"));
    assert!(!wf.is_terminal("Corte"));
  }

  #[test]
  fn rejects_empty_and_duplicates() {
    assert!(Workflow::from_names("vacio", &[]).is_err());
    assert!(Workflow::from_names("dup", &["Corte", "Corte"]).is_err());
    assert!(Workflow::from_names("", &["Corte"]).is_err());
  }

  #[test]
  fn rejects_gaps_in_order() {
    let stages = vec![StageDefinition::new("Design", 0), StageDefinition::new("Corte", 2)];
    let err = Workflow::new("hueco", "hueco", 1, stages).unwrap_err();
    assert!(matches!(err, DomainError::ValidationError(_)));
  }

  #[test]
  fn deserialization_goes_through_validation() {
    let ok: Workflow = serde_json::from_str(r#"{"id":"mini","stages":[{"name":"A","order":0},{"name":"B","order":1,"capacity":10}]}"#).unwrap();
    assert_eq!(ok.name(), "mini");
    assert_eq!(ok.version(), 1);
    assert_eq!(ok.stage("B").unwrap().capacity, Some(10));

    let bad = serde_json::from_str::<Workflow>(r#"{"id":"mini","stages":[]}"#);
    assert!(bad.is_err());
  }
}
