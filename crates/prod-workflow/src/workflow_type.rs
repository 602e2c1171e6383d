use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tipos de pipeline que conoce el crate. `Custom` envuelve el id de un
/// workflow cargado desde fichero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
  Basica,
  Sublimado,
  Custom(String),
}

impl WorkflowType {
  /// Id del workflow en el catálogo.
  pub fn id(&self) -> &str {
    match self {
      WorkflowType::Basica => "basica",
      WorkflowType::Sublimado => "sublimado",
      WorkflowType::Custom(id) => id,
    }
  }

  pub fn is_builtin(&self) -> bool {
    !matches!(self, WorkflowType::Custom(_))
  }
}

impl fmt::Display for WorkflowType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.id())
  }
}

impl FromStr for WorkflowType {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(());
    }
    match trimmed.to_lowercase().as_str() {
      "basica" | "básica" => Ok(WorkflowType::Basica),
      "sublimado" | "sublimacion" | "sublimación" => Ok(WorkflowType::Sublimado),
      _ => Ok(WorkflowType::Custom(trimmed.to_string())),
    }
  }
}

impl Default for WorkflowType {
  fn default() -> Self {
    WorkflowType::Basica
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_builtin_and_custom() {
    assert_eq!("Básica".parse::<WorkflowType>(), Ok(WorkflowType::Basica));
    assert_eq!(" sublimado ".parse::<WorkflowType>(), Ok(WorkflowType::Sublimado));
    assert_eq!("bordado-v2".parse::<WorkflowType>(), Ok(WorkflowType::Custom("bordado-v2".into())));
    assert!("  ".parse::<WorkflowType>().is_err());
  }

  #[test]
  fn display_matches_catalog_id() {
    assert_eq!(WorkflowType::Sublimado.to_string(), "sublimado");
    assert_eq!(WorkflowType::Custom("x".into()).id(), "x");
    assert!(!WorkflowType::Custom("x".into()).is_builtin());
  }
}
