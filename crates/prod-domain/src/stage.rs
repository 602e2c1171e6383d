// stage.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Una estación/etapa dentro de un pipeline de producción.
///
/// `order` es el rango 0-based dentro del workflow; `capacity` es el máximo
/// de piezas que la estación debería sostener a la vez (límite blando o duro
/// según la política del motor) y `required_role` la capacidad que debe tener
/// el operador para trabajarla.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageDefinition {
  pub name: String,
  pub order: u32,
  #[serde(default)]
  pub capacity: Option<u32>,
  #[serde(default)]
  pub required_role: Option<String>,
}

impl StageDefinition {
  pub fn new(name: &str, order: u32) -> Self {
    Self { name: name.to_string(), order, capacity: None, required_role: None }
  }

  pub fn with_capacity(mut self, capacity: u32) -> Self {
    self.capacity = Some(capacity);
    self
  }

  pub fn with_role(mut self, role: &str) -> Self {
    self.required_role = Some(role.to_string());
    self
  }
}

impl fmt::Display for StageDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.name, self.order)
  }
}
