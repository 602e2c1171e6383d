//! Configuración de producción leída del entorno (`.env` incluido).
//!
//! Variables reconocidas:
//! - `PROD_DATA_FILE`: ruta del almacén JSON (por defecto
//!   `data/produccion.json`).
//! - `PROD_CAPACITY_POLICY`: `soft` o `hard`.
//! - `PROD_ENFORCE_ROLES`: `true`/`false`.
//! - `PROD_STAGE_CAPACITY`: `Etapa=N,Etapa=N`, se aplica a los workflows
//!   integrados.
//! - `PROD_WORKFLOWS_FILE`: array JSON con workflows adicionales.
use crate::errors::WorkflowError;
use stage_flow::{CapacityPolicy, TransitionEngineConfig};
use std::path::PathBuf;

pub use prod_persistence::DEFAULT_DATA_FILE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionConfig {
  pub data_file: PathBuf,
  pub capacity_policy: CapacityPolicy,
  pub enforce_roles: bool,
  /// Capacidades por nombre de etapa, en el orden en que se declararon.
  pub stage_capacity: Vec<(String, u32)>,
  pub workflows_file: Option<PathBuf>,
}

impl Default for ProductionConfig {
  fn default() -> Self {
    Self { data_file: PathBuf::from(DEFAULT_DATA_FILE),
           capacity_policy: CapacityPolicy::Soft,
           enforce_roles: false,
           stage_capacity: Vec::new(),
           workflows_file: None }
  }
}

impl ProductionConfig {
  /// Carga `.env` si existe y lee las variables `PROD_*`.
  pub fn from_env() -> Result<Self, WorkflowError> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Igual que `from_env` pero con una fuente de variables arbitraria.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkflowError>
    where F: Fn(&str) -> Option<String>
  {
    let mut cfg = ProductionConfig::default();
    if let Some(path) = non_empty(lookup("PROD_DATA_FILE")) {
      cfg.data_file = PathBuf::from(path);
    }
    if let Some(policy) = non_empty(lookup("PROD_CAPACITY_POLICY")) {
      cfg.capacity_policy =
        policy.parse::<CapacityPolicy>().map_err(|e| WorkflowError::Config(format!("PROD_CAPACITY_POLICY: {}", e)))?;
    }
    if let Some(flag) = non_empty(lookup("PROD_ENFORCE_ROLES")) {
      cfg.enforce_roles = parse_bool(&flag)?;
    }
    if let Some(raw) = non_empty(lookup("PROD_STAGE_CAPACITY")) {
      cfg.stage_capacity = parse_stage_capacity(&raw)?;
    }
    cfg.workflows_file = non_empty(lookup("PROD_WORKFLOWS_FILE")).map(PathBuf::from);
    Ok(cfg)
  }

  /// Parámetros del motor derivados de esta configuración.
  pub fn engine_config(&self) -> TransitionEngineConfig {
    TransitionEngineConfig { capacity_policy: self.capacity_policy,
                             enforce_roles: self.enforce_roles,
                             ..TransitionEngineConfig::default() }
  }

  pub fn capacity_for(&self, stage: &str) -> Option<u32> {
    self.stage_capacity.iter().find(|(name, _)| name == stage).map(|(_, cap)| *cap)
  }
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Result<bool, WorkflowError> {
  match raw.to_lowercase().as_str() {
    "1" | "true" | "yes" | "si" | "sí" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    other => Err(WorkflowError::Config(format!("PROD_ENFORCE_ROLES: valor no booleano '{}'", other))),
  }
}

/// Parsea `Corte=80, QC=40`. Las capacidades deben ser positivas.
fn parse_stage_capacity(raw: &str) -> Result<Vec<(String, u32)>, WorkflowError> {
  let mut out: Vec<(String, u32)> = Vec::new();
  for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
    let (name, value) =
      part.split_once('=')
          .ok_or_else(|| WorkflowError::Config(format!("PROD_STAGE_CAPACITY: se esperaba Etapa=N en '{}'", part)))?;
    let name = name.trim();
    if name.is_empty() {
      return Err(WorkflowError::Config(format!("PROD_STAGE_CAPACITY: etapa vacía en '{}'", part)));
    }
    let capacity: u32 = value.trim()
                             .parse()
                             .map_err(|_| WorkflowError::Config(format!("PROD_STAGE_CAPACITY: capacidad inválida en '{}'", part)))?;
    if capacity == 0 {
      return Err(WorkflowError::Config(format!("PROD_STAGE_CAPACITY: la capacidad de '{}' debe ser > 0", name)));
    }
    match out.iter_mut().find(|(n, _)| n == name) {
      Some(entry) => entry.1 = capacity,
      None => out.push((name.to_string(), capacity)),
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn defaults_when_nothing_set() {
    let cfg = ProductionConfig::from_lookup(|_| None).unwrap();
    assert_eq!(cfg, ProductionConfig::default());
    assert_eq!(cfg.data_file, PathBuf::from("data/produccion.json"));
    let engine = cfg.engine_config();
    assert_eq!(engine.capacity_policy, CapacityPolicy::Soft);
    assert!(!engine.enforce_roles);
    assert_eq!(engine.conflict_retries, 1);
  }

  #[test]
  fn reads_all_variables() {
    let cfg = ProductionConfig::from_lookup(lookup_from(&[("PROD_DATA_FILE", "/tmp/p.json"),
                                                          ("PROD_CAPACITY_POLICY", "hard"),
                                                          ("PROD_ENFORCE_ROLES", "si"),
                                                          ("PROD_STAGE_CAPACITY", "Corte=80, QC = 40,Corte=90"),
                                                          ("PROD_WORKFLOWS_FILE", "wf.json")])).unwrap();
    assert_eq!(cfg.data_file, PathBuf::from("/tmp/p.json"));
    assert_eq!(cfg.capacity_policy, CapacityPolicy::Hard);
    assert!(cfg.enforce_roles);
    assert_eq!(cfg.stage_capacity, vec![("Corte".to_string(), 90), ("QC".to_string(), 40)]);
    assert_eq!(cfg.capacity_for("QC"), Some(40));
    assert_eq!(cfg.capacity_for("Design"), None);
    assert_eq!(cfg.workflows_file, Some(PathBuf::from("wf.json")));
  }

  #[test]
  fn invalid_values_are_config_errors() {
    for pairs in [[("PROD_CAPACITY_POLICY", "estricta")],
                  [("PROD_ENFORCE_ROLES", "quizas")],
                  [("PROD_STAGE_CAPACITY", "Corte80")],
                  [("PROD_STAGE_CAPACITY", "Corte=0")],
                  [("PROD_STAGE_CAPACITY", "=5")],
                  [("PROD_STAGE_CAPACITY", "Corte=-1")]]
    {
      let res = ProductionConfig::from_lookup(lookup_from(&pairs));
      assert!(matches!(res, Err(WorkflowError::Config(_))), "{:?}", pairs);
    }
  }

  #[test]
  fn blank_values_fall_back_to_defaults() {
    let cfg = ProductionConfig::from_lookup(lookup_from(&[("PROD_DATA_FILE", "  "), ("PROD_WORKFLOWS_FILE", "")])).unwrap();
    assert_eq!(cfg.data_file, PathBuf::from(DEFAULT_DATA_FILE));
    assert_eq!(cfg.workflows_file, None);
  }
}
