use crate::config::ProductionConfig;
use crate::workflow_type::WorkflowType;
use crate::WorkflowError;
use log::{debug, info};
use once_cell::sync::Lazy;
use prod_domain::{DomainError, StageDefinition, Workflow};
use stage_flow::StageCatalog;
use std::path::Path;

// (nombre de etapa, rol requerido)
const BASICA_STAGES: &[(&str, &str)] = &[("Design", "design"),
                                         ("Corte", "corte"),
                                         ("Estampado", "estampado"),
                                         ("Confección", "confeccion"),
                                         ("QC", "qc"),
                                         ("Empaquetado", "empaquetado")];

const SUBLIMADO_STAGES: &[(&str, &str)] = &[("Design", "design"),
                                            ("Impresión", "impresion"),
                                            ("Planchado", "planchado"),
                                            ("Corte", "corte"),
                                            ("Confección", "confeccion"),
                                            ("QC", "qc"),
                                            ("Empaquetado", "empaquetado")];

static BUILTINS: Lazy<Result<Vec<Workflow>, DomainError>> = Lazy::new(|| {
  Ok(vec![build("basica", "Producción básica", BASICA_STAGES)?,
          build("sublimado", "Producción por sublimado", SUBLIMADO_STAGES)?])
});

fn build(id: &str, name: &str, stages: &[(&str, &str)]) -> Result<Workflow, DomainError> {
  let defs = stages.iter()
                   .enumerate()
                   .map(|(order, (stage, role))| StageDefinition::new(stage, order as u32).with_role(role))
                   .collect();
  Workflow::new(id, name, 1, defs)
}

/// Fábrica de workflows y del catálogo de la planta.
///
/// Conoce los pipelines integrados (`basica`, `sublimado`), aplica las
/// capacidades configuradas y añade los workflows definidos en JSON.
pub struct WorkflowFactory;

impl WorkflowFactory {
  /// Workflows integrados, sin capacidades.
  pub fn builtin_workflows() -> Result<Vec<Workflow>, WorkflowError> {
    BUILTINS.as_ref().map(|wfs| wfs.clone()).map_err(|e| WorkflowError::Domain(e.clone()))
  }

  /// Definición integrada para un tipo. `Custom` no tiene definición propia.
  pub fn builtin(kind: &WorkflowType) -> Result<Workflow, WorkflowError> {
    if !kind.is_builtin() {
      return Err(WorkflowError::Config(format!("'{}' no es un workflow integrado", kind)));
    }
    Self::builtin_workflows()?.into_iter()
                              .find(|wf| wf.id() == kind.id())
                              .ok_or_else(|| WorkflowError::Config(format!("workflow integrado '{}' ausente", kind)))
  }

  /// Devuelve una copia del workflow con las capacidades indicadas en las
  /// etapas cuyo nombre coincide. Las demás conservan su capacidad.
  pub fn with_capacities(workflow: &Workflow, capacities: &[(String, u32)]) -> Result<Workflow, WorkflowError> {
    let stages = workflow.stages()
                         .iter()
                         .map(|stage| {
                           match capacities.iter().find(|(name, _)| *name == stage.name) {
                             Some((_, cap)) => stage.clone().with_capacity(*cap),
                             None => stage.clone(),
                           }
                         })
                         .collect();
    Ok(Workflow::new(workflow.id(), workflow.name(), workflow.version(), stages)?)
  }

  /// Lee un array JSON de workflows. Cada definición se valida al
  /// deserializar.
  pub fn load_workflows_file(path: &Path) -> Result<Vec<Workflow>, WorkflowError> {
    let raw = std::fs::read_to_string(path)?;
    let workflows: Vec<Workflow> = serde_json::from_str(&raw)?;
    debug!("{} workflows leídos de {}", workflows.len(), path.display());
    Ok(workflows)
  }

  /// Catálogo completo según la configuración: integrados con las
  /// capacidades de `PROD_STAGE_CAPACITY` más los de `PROD_WORKFLOWS_FILE`.
  pub fn catalog_from_config(config: &ProductionConfig) -> Result<StageCatalog, WorkflowError> {
    let mut catalog = StageCatalog::new();
    for wf in Self::builtin_workflows()? {
      catalog.register(Self::with_capacities(&wf, &config.stage_capacity)?)?;
    }
    if let Some(path) = &config.workflows_file {
      for wf in Self::load_workflows_file(path)? {
        catalog.register(wf)?;
      }
    }
    info!("catálogo listo: {}", catalog.workflow_ids().collect::<Vec<_>>().join(", "));
    Ok(catalog)
  }

  /// Tipos disponibles en un catálogo.
  pub fn workflow_types(catalog: &StageCatalog) -> Vec<WorkflowType> {
    catalog.workflow_ids()
           .map(|id| id.parse::<WorkflowType>().unwrap_or_else(|_| WorkflowType::Custom(id.to_string())))
           .collect()
  }
}
