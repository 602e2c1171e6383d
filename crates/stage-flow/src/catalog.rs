// Archivo: catalog.rs
// Propósito: catálogo inmutable de workflows. Las etapas se declaran una sola
// vez aquí y todo el motor las consulta por `workflow_id`.
use crate::errors::{FlowError, Result};
use indexmap::IndexMap;
use prod_domain::{StageDefinition, Workflow};

/// Resultado de `next_stage`: la etapa siguiente o el marcador de etapa
/// terminal. No es un error; el llamador debe ramificar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStage<'a> {
    Stage(&'a StageDefinition),
    Terminal,
}

/// Conjunto de workflows registrados, en orden de registro.
#[derive(Debug, Clone, Default)]
pub struct StageCatalog {
    workflows: IndexMap<String, Workflow>,
}

impl StageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construye un catálogo a partir de una lista de workflows. Falla si
    /// hay ids repetidos.
    pub fn from_workflows<I>(workflows: I) -> Result<Self>
        where I: IntoIterator<Item = Workflow>
    {
        let mut catalog = Self::new();
        for wf in workflows {
            catalog.register(wf)?;
        }
        Ok(catalog)
    }

    /// Registra un workflow nuevo. Un id ya registrado no se sobrescribe:
    /// los cambios de pipeline se publican como un workflow con otro id.
    pub fn register(&mut self, workflow: Workflow) -> Result<()> {
        if self.workflows.contains_key(workflow.id()) {
            return Err(FlowError::Validation(format!("el workflow '{}' ya está registrado", workflow.id())));
        }
        self.workflows.insert(workflow.id().to_string(), workflow);
        Ok(())
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Result<&Workflow> {
        self.workflows
            .get(workflow_id)
            .ok_or_else(|| FlowError::NotFound(format!("workflow {}", workflow_id)))
    }

    pub fn stage(&self, workflow_id: &str, stage_name: &str) -> Result<&StageDefinition> {
        let wf = self.get_workflow(workflow_id)?;
        wf.stage(stage_name)
          .ok_or_else(|| FlowError::NotFound(format!("etapa '{}' en workflow {}", stage_name, workflow_id)))
    }

    pub fn next_stage(&self, workflow_id: &str, stage_name: &str) -> Result<NextStage<'_>> {
        let current = self.stage(workflow_id, stage_name)?;
        let wf = self.get_workflow(workflow_id)?;
        Ok(match wf.stage_at(current.order + 1) {
            Some(next) => NextStage::Stage(next),
            None => NextStage::Terminal,
        })
    }

    pub fn stage_at(&self, workflow_id: &str, order: u32) -> Result<&StageDefinition> {
        let wf = self.get_workflow(workflow_id)?;
        wf.stage_at(order)
          .ok_or_else(|| FlowError::NotFound(format!("etapa #{} en workflow {}", order, workflow_id)))
    }

    pub fn workflow_ids(&self) -> impl Iterator<Item = &str> {
        self.workflows.keys().map(|k| k.as_str())
    }

    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.values()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
