//! prod-workflow: pipelines de producción y configuración de planta
//!
//! Define los workflows integrados (`basica`, `sublimado`), la
//! configuración leída del entorno (`ProductionConfig`) y la fábrica que
//! arma el `stage_flow::StageCatalog` que consume el motor.

pub mod config;
pub mod errors;
pub mod factory;
pub mod workflow_type;

pub use config::ProductionConfig;
pub use errors::WorkflowError;
pub use factory::WorkflowFactory;
pub use workflow_type::WorkflowType;
