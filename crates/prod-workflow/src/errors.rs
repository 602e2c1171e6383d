use thiserror::Error;

// Errores de la capa de workflows y configuración.
//
// Agrupa los errores del motor (`FlowError`), del dominio (`DomainError`),
// de configuración por entorno y de lectura de definiciones en JSON.
#[derive(Error, Debug)]
pub enum WorkflowError {
  /// Errores originados por el motor de etapas.
  #[error("Error de flujo: {0}")]
  Flow(#[from] stage_flow::errors::FlowError),

  /// Errores de validación del modelo de producción.
  #[error("Error de dominio: {0}")]
  Domain(#[from] prod_domain::DomainError),

  /// Variable de entorno con un valor inválido.
  #[error("Error de configuración: {0}")]
  Config(String),

  /// No se pudo leer un fichero de definiciones.
  #[error("Error de E/S: {0}")]
  Io(#[from] std::io::Error),

  /// Errores de serializacion/deserializacion JSON.
  #[error("Error de serializacion: {0}")]
  Serialization(#[from] serde_json::Error),
}
