// Archivo: errors.rs
// Propósito: definir los errores del motor de etapas y el alias Result<T>
// usado por las APIs del crate. Cada precondición de una transición tiene su
// propia variante para que el llamador pueda distinguirlas.
use prod_domain::{DomainError, ItemStatus, TransitionAction};
use thiserror::Error;
use uuid::Uuid;

/// Errores del motor de producción.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Cantidad nula o mayor que la disponible en la etapa de origen.
    #[error("Cantidad insuficiente en '{stage}': solicitadas {requested}, disponibles {available}")]
    InsufficientQuantity { stage: String, requested: u32, available: u32 },
    /// Toda transición requiere notas no vacías.
    #[error("Las notas son obligatorias para registrar la transición")]
    MissingAuditTrail,
    /// El item ya está completado o totalmente rechazado.
    #[error("El item {item_id} está en estado terminal ({status})")]
    ItemTerminal { item_id: Uuid, status: ItemStatus },
    /// Se intentó avanzar desde la etapa final.
    #[error("La etapa '{stage}' es terminal; no hay etapa siguiente")]
    NoNextStage { stage: String },
    /// La etapa destino superaría su capacidad (política dura).
    #[error("Capacidad excedida en '{stage}': capacidad {capacity}, ocupación {occupancy}, solicitadas {requested}")]
    CapacityExceeded { stage: String, capacity: u32, occupancy: u32, requested: u32 },
    /// Par estado/acción no permitido (por ejemplo `resume` sin `hold`).
    #[error("Transición de estado ilegal: {action} desde {status}")]
    IllegalStatusTransition { status: ItemStatus, action: TransitionAction },
    /// Conflicto optimista: la versión almacenada cambió.
    #[error("Conflicto de versión en el item {item_id} (esperada {expected})")]
    VersionConflict { item_id: Uuid, expected: i64 },
    /// El operador no tiene el rol requerido por la etapa.
    #[error("La etapa '{stage}' requiere el rol '{required}'")]
    RoleMismatch { stage: String, required: String },
    /// Workflow, item o etapa desconocidos.
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// Validación de entrada fuera de la taxonomía de transiciones.
    #[error("Error de validación: {0}")]
    Validation(String),
    /// Error del almacenamiento externo.
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    /// Error propagado desde el modelo de dominio.
    #[error("Error de dominio: {0}")]
    Domain(#[from] DomainError),
}

/// Categoría sin datos de un `FlowError`, útil para ramificar en la capa de
/// presentación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientQuantity,
    MissingAuditTrail,
    ItemTerminal,
    NoNextStage,
    CapacityExceeded,
    IllegalStatusTransition,
    VersionConflict,
    RoleMismatch,
    NotFound,
    Validation,
    Storage,
    Domain,
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::InsufficientQuantity { .. } => ErrorKind::InsufficientQuantity,
            FlowError::MissingAuditTrail => ErrorKind::MissingAuditTrail,
            FlowError::ItemTerminal { .. } => ErrorKind::ItemTerminal,
            FlowError::NoNextStage { .. } => ErrorKind::NoNextStage,
            FlowError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            FlowError::IllegalStatusTransition { .. } => ErrorKind::IllegalStatusTransition,
            FlowError::VersionConflict { .. } => ErrorKind::VersionConflict,
            FlowError::RoleMismatch { .. } => ErrorKind::RoleMismatch,
            FlowError::NotFound(_) => ErrorKind::NotFound,
            FlowError::Validation(_) => ErrorKind::Validation,
            FlowError::Storage(_) => ErrorKind::Storage,
            FlowError::Domain(_) => ErrorKind::Domain,
        }
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, FlowError>;
