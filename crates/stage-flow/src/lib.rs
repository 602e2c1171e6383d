//! Crate `stage-flow`: motor de etapas de producción
//!
//! Este crate define el catálogo de workflows (`StageCatalog`), el motor que
//! valida y aplica transiciones (`TransitionEngine`), el historial
//! append-only (`HistoryLedger`), las colas por estación (`QueueProjector`),
//! el contrato de persistencia `ItemRepository` y una implementación en
//! memoria útil para pruebas (`InMemoryItemRepository`).
//!
//! Diseño resumido:
//! - Cantidades particionadas: un item puede tener parte del lote en una
//!   etapa y el resto en la siguiente.
//! - Auditoría: cada transición exitosa escribe exactamente un
//!   `TransitionRecord` con notas no vacías, de forma atómica con el item.
//! - Locking optimista: las escrituras usan `expected_version` y el motor
//!   reintenta una vez ante conflicto.
//!
//! Ejemplo rápido:
//! ```rust
//! use stage_flow::{InMemoryItemRepository, ProductionService, StageCatalog, SystemClock, TransitionEngineConfig};
//! use prod_domain::Workflow;
//! use std::sync::Arc;
//! let wf = Workflow::from_names("mini", &["Design", "Corte", "QC"]).unwrap();
//! let catalog = Arc::new(StageCatalog::from_workflows(vec![wf]).unwrap());
//! let repo = Arc::new(InMemoryItemRepository::new());
//! let service = ProductionService::new(repo, catalog, Arc::new(SystemClock), TransitionEngineConfig::default());
//! assert!(service.list_items().unwrap().is_empty());
//! ```
pub mod catalog;
pub mod clock;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod queue;
pub mod repository;
pub mod service;
pub mod store;
pub mod stubs;

pub use catalog::*;
pub use clock::*;
pub use engine::*;
pub use errors::*;
pub use ledger::*;
pub use queue::*;
pub use repository::*;
pub use service::*;
pub use store::*;
pub use stubs::*;
