//! Persistencia durable para el motor de etapas.
//! Expone `JsonFileItemRepository`, una implementación de
//! `stage_flow::ItemRepository` sobre un fichero JSON con reemplazo atómico,
//! y `new_from_env` para construirla a partir de `PROD_DATA_FILE`.

mod file_repository;

pub use file_repository::{new_from_env, JsonFileItemRepository, DEFAULT_DATA_FILE};
