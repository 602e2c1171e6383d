use log::{debug, info};
use prod_domain::{OrderItem, TransitionRecord};
use stage_flow::errors::{FlowError, Result};
use stage_flow::repository::{ItemRepository, PersistResult};
use stage_flow::store::StoreState;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub const DEFAULT_DATA_FILE: &str = "data/produccion.json";

/// Repositorio durable respaldado por un fichero JSON.
///
/// Todo el estado (items y registros) vive en memoria y se vuelca completo
/// en cada mutación: se escribe un fichero temporal junto al destino y se
/// renombra encima. Si la escritura falla el estado en memoria no cambia, de
/// modo que item y registro se guardan juntos o no se guarda ninguno.
///
/// Antes de cada operación se relee el fichero y, si su contenido difiere
/// de lo último leído o escrito, se recarga. Así otro proceso que escriba
/// entre dos operaciones provoca `Conflict` en lugar de perder sus cambios.
/// Entre la relectura y el rename no hay bloqueo entre procesos: el fichero
/// debe tener un único escritor a la vez.
pub struct JsonFileItemRepository {
  path: PathBuf,
  cache: Mutex<Cache>,
}

struct Cache {
  state: StoreState,
  /// Bytes del fichero tal como se leyeron o escribieron por última vez.
  raw: Vec<u8>,
}

impl JsonFileItemRepository {
  /// Abre el almacén en `path`. Si el fichero no existe se empieza vacío y
  /// se crea en la primera escritura.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let cache = match read_file(&path)? {
      Some(raw) => {
        let state = parse(&path, &raw)?;
        info!("almacén cargado de {} ({} items, {} registros)",
              path.display(),
              state.items.len(),
              state.records.len());
        Cache { state, raw }
      }
      None => {
        info!("almacén {} no existe; se creará al primer cambio", path.display());
        Cache { state: StoreState::new(),
                raw: Vec::new() }
      }
    };
    Ok(Self { path, cache: Mutex::new(cache) })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Bloquea la caché y la pone al día con el fichero.
  fn synced(&self) -> Result<MutexGuard<'_, Cache>> {
    let mut guard = self.cache.lock().map_err(|e| FlowError::Storage(format!("mutex poisoned: {:?}", e)))?;
    if let Some(raw) = read_file(&self.path)? {
      if raw != guard.raw {
        debug!("{} cambió fuera de este proceso; se recarga", self.path.display());
        guard.state = parse(&self.path, &raw)?;
        guard.raw = raw;
      }
    }
    Ok(guard)
  }

  /// Aplica `f` sobre una copia del estado; si `changed` indica que hubo
  /// cambios, la copia se persiste y sólo entonces reemplaza al estado
  /// vigente.
  fn mutate<T, F, C>(&self, f: F, changed: C) -> Result<T>
    where F: FnOnce(&mut StoreState) -> Result<T>,
          C: Fn(&T) -> bool
  {
    let mut guard = self.synced()?;
    let mut next = guard.state.clone();
    let out = f(&mut next)?;
    if changed(&out) {
      let raw = self.write(&next)?;
      *guard = Cache { state: next, raw };
    }
    Ok(out)
  }

  fn write(&self, state: &StoreState) -> Result<Vec<u8>> {
    let storage = |e: std::io::Error| FlowError::Storage(format!("escribir {}: {}", self.path.display(), e));
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(storage)?;
    }
    let body = serde_json::to_vec_pretty(state).map_err(|e| FlowError::Storage(format!("serializar estado: {}", e)))?;
    let mut tmp_name = self.path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    let mut file = fs::File::create(&tmp).map_err(storage)?;
    file.write_all(&body).map_err(storage)?;
    file.sync_all().map_err(storage)?;
    fs::rename(&tmp, &self.path).map_err(storage)?;
    debug!("almacén escrito en {} ({} bytes)", self.path.display(), body.len());
    Ok(body)
  }
}

/// `None` si el fichero todavía no existe.
fn read_file(path: &Path) -> Result<Option<Vec<u8>>> {
  match fs::read(path) {
    Ok(raw) => Ok(Some(raw)),
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
    Err(e) => Err(FlowError::Storage(format!("leer {}: {}", path.display(), e))),
  }
}

fn parse(path: &Path, raw: &[u8]) -> Result<StoreState> {
  serde_json::from_slice(raw).map_err(|e| FlowError::Storage(format!("JSON inválido en {}: {}", path.display(), e)))
}

fn persisted(res: &PersistResult) -> bool {
  matches!(res, PersistResult::Ok { .. })
}

impl ItemRepository for JsonFileItemRepository {
  fn load_item(&self, id: &Uuid) -> Result<OrderItem> {
    self.synced()?.state.load_item(id)
  }

  fn insert_item(&self, item: &OrderItem) -> Result<()> {
    self.mutate(|state| state.insert_item(item), |_| true)
  }

  fn save_item(&self, item: &OrderItem, expected_version: i64) -> Result<PersistResult> {
    self.mutate(|state| state.save_item(item, expected_version), persisted)
  }

  fn commit_transition(&self, item: &OrderItem, expected_version: i64, record: &TransitionRecord)
                       -> Result<PersistResult> {
    self.mutate(|state| state.commit_transition(item, expected_version, record), persisted)
  }

  fn query_records(&self, item_id: &Uuid) -> Result<Vec<TransitionRecord>> {
    Ok(self.synced()?.state.records_for(item_id))
  }

  fn query_records_for_station(&self, station_id: &str) -> Result<Vec<TransitionRecord>> {
    Ok(self.synced()?.state.records_for_station(station_id))
  }

  fn query_items_at_stage(&self, workflow_id: &str, stage: &str) -> Result<Vec<OrderItem>> {
    Ok(self.synced()?.state.items_at_stage(workflow_id, stage))
  }

  fn query_items_at_station(&self, stage: &str) -> Result<Vec<OrderItem>> {
    Ok(self.synced()?.state.items_at_station(stage))
  }

  fn list_items(&self) -> Result<Vec<OrderItem>> {
    Ok(self.synced()?.state.list_items())
  }
}

/// Crear el repositorio desde el entorno: `PROD_DATA_FILE` o
/// `data/produccion.json`.
pub fn new_from_env() -> Result<JsonFileItemRepository> {
  dotenvy::dotenv().ok();
  let path = std::env::var("PROD_DATA_FILE").ok()
                                            .map(|p| p.trim().to_string())
                                            .filter(|p| !p.is_empty())
                                            .unwrap_or_else(|| DEFAULT_DATA_FILE.into());
  JsonFileItemRepository::open(path)
}
