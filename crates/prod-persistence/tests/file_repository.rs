use chrono::{NaiveDate, TimeZone, Utc};
use prod_domain::{Priority, TransitionAction, Workflow};
use prod_persistence::{new_from_env, JsonFileItemRepository};
use stage_flow::errors::FlowError;
use stage_flow::repository::{ItemRepository, PersistResult};
use stage_flow::{FixedClock, Operator, ProductionService, StageCatalog, TransitionEngineConfig, TransitionRequest};
use std::fs;
use std::sync::Arc;

fn catalog() -> Arc<StageCatalog> {
  let wf = Workflow::from_names("basica", &["Design", "Corte", "Estampado", "QC"]).unwrap();
  Arc::new(StageCatalog::from_workflows(vec![wf]).unwrap())
}

fn service(repo: Arc<JsonFileItemRepository>) -> ProductionService<JsonFileItemRepository> {
  let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap()));
  ProductionService::new(repo, catalog(), clock, TransitionEngineConfig::default())
}

fn due() -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 10, 20).unwrap()
}

#[test]
fn state_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("produccion.json");

  let item_id = {
    let repo = Arc::new(JsonFileItemRepository::open(&path).unwrap());
    let svc = service(repo);
    let item = svc.create_item("ORD-001", "basica", 50, Priority::High, due()).unwrap();
    let op = Operator::new("op-1");
    svc.apply_transition(&TransitionRequest::new(item.id, TransitionAction::Advance, 30, "lote uno", "est-design", op.clone()))
       .unwrap();
    svc.apply_transition(&TransitionRequest::new(item.id, TransitionAction::Reject, 5, "mancha", "est-corte", op).at_stage("Corte"))
       .unwrap();
    item.id
  };

  let repo = Arc::new(JsonFileItemRepository::open(&path).unwrap());
  let svc = service(repo);
  let item = svc.get_item(&item_id).unwrap();
  assert_eq!(item.quantity_at("Design"), 20);
  assert_eq!(item.quantity_at("Corte"), 25);
  assert_eq!(item.rejected_quantity, 5);
  assert_eq!(item.version, 2);
  // el orden de etapas del mapa se conserva al recargar
  assert_eq!(item.quantity_by_stage.keys().collect::<Vec<_>>(), vec!["Design", "Corte"]);

  let history = svc.history(&item_id).unwrap();
  assert_eq!(history.iter().map(|r| r.sequence).collect::<Vec<_>>(), vec![1, 2]);
  assert!(svc.check_consistency(&item_id).unwrap().consistent);
  svc.verify_chain(&item_id).unwrap();
}

#[test]
fn conflict_leaves_file_untouched() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.json");
  let repo = JsonFileItemRepository::open(&path).unwrap();
  let wf = Workflow::from_names("basica", &["Design", "Corte"]).unwrap();
  let item = prod_domain::OrderItem::new("ORD-2", &wf, 10, Priority::Low, due(), Utc::now()).unwrap();
  repo.insert_item(&item).unwrap();
  let before = fs::read(&path).unwrap();

  let mut changed = item.clone();
  changed.priority = Priority::High;
  assert_eq!(repo.save_item(&changed, 7).unwrap(), PersistResult::Conflict);
  assert_eq!(fs::read(&path).unwrap(), before);
  assert_eq!(repo.load_item(&item.id).unwrap().priority, Priority::Low);

  assert_eq!(repo.save_item(&changed, 0).unwrap(), PersistResult::Ok { new_version: 1 });
  let reopened = JsonFileItemRepository::open(&path).unwrap();
  assert_eq!(reopened.load_item(&item.id).unwrap().priority, Priority::High);
}

#[test]
fn missing_file_is_created_on_first_write() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("nested").join("data").join("p.json");
  let repo = Arc::new(JsonFileItemRepository::open(&path).unwrap());
  assert!(!path.exists());
  assert!(repo.list_items().unwrap().is_empty());

  let svc = service(repo.clone());
  svc.create_item("ORD-3", "basica", 4, Priority::Medium, due()).unwrap();
  assert!(path.exists());
  assert_eq!(repo.path(), path.as_path());
  let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap()
                                                              .filter_map(|e| e.ok())
                                                              .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
                                                              .collect();
  assert!(leftovers.is_empty());
}

#[test]
fn failed_validation_writes_nothing() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("p.json");
  let svc = service(Arc::new(JsonFileItemRepository::open(&path).unwrap()));
  let item = svc.create_item("ORD-4", "basica", 10, Priority::Medium, due()).unwrap();
  let before = fs::read(&path).unwrap();

  let req = TransitionRequest::new(item.id, TransitionAction::Advance, 11, "demasiado", "est-design", Operator::new("op"));
  assert!(matches!(svc.apply_transition(&req), Err(FlowError::InsufficientQuantity { .. })));
  assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn corrupt_file_is_storage_error() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("roto.json");
  fs::write(&path, "{ esto no es json").unwrap();
  assert!(matches!(JsonFileItemRepository::open(&path), Err(FlowError::Storage(_))));
}

#[test]
fn new_from_env_uses_prod_data_file() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("env.json");
  std::env::set_var("PROD_DATA_FILE", &path);
  let repo = new_from_env().unwrap();
  assert_eq!(repo.path(), path.as_path());
}

#[test]
fn second_writer_on_same_file_is_not_overwritten() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("compartido.json");
  let a = JsonFileItemRepository::open(&path).unwrap();
  let b = JsonFileItemRepository::open(&path).unwrap();
  let wf = Workflow::from_names("basica", &["Design", "Corte"]).unwrap();
  let item = prod_domain::OrderItem::new("ORD-5", &wf, 10, Priority::Low, due(), Utc::now()).unwrap();

  a.insert_item(&item).unwrap();
  assert_eq!(b.load_item(&item.id).unwrap().order_id, "ORD-5");

  let mut from_b = item.clone();
  from_b.priority = Priority::High;
  assert_eq!(b.save_item(&from_b, 0).unwrap(), PersistResult::Ok { new_version: 1 });

  // `a` todavía cree que la versión es 0: debe ver el cambio y no pisarlo
  let mut from_a = item.clone();
  from_a.priority = Priority::Medium;
  assert_eq!(a.save_item(&from_a, 0).unwrap(), PersistResult::Conflict);
  assert_eq!(a.load_item(&item.id).unwrap().priority, Priority::High);

  let reopened = JsonFileItemRepository::open(&path).unwrap();
  let stored = reopened.load_item(&item.id).unwrap();
  assert_eq!(stored.priority, Priority::High);
  assert_eq!(stored.version, 1);
}
