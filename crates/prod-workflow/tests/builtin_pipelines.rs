use chrono::{NaiveDate, TimeZone, Utc};
use prod_domain::{ItemStatus, Priority, TransitionAction};
use prod_workflow::{ProductionConfig, WorkflowError, WorkflowFactory};
use stage_flow::errors::FlowError;
use stage_flow::{CapacityPolicy, FixedClock, InMemoryItemRepository, Operator, ProductionService, TransitionRequest};
use std::sync::Arc;

fn service(cfg: &ProductionConfig) -> Result<ProductionService<InMemoryItemRepository>, WorkflowError> {
  let catalog = Arc::new(WorkflowFactory::catalog_from_config(cfg)?);
  let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 10, 1, 8, 0, 0).unwrap()));
  Ok(ProductionService::new(Arc::new(InMemoryItemRepository::new()), catalog, clock, cfg.engine_config()))
}

fn due() -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 10, 20).unwrap()
}

#[test]
fn sublimado_item_walks_every_stage() -> Result<(), WorkflowError> {
  let svc = service(&ProductionConfig::default())?;
  let item = svc.create_item("ORD-7", "sublimado", 12, Priority::Medium, due())?;
  let op = Operator::new("op-1");
  let stages = ["Design", "Impresión", "Planchado", "Corte", "Confección", "QC"];
  for stage in stages {
    let req = TransitionRequest::new(item.id, TransitionAction::Advance, 12, "lote completo", stage, op.clone());
    svc.apply_transition(&req)?;
  }
  let done = svc.get_item(&item.id)?;
  assert_eq!(done.status, ItemStatus::Completed);
  assert_eq!(done.quantity_at("Empaquetado"), 12);
  assert_eq!(svc.history(&item.id)?.len(), 6);

  let req = TransitionRequest::new(item.id, TransitionAction::Advance, 1, "de más", "Empaquetado", op);
  assert!(matches!(svc.apply_transition(&req), Err(FlowError::ItemTerminal { .. })));
  Ok(())
}

#[test]
fn builtin_roles_are_enforced_when_configured() -> Result<(), WorkflowError> {
  let cfg = ProductionConfig { enforce_roles: true,
                               ..ProductionConfig::default() };
  let svc = service(&cfg)?;
  let item = svc.create_item("ORD-8", "basica", 10, Priority::Low, due())?;

  let cutter = Operator::with_roles("op-corte", &["corte"]);
  let req = TransitionRequest::new(item.id, TransitionAction::Advance, 10, "diseño aprobado", "est-design", cutter);
  assert!(matches!(svc.apply_transition(&req), Err(FlowError::RoleMismatch { .. })));

  let designer = Operator::with_roles("op-design", &["design"]);
  let req = TransitionRequest::new(item.id, TransitionAction::Advance, 10, "diseño aprobado", "est-design", designer);
  let record = svc.apply_transition(&req)?;
  assert_eq!(record.to_stage.as_deref(), Some("Corte"));
  Ok(())
}

#[test]
fn configured_capacity_is_hard_limit() -> Result<(), WorkflowError> {
  let cfg = ProductionConfig { capacity_policy: CapacityPolicy::Hard,
                               stage_capacity: vec![("Corte".into(), 15)],
                               ..ProductionConfig::default() };
  let svc = service(&cfg)?;
  let a = svc.create_item("ORD-1", "basica", 10, Priority::High, due())?;
  let b = svc.create_item("ORD-2", "basica", 10, Priority::High, due())?;
  let op = Operator::new("op-1");

  svc.apply_transition(&TransitionRequest::new(a.id, TransitionAction::Advance, 10, "ok", "est-design", op.clone()))?;
  let res = svc.apply_transition(&TransitionRequest::new(b.id, TransitionAction::Advance, 10, "ok", "est-design", op.clone()));
  assert!(matches!(res, Err(FlowError::CapacityExceeded { capacity: 15, occupancy: 10, requested: 10, .. })));
  svc.apply_transition(&TransitionRequest::new(b.id, TransitionAction::Advance, 5, "parcial", "est-design", op))?;

  let loads = svc.station_load("basica")?;
  let corte = loads.iter().find(|l| l.stage == "Corte").unwrap();
  assert_eq!(corte.quantity, 15);
  assert_eq!(corte.utilization, Some(100));
  Ok(())
}

#[test]
fn shared_station_capacity_spans_workflows() -> Result<(), WorkflowError> {
  let cfg = ProductionConfig { capacity_policy: CapacityPolicy::Hard,
                               stage_capacity: vec![("Corte".into(), 15)],
                               ..ProductionConfig::default() };
  let svc = service(&cfg)?;
  let op = Operator::new("op-1");
  let basica = svc.create_item("ORD-1", "basica", 10, Priority::High, due())?;
  svc.apply_transition(&TransitionRequest::new(basica.id, TransitionAction::Advance, 10, "ok", "est-design", op.clone()))?;

  let sub = svc.create_item("ORD-2", "sublimado", 10, Priority::High, due())?;
  for station in ["est-design", "est-impresion", "est-planchado"] {
    svc.apply_transition(&TransitionRequest::new(sub.id, TransitionAction::Advance, 10, "ok", station, op.clone()))?;
  }
  assert_eq!(svc.get_item(&sub.id)?.quantity_at("Planchado"), 10);

  // Corte es la misma estación física para ambos pipelines
  let res = svc.apply_transition(&TransitionRequest::new(sub.id, TransitionAction::Advance, 10, "a corte", "est-planchado", op));
  assert!(matches!(res, Err(FlowError::CapacityExceeded { capacity: 15, occupancy: 10, requested: 10, .. })));
  assert_eq!(svc.get_item(&sub.id)?.quantity_at("Planchado"), 10);

  let loads = svc.station_load("sublimado")?;
  let corte = loads.iter().find(|l| l.stage == "Corte").unwrap();
  assert_eq!(corte.quantity, 10);
  assert_eq!(corte.items, 1);
  Ok(())
}
