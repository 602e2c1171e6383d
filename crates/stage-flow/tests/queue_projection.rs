use chrono::NaiveDate;
use prod_domain::{Priority, StageDefinition, TransitionAction, Workflow};
use stage_flow::{ErrorKind, InMemoryItemRepository, LoadLevel, Operator, ProductionService, StageCatalog, SystemClock,
                 TransitionEngineConfig, TransitionRequest};
use std::sync::Arc;
use uuid::Uuid;

fn service() -> ProductionService<InMemoryItemRepository> {
  let stages = vec![StageDefinition::new("Design", 0),
                    StageDefinition::new("Corte", 1).with_capacity(100),
                    StageDefinition::new("QC", 2).with_capacity(20)];
  let wf = Workflow::new("basica", "básica", 1, stages).unwrap();
  let other = Workflow::from_names("sublimado", &["Design", "Impresión", "Corte"]).unwrap();
  let catalog = Arc::new(StageCatalog::from_workflows(vec![wf, other]).unwrap());
  ProductionService::new(Arc::new(InMemoryItemRepository::new()),
                         catalog,
                         Arc::new(SystemClock),
                         TransitionEngineConfig::default())
}

fn date(d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
}

fn advance(svc: &ProductionService<InMemoryItemRepository>, item: Uuid, qty: u32) {
  svc.apply_transition(&TransitionRequest::new(item, TransitionAction::Advance, qty, "avance", "st", Operator::new("op")))
     .unwrap();
}

#[test]
fn equal_priority_orders_by_due_date() {
  let svc = service();
  let later = svc.create_item("ORD-LATE", "basica", 10, Priority::Medium, date(25)).unwrap();
  let sooner = svc.create_item("ORD-SOON", "basica", 10, Priority::Medium, date(20)).unwrap();
  advance(&svc, later.id, 10);
  advance(&svc, sooner.id, 10);

  let queue = svc.queue_for_stage("basica", "Corte").unwrap();
  assert_eq!(queue.len(), 2);
  assert_eq!(queue[0].item.id, sooner.id);
  assert_eq!(queue[1].item.id, later.id);
}

#[test]
fn priority_dominates_due_date_and_ids_break_ties() {
  let svc = service();
  let low = svc.create_item("ORD-LOW", "basica", 5, Priority::Low, date(18)).unwrap();
  let high = svc.create_item("ORD-HIGH", "basica", 5, Priority::High, date(30)).unwrap();
  let tie_a = svc.create_item("ORD-T1", "basica", 5, Priority::Medium, date(22)).unwrap();
  let tie_b = svc.create_item("ORD-T2", "basica", 5, Priority::Medium, date(22)).unwrap();

  let queue = svc.queue_for_stage("basica", "Design").unwrap();
  let ids: Vec<Uuid> = queue.iter().map(|e| e.item.id).collect();
  let (first_tie, second_tie) = if tie_a.id < tie_b.id { (tie_a.id, tie_b.id) } else { (tie_b.id, tie_a.id) };
  assert_eq!(ids, vec![high.id, first_tie, second_tie, low.id]);

  // la proyección es determinista
  let again: Vec<Uuid> = svc.queue_for_stage("basica", "Design").unwrap().iter().map(|e| e.item.id).collect();
  assert_eq!(ids, again);
}

#[test]
fn queue_reports_only_quantity_at_the_stage() {
  let svc = service();
  let item = svc.create_item("ORD-SPLIT", "basica", 50, Priority::High, date(21)).unwrap();
  advance(&svc, item.id, 30);

  let design = svc.queue_for_stage("basica", "Design").unwrap();
  let corte = svc.queue_for_stage("basica", "Corte").unwrap();
  assert_eq!(design[0].quantity_at_stage, 20);
  assert_eq!(corte[0].quantity_at_stage, 30);
  assert!(svc.queue_for_stage("basica", "QC").unwrap().is_empty());
  assert!(svc.queue_for_stage("sublimado", "Corte").unwrap().is_empty());
}

#[test]
fn completed_items_leave_the_queue() {
  let svc = service();
  let item = svc.create_item("ORD-DONE", "basica", 5, Priority::High, date(21)).unwrap();
  advance(&svc, item.id, 5);
  advance(&svc, item.id, 5);
  assert!(svc.queue_for_stage("basica", "QC").unwrap().is_empty());
}

#[test]
fn unknown_stage_or_workflow_is_not_found() {
  let svc = service();
  assert_eq!(svc.queue_for_stage("basica", "Planchado").unwrap_err().kind(), ErrorKind::NotFound);
  assert_eq!(svc.queue_for_stage("premium", "Design").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn station_load_flags_bottlenecks() {
  let svc = service();
  let a = svc.create_item("ORD-A", "basica", 80, Priority::Medium, date(24)).unwrap();
  let b = svc.create_item("ORD-B", "basica", 15, Priority::Medium, date(24)).unwrap();
  advance(&svc, a.id, 80);
  advance(&svc, b.id, 15);
  let c = svc.create_item("ORD-C", "basica", 10, Priority::Medium, date(24)).unwrap();
  advance(&svc, c.id, 10);
  advance(&svc, c.id, 10);
  // c queda completado en QC y no cuenta

  let load = svc.station_load("basica").unwrap();
  assert_eq!(load.len(), 3);
  assert_eq!(load[0].stage, "Design");
  assert_eq!(load[0].utilization, None);
  assert_eq!(load[0].level, LoadLevel::Normal);
  assert_eq!(load[1].quantity, 95);
  assert_eq!(load[1].items, 2);
  assert_eq!(load[1].utilization, Some(95));
  assert_eq!(load[1].level, LoadLevel::Critical);
  assert_eq!(load[2].quantity, 0);

  let bottlenecks = svc.bottlenecks("basica").unwrap();
  assert_eq!(bottlenecks.len(), 1);
  assert_eq!(bottlenecks[0].stage, "Corte");
}

#[test]
fn warning_level_above_three_quarters() {
  let svc = service();
  let a = svc.create_item("ORD-A", "basica", 80, Priority::Medium, date(24)).unwrap();
  advance(&svc, a.id, 80);
  let load = svc.station_load("basica").unwrap();
  assert_eq!(load[1].utilization, Some(80));
  assert_eq!(load[1].level, LoadLevel::Warning);
}

#[test]
fn station_load_counts_every_workflow_sharing_the_station() {
  let svc = service();
  let a = svc.create_item("ORD-A", "basica", 60, Priority::Medium, date(24)).unwrap();
  advance(&svc, a.id, 60);
  let s = svc.create_item("ORD-S", "sublimado", 40, Priority::Medium, date(24)).unwrap();
  advance(&svc, s.id, 40);
  // 10 quedan en Impresión, el item sigue abierto
  advance(&svc, s.id, 30);

  // la cola sigue siendo del workflow, la carga es de la estación
  assert_eq!(svc.queue_for_stage("basica", "Corte").unwrap().len(), 1);
  let load = svc.station_load("basica").unwrap();
  assert_eq!(load[1].quantity, 90);
  assert_eq!(load[1].items, 2);
  assert_eq!(load[1].utilization, Some(90));
  assert_eq!(load[1].level, LoadLevel::Warning);
}
