use chrono::NaiveDate;
use prod_domain::{Priority, StageDefinition, TransitionAction, Workflow};
use stage_flow::errors::FlowError;
use stage_flow::{InMemoryItemRepository, Operator, ProductionService, StageCatalog, SystemClock,
                 TransitionEngineConfig, TransitionRequest};
use std::sync::Arc;

fn main() -> Result<(), FlowError> {
    // Catálogo con un pipeline corto y capacidad en Corte
    let stages = vec![StageDefinition::new("Design", 0),
                      StageDefinition::new("Corte", 1).with_capacity(80),
                      StageDefinition::new("QC", 2)];
    let workflow = Workflow::new("demo", "Demo", 1, stages)?;
    let catalog = Arc::new(StageCatalog::from_workflows(vec![workflow])?);
    let repo = Arc::new(InMemoryItemRepository::new());
    let service = ProductionService::new(repo, catalog, Arc::new(SystemClock), TransitionEngineConfig::default());

    let due = NaiveDate::from_ymd_opt(2024, 10, 20).ok_or_else(|| FlowError::Validation("fecha inválida".into()))?;
    let item = service.create_item("ORD-001", "demo", 50, Priority::High, due)?;
    println!("item creado {} -> {:?}", item.id, item.quantity_by_stage);

    let operator = Operator::new("op-1");
    // Avance parcial: 30 pasan a Corte, 20 quedan en Design
    let req = TransitionRequest::new(item.id, TransitionAction::Advance, 30, "primer lote listo", "est-design", operator.clone());
    let record = service.apply_transition(&req)?;
    println!("registro #{}: {}", record.sequence, record);

    // Rechazo de 5 unidades en Corte
    let req = TransitionRequest::new(item.id, TransitionAction::Reject, 5, "defecto de corte", "est-corte", operator.clone())
        .at_stage("Corte");
    service.apply_transition(&req)?;

    let current = service.get_item(&item.id)?;
    println!("estado actual: {} {:?} rechazadas={}", current.status, current.quantity_by_stage, current.rejected_quantity);

    for entry in service.queue_for_stage("demo", "Corte")? {
        println!("cola Corte: {} x{}", entry.item.order_id, entry.quantity_at_stage);
    }
    for load in service.station_load("demo")? {
        println!("carga {}: {} unidades ({:?})", load.stage, load.quantity, load.level);
    }

    let report = service.check_consistency(&item.id)?;
    println!("consistente: {}", report.consistent);
    service.verify_chain(&item.id)?;
    Ok(())
}
