use chrono::NaiveDate;
use log::info;
use prod_domain::{Priority, TransitionAction};
use prod_persistence::JsonFileItemRepository;
use prod_workflow::{ProductionConfig, WorkflowFactory};
use stage_flow::{Operator, ProductionService, SystemClock, TransitionRequest};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use uuid::Uuid;

/// Consola interactiva de estación sobre el almacén JSON configurado en
/// `PROD_DATA_FILE`.
///
/// Opciones soportadas:
/// 1) Ver items
/// 2) Crear item
/// 3) Aplicar transición
/// 4) Ver cola de una estación
/// 5) Historial de un item
/// 6) Historial de una estación
/// 7) Carga de estaciones y cuellos de botella
/// 8) Verificar ledger de un item
/// 9) Cambiar prioridad o fecha de entrega
/// 0) Salir
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ProductionConfig::from_env()?;
    let catalog = Arc::new(WorkflowFactory::catalog_from_config(&config)?);
    let repo = Arc::new(JsonFileItemRepository::open(&config.data_file)?);
    let service = ProductionService::new(repo, catalog, Arc::new(SystemClock), config.engine_config());
    info!("prod-cli listo sobre {}", config.data_file.display());

    match run(&service) {
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            println!("\nEntrada cerrada. Saliendo...");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

/// Bucle del menú. Termina con `UnexpectedEof` si se cierra la entrada.
fn run(service: &ProductionService<JsonFileItemRepository>) -> io::Result<()> {
    loop {
        println!("\n== Consola de producción ==");
        println!("1) Ver items");
        println!("2) Crear item");
        println!("3) Aplicar transición");
        println!("4) Ver cola de una estación");
        println!("5) Historial de un item");
        println!("6) Historial de una estación");
        println!("7) Carga de estaciones y cuellos de botella");
        println!("8) Verificar ledger de un item");
        println!("9) Cambiar prioridad o fecha de entrega");
        println!("0) Salir");
        let choice = prompt("Elige una opción: ")?;
        match choice.trim() {
            "1" => match service.list_items() {
                Ok(items) => {
                    println!("\nID                                   | PEDIDO     | WORKFLOW   | ESTADO      | PRIO   | ENTREGA    | ETAPAS");
                    println!("--------------------------------------------------------------------------------------------------------------");
                    for it in items {
                        let stages: Vec<String> = it.quantity_by_stage.iter().map(|(s, q)| format!("{}={}", s, q)).collect();
                        println!("{} | {:<10} | {:<10} | {:<11} | {:<6} | {} | {}",
                                 it.id,
                                 it.order_id,
                                 it.workflow_id,
                                 it.status,
                                 it.priority,
                                 it.due_date,
                                 stages.join(", "));
                    }
                }
                Err(e) => eprintln!("Error listando items: {}", e),
            },
            "2" => {
                println!("Workflows: {}", service.catalog().workflow_ids().collect::<Vec<_>>().join(", "));
                let workflow = prompt("Workflow: ")?;
                let order = prompt("Pedido (order id): ")?;
                let qty = match prompt("Cantidad: ")?.trim().parse::<u32>() {
                    Ok(n) => n,
                    Err(_) => {
                        eprintln!("Cantidad inválida");
                        continue;
                    }
                };
                let priority = match prompt("Prioridad (low/medium/high): ")?.parse::<Priority>() {
                    Ok(p) => p,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };
                let Some(due) = read_date("Fecha de entrega (AAAA-MM-DD): ")? else { continue };
                match service.create_item(order.trim(), workflow.trim(), qty, priority, due) {
                    Ok(item) => println!("Item creado: {}", item.id),
                    Err(e) => eprintln!("Error creando item: {}", e),
                }
            }
            "3" => {
                let Some(item_id) = read_uuid("Item id (UUID): ")? else { continue };
                let action = match prompt("Acción (advance/reject/hold/resume): ")?.parse::<TransitionAction>() {
                    Ok(a) => a,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };
                let qty = match prompt("Cantidad: ")?.trim().parse::<u32>() {
                    Ok(n) => n,
                    Err(_) => {
                        eprintln!("Cantidad inválida");
                        continue;
                    }
                };
                let stage = prompt("Etapa (enter para la primera con piezas): ")?;
                let notes = prompt("Notas: ")?;
                let station = prompt("Estación: ")?;
                let operator_id = prompt("Operador: ")?;
                let roles = prompt("Roles del operador (separados por coma): ")?;
                let roles: Vec<&str> = roles.split(',').map(str::trim).filter(|r| !r.is_empty()).collect();
                let operator = Operator::with_roles(operator_id.trim(), &roles);
                let mut request = TransitionRequest::new(item_id, action, qty, &notes, station.trim(), operator);
                if !stage.trim().is_empty() {
                    request = request.at_stage(stage.trim());
                }
                match service.apply_transition(&request) {
                    Ok(record) => println!("Transición registrada: {}", record),
                    Err(e) => eprintln!("Transición rechazada ({:?}): {}", e.kind(), e),
                }
            }
            "4" => {
                let workflow = prompt("Workflow: ")?;
                let stage = prompt("Etapa: ")?;
                match service.queue_for_stage(workflow.trim(), stage.trim()) {
                    Ok(queue) if queue.is_empty() => println!("Cola vacía"),
                    Ok(queue) => {
                        for (pos, e) in queue.iter().enumerate() {
                            println!("{:>3}. {} {} x{} prio={} entrega={}",
                                     pos + 1,
                                     e.item.id,
                                     e.item.order_id,
                                     e.quantity_at_stage,
                                     e.item.priority,
                                     e.item.due_date);
                        }
                    }
                    Err(e) => eprintln!("Error consultando cola: {}", e),
                }
            }
            "5" => {
                let Some(item_id) = read_uuid("Item id (UUID): ")? else { continue };
                match service.history(&item_id) {
                    Ok(records) => {
                        for r in &records {
                            println!("{}", r);
                        }
                        if let Ok(s) = service.summary_counts(&item_id) {
                            println!("avances={} rechazos={} pausas={} reanudaciones={}",
                                     s.advanced, s.rejected, s.held, s.resumed);
                        }
                    }
                    Err(e) => eprintln!("Error leyendo historial: {}", e),
                }
            }
            "6" => {
                let station = prompt("Estación: ")?;
                match service.station_history(station.trim()) {
                    Ok(records) if records.is_empty() => println!("Sin registros para {}", station.trim()),
                    Ok(records) => {
                        for r in records {
                            println!("{}", r);
                        }
                    }
                    Err(e) => eprintln!("Error leyendo historial: {}", e),
                }
            }
            "7" => {
                let workflow = prompt("Workflow: ")?;
                match service.station_load(workflow.trim()) {
                    Ok(loads) => {
                        for l in loads {
                            let cap = l.capacity.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
                            let util = l.utilization.map(|u| format!("{}%", u)).unwrap_or_else(|| "-".into());
                            println!("{:<12} piezas={:<5} items={:<4} capacidad={:<5} uso={:<6} {:?}",
                                     l.stage, l.quantity, l.items, cap, util, l.level);
                        }
                    }
                    Err(e) => {
                        eprintln!("Error calculando carga: {}", e);
                        continue;
                    }
                }
                match service.bottlenecks(workflow.trim()) {
                    Ok(b) if b.is_empty() => println!("Sin cuellos de botella"),
                    Ok(b) => {
                        let names: Vec<String> = b.iter().map(|l| format!("{} ({:?})", l.stage, l.level)).collect();
                        println!("Cuellos de botella: {}", names.join(", "));
                    }
                    Err(e) => eprintln!("Error calculando cuellos de botella: {}", e),
                }
            }
            "8" => {
                let Some(item_id) = read_uuid("Item id (UUID): ")? else { continue };
                match service.verify_chain(&item_id) {
                    Ok(()) => println!("Cadena de registros íntegra"),
                    Err(e) => eprintln!("Cadena rota: {}", e),
                }
                match service.check_consistency(&item_id) {
                    Ok(report) if report.consistent => println!("Estado coincide con el historial"),
                    Ok(report) => println!("Divergencia: guardado {:?} vs reproducido {:?}", report.stored, report.replayed),
                    Err(e) => eprintln!("Error reproduciendo historial: {}", e),
                }
            }
            "9" => {
                let Some(item_id) = read_uuid("Item id (UUID): ")? else { continue };
                let prio = prompt("Nueva prioridad (enter para no cambiar): ")?;
                if !prio.trim().is_empty() {
                    match prio.parse::<Priority>() {
                        Ok(p) => match service.set_priority(&item_id, p) {
                            Ok(it) => println!("Prioridad de {} ahora {}", it.id, it.priority),
                            Err(e) => eprintln!("Error cambiando prioridad: {}", e),
                        },
                        Err(e) => eprintln!("{}", e),
                    }
                }
                let due = prompt("Nueva fecha AAAA-MM-DD (enter para no cambiar): ")?;
                if !due.trim().is_empty() {
                    match NaiveDate::parse_from_str(due.trim(), "%Y-%m-%d") {
                        Ok(d) => match service.set_due_date(&item_id, d) {
                            Ok(it) => println!("Entrega de {} ahora {}", it.id, it.due_date),
                            Err(e) => eprintln!("Error cambiando fecha: {}", e),
                        },
                        Err(_) => eprintln!("Fecha inválida"),
                    }
                }
            }
            "0" => {
                println!("Saliendo...");
                return Ok(());
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    read_answer(&mut io::stdin().lock())
}

/// Lee una línea sin el salto final. Cero bytes leídos es fin de entrada.
fn read_answer<R: BufRead>(input: &mut R) -> io::Result<String> {
    let mut s = String::new();
    if input.read_line(&mut s)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "entrada cerrada"));
    }
    Ok(s.trim_end_matches(['\r', '\n']).to_string())
}

fn read_uuid(msg: &str) -> io::Result<Option<Uuid>> {
    let raw = prompt(msg)?;
    match Uuid::parse_str(raw.trim()) {
        Ok(u) => Ok(Some(u)),
        Err(_) => {
            eprintln!("UUID inválido");
            Ok(None)
        }
    }
}

fn read_date(msg: &str) -> io::Result<Option<NaiveDate>> {
    let raw = prompt(msg)?;
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(d) => Ok(Some(d)),
        Err(_) => {
            eprintln!("Fecha inválida");
            Ok(None)
        }
    }
}
