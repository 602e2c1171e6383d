// Archivo: clock.rs
// Propósito: colaboradores de reloj e identidad usados para sellar cada
// registro de auditoría.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Fuente de tiempo inyectable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reloj del sistema.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Reloj controlable para pruebas y demos: devuelve siempre el instante
/// fijado hasta que se avanza explícitamente.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: Mutex::new(start) }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Identidad del operador que solicita la transición.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Operator {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), roles: Vec::new() }
    }

    pub fn with_roles(id: &str, roles: &[&str]) -> Self {
        Self { id: id.to_string(), roles: roles.iter().map(|r| r.to_string()).collect() }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
