//! # Handle Compartido de un Job
//! src/jobs/job.rs
//!
//! Un `JobHandle` envuelve el `JobRecord` canónico en `Arc<Mutex<_>>`.
//! Lo comparten el registro, el executor y el supervisor; cada mutación
//! toma el lock del registro completo, así que un snapshot nunca mezcla
//! campos de dos momentos distintos (`status` / `result` / `error`).

use crate::jobs::types::JobRecord;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Referencia compartida a un job
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// ID del job (inmutable, se puede leer sin lock)
    id: Arc<str>,

    /// Datos mutables (protegidos por Mutex)
    data: Arc<Mutex<JobRecord>>,
}

impl JobHandle {
    pub fn new(record: JobRecord) -> Self {
        Self {
            id: Arc::from(record.id.as_str()),
            data: Arc::new(Mutex::new(record)),
        }
    }

    /// ID del job
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copia consistente del registro en este instante
    pub fn snapshot(&self) -> JobRecord {
        self.lock().clone()
    }

    /// Aplica una mutación atómica sobre el registro
    pub fn update<R>(&self, f: impl FnOnce(&mut JobRecord) -> R) -> R {
        let mut record = self.lock();
        f(&mut record)
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().is_terminal()
    }

    // Un panic a mitad de una mutación no deja el registro inválido:
    // todas las transiciones escriben campos completos.
    fn lock(&self) -> MutexGuard<'_, JobRecord> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
