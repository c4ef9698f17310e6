//! # Registro en Memoria de Jobs
//! src/jobs/storage.rs
//!
//! Store concurrente de jobs indexado por ID, con orden de inserción.
//! No hay persistencia: los jobs viven mientras viva el proceso.
//!
//! ## Retención
//!
//! Con `max_records > 0`, después de cada inserción se eliminan los jobs
//! *terminados* más antiguos hasta volver al límite. Los jobs en curso
//! nunca se eliminan.

use crate::error::{JobError, JobResult};
use crate::jobs::job::JobHandle;
use crate::jobs::types::JobRecord;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct RegistryData {
    jobs: HashMap<String, JobHandle>,

    /// IDs en orden de inserción
    order: Vec<String>,
}

/// Registro de jobs compartido entre threads
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<RegistryData>>,

    /// Máximo de jobs retenidos (0 = sin límite)
    max_records: usize,
}

impl JobRegistry {
    /// Crea un registro con límite de retención (0 = sin límite)
    pub fn new(max_records: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryData::default())),
            max_records,
        }
    }

    /// Crea un job nuevo en estado `starting`
    pub fn create(&self, id: &str, symbol: &str, date: &str) -> JobResult<JobHandle> {
        let handle = {
            let mut data = self.write();
            if data.jobs.contains_key(id) {
                return Err(JobError::DuplicateId(id.to_string()));
            }

            let record = JobRecord::new(id.to_string(), symbol.to_string(), date.to_string());
            let handle = JobHandle::new(record);
            data.jobs.insert(id.to_string(), handle.clone());
            data.order.push(id.to_string());
            handle
        };

        if self.max_records > 0 {
            let evicted = self.prune_terminal(self.max_records);
            if evicted > 0 {
                tracing::debug!(evicted, max_records = self.max_records, "Evicted finished jobs");
            }
        }

        Ok(handle)
    }

    /// Obtiene un job por ID
    pub fn get(&self, id: &str) -> JobResult<JobHandle> {
        self.read()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Todos los jobs en orden de inserción
    pub fn list(&self) -> Vec<JobHandle> {
        let data = self.read();
        data.order
            .iter()
            .filter_map(|id| data.jobs.get(id).cloned())
            .collect()
    }

    /// Aplica una mutación atómica al job indicado
    pub fn mutate<R>(&self, id: &str, f: impl FnOnce(&mut JobRecord) -> R) -> JobResult<R> {
        let handle = self.get(id)?;
        Ok(handle.update(f))
    }

    /// Snapshots de todos los jobs en orden de inserción
    pub fn snapshots(&self) -> Vec<JobRecord> {
        self.list().iter().map(JobHandle::snapshot).collect()
    }

    /// Número de jobs almacenados
    pub fn count(&self) -> usize {
        self.read().jobs.len()
    }

    /// Elimina los jobs terminados más antiguos hasta dejar como máximo
    /// `max_records`. Retorna cuántos se eliminaron.
    pub fn prune_terminal(&self, max_records: usize) -> usize {
        let mut data = self.write();
        let mut excess = data.order.len().saturating_sub(max_records);
        if excess == 0 {
            return 0;
        }

        let RegistryData { jobs, order } = &mut *data;
        let before = order.len();
        order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let finished = jobs.get(id).map(JobHandle::is_terminal).unwrap_or(true);
            if finished {
                jobs.remove(id);
                excess -= 1;
                false
            } else {
                true
            }
        });

        before - order.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
