//! # Servicio de Jobs
//! src/jobs/manager.rs
//!
//! Orquesta registro, ejecutor y supervisor. Expone las operaciones
//! públicas del motor de análisis:
//!
//! - `submit`: modo asíncrono, retorna el ID de inmediato
//! - `submit_and_wait`: modo síncrono, bloquea hasta un estado terminal
//! - `query_progress` / `query_all`: snapshots del estado actual
//! - `history`: jobs completados, del más reciente al más antiguo
//!
//! En modo asíncrono no hay supervisor corriendo: cada consulta refresca
//! el job a partir del tiempo transcurrido (progreso estimado, heartbeat
//! cada `poll_interval` y timeout al agotar el presupuesto).

use crate::analysis::AnalysisRoutine;
use crate::error::{JobError, JobResult};
use crate::jobs::executor::{CompletionChannel, JobExecutor};
use crate::jobs::job::JobHandle;
use crate::jobs::storage::JobRegistry;
use crate::jobs::supervisor::{
    heartbeat_message, progress_for_elapsed, Outcome, TimeoutSupervisor, WaitCancel,
};
use crate::jobs::types::{JobRecord, JobStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// ID del registro de ejemplo del historial
pub const SAMPLE_ID: &str = "sample-analysis";

/// Intentos de sufijo ante IDs repetidos en el mismo segundo
const MAX_ID_ATTEMPTS: usize = 1000;

/// Configuración del servicio
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Presupuesto total de espera por análisis
    pub total_budget: Duration,

    /// Intervalo entre heartbeats
    pub poll_interval: Duration,

    /// Mostrar un registro de ejemplo si no hay historial
    pub history_sample: bool,

    /// Las credenciales del proveedor LLM están configuradas
    pub credentials_ready: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            total_budget: Duration::from_secs(480),
            poll_interval: Duration::from_secs(15),
            history_sample: true,
            credentials_ready: true,
        }
    }
}

/// Servicio central de jobs
pub struct JobService {
    config: ServiceConfig,
    registry: JobRegistry,
    routine: Arc<dyn AnalysisRoutine>,
    supervisor: TimeoutSupervisor,
}

impl JobService {
    pub fn new(config: ServiceConfig, registry: JobRegistry, routine: Arc<dyn AnalysisRoutine>) -> Self {
        let supervisor = TimeoutSupervisor::new(config.total_budget, config.poll_interval);
        Self {
            config,
            registry,
            routine,
            supervisor,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Encola un análisis y retorna su ID sin esperar
    pub fn submit(&self, symbol: &str, date: &str) -> JobResult<String> {
        let handle = self.create_record(symbol, date, Utc::now())?;
        self.launch(&handle, symbol, date, "async")?;
        handle.update(|r| r.push_message("📡 Analysis running in background, poll for progress"));
        Ok(handle.id().to_string())
    }

    /// Ejecuta un análisis y espera su resultado (o el timeout)
    pub fn submit_and_wait(&self, symbol: &str, date: &str) -> JobResult<JobRecord> {
        self.submit_and_wait_with_cancel(symbol, date, &WaitCancel::new())
    }

    /// Igual que `submit_and_wait`, pero la espera se puede abandonar
    /// con `cancel`. El análisis no se interrumpe.
    pub fn submit_and_wait_with_cancel(
        &self,
        symbol: &str,
        date: &str,
        cancel: &WaitCancel,
    ) -> JobResult<JobRecord> {
        if !self.config.credentials_ready {
            tracing::warn!(symbol, date, "Rejected analysis: credentials not configured");
            return Err(JobError::Configuration(
                "API credentials for the configured LLM provider are missing or placeholders"
                    .to_string(),
            ));
        }

        let handle = self.create_record(symbol, date, Utc::now())?;
        let channel = self.launch(&handle, symbol, date, "sync")?;
        handle.update(|r| {
            r.push_message(format!(
                "⏳ Waiting up to {}s for the analysis to finish",
                self.config.total_budget.as_secs()
            ))
        });

        let outcome = self.supervisor.await_with_timeout(&channel, &handle, cancel);
        self.apply_outcome(&handle, outcome);

        Ok(handle.snapshot())
    }

    /// Estado actual de un job
    pub fn query_progress(&self, id: &str) -> JobResult<JobRecord> {
        let handle = self.registry.get(id)?;
        self.refresh(&handle);
        Ok(handle.snapshot())
    }

    /// Estado actual de todos los jobs, en orden de creación
    pub fn query_all(&self) -> Vec<JobRecord> {
        self.registry
            .list()
            .iter()
            .map(|handle| {
                self.refresh(handle);
                handle.snapshot()
            })
            .collect()
    }

    /// Jobs completados, del más reciente al más antiguo
    ///
    /// Sin jobs completados (y con `history_sample`) retorna un único
    /// registro de ejemplo marcado con `is_sample`.
    pub fn history(&self, limit: usize) -> Vec<JobRecord> {
        if limit == 0 {
            return Vec::new();
        }

        let mut completed: Vec<JobRecord> = self
            .registry
            .snapshots()
            .into_iter()
            .filter(|r| r.status == JobStatus::Completed)
            .collect();

        if completed.is_empty() {
            return if self.config.history_sample {
                vec![sample_record()]
            } else {
                Vec::new()
            };
        }

        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        completed.truncate(limit);
        completed
    }

    /// Crea el registro del job. Si el ID ya existe (mismo símbolo, fecha
    /// y segundo) se prueba con sufijos `-2`, `-3`, ...
    fn create_record(&self, symbol: &str, date: &str, at: DateTime<Utc>) -> JobResult<JobHandle> {
        let base = generate_job_id(symbol, date, at);
        let mut last_err = None;

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            match self.registry.create(&id, symbol, date) {
                Ok(handle) => return Ok(handle),
                Err(err @ JobError::DuplicateId(_)) => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(JobError::DuplicateId(base)))
    }

    fn launch(
        &self,
        handle: &JobHandle,
        symbol: &str,
        date: &str,
        mode: &str,
    ) -> JobResult<CompletionChannel> {
        tracing::info!(job_id = handle.id(), symbol, date, mode, "Analysis submitted");

        JobExecutor::execute(
            symbol,
            date,
            Arc::clone(&self.routine),
            handle.clone(),
            self.config.total_budget,
        )
        .map_err(|e| {
            handle.update(|r| r.mark_failed(e.to_string()));
            e
        })
    }

    /// Aplica el resultado de la espera síncrona al registro
    fn apply_outcome(&self, handle: &JobHandle, outcome: Outcome) {
        let (applied, status) = match outcome {
            Outcome::Success { result, decision } => {
                (handle.update(|r| r.mark_completed(result, decision)), JobStatus::Completed)
            }
            Outcome::Failure(error) => (handle.update(|r| r.mark_failed(error)), JobStatus::Failed),
            Outcome::TimedOut { elapsed } => {
                let error = JobError::Timeout {
                    elapsed_secs: elapsed.as_secs(),
                }
                .to_string();
                (handle.update(|r| r.mark_timeout(error)), JobStatus::Timeout)
            }
            Outcome::Abandoned => {
                let error = "Analysis abandoned: the caller stopped waiting".to_string();
                (handle.update(|r| r.mark_timeout(error)), JobStatus::Timeout)
            }
        };

        let snapshot = handle.snapshot();
        if applied {
            tracing::info!(
                job_id = handle.id(),
                status = %status,
                duration_secs = snapshot.duration.unwrap_or_default(),
                "Job finished"
            );
        } else {
            tracing::debug!(
                job_id = handle.id(),
                status = %snapshot.status,
                "Job already finished, outcome not applied"
            );
        }
    }

    /// Actualiza un job en curso a partir del tiempo transcurrido
    fn refresh(&self, handle: &JobHandle) {
        let budget = self.config.total_budget;
        let interval = self.config.poll_interval;
        let now = Utc::now();

        let timed_out = handle.update(|r| {
            if r.is_terminal() {
                return None;
            }

            let elapsed = r.elapsed(now);
            if elapsed >= budget {
                let error = JobError::Timeout {
                    elapsed_secs: elapsed.as_secs(),
                }
                .to_string();
                r.mark_timeout(error);
                return Some(elapsed);
            }

            let (progress, stage) = progress_for_elapsed(elapsed, budget);
            if r.since_last_heartbeat(now) >= interval {
                r.record_heartbeat(stage, progress, heartbeat_message(elapsed));
            } else {
                r.advance(stage, progress);
            }
            None
        });

        if let Some(elapsed) = timed_out {
            tracing::warn!(
                job_id = handle.id(),
                elapsed_secs = elapsed.as_secs(),
                "Analysis exceeded time budget"
            );
        }
    }
}

/// ID legible: `{SYMBOL}_{date}_{YYYYMMDDHHMMSS}`
pub fn generate_job_id(symbol: &str, date: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}_{}", symbol, date, at.format("%Y%m%d%H%M%S"))
}

/// Registro de ejemplo para un historial vacío
pub fn sample_record() -> JobRecord {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let mut record = JobRecord::new(SAMPLE_ID.to_string(), "AAPL".to_string(), today);
    record.mark_completed(
        Some(
            "[SAMPLE] This is an example analysis. Run an analysis to see real results here."
                .to_string(),
        ),
        Some("HOLD".to_string()),
    );
    record.is_sample = true;
    record
}
