//! # Ejecutor de Jobs
//! src/jobs/executor.rs
//!
//! Lanza la rutina de análisis en un thread independiente y publica su
//! resultado por un canal de un solo mensaje.
//!
//! El thread queda desacoplado: si nadie espera el canal, sigue corriendo
//! hasta que la rutina termine. No hay forma de interrumpir la rutina.
//! Antes de publicar, el thread escribe el resultado normalizado en el
//! registro del job; si el job ya es terminal (ej: timeout) la escritura
//! se ignora. Un resultado que llega después del presupuesto de tiempo
//! deja el job en `timeout`, aunque nadie haya consultado su progreso.

use crate::analysis::AnalysisRoutine;
use crate::error::{JobError, JobResult};
use crate::jobs::job::JobHandle;
use crate::jobs::normalizer::{normalize_decision, normalize_result};
use crate::jobs::supervisor::{BASE_PROGRESS, STAGES};
use crate::jobs::types::JobRecord;
use chrono::Utc;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Mensaje publicado por el ejecutor
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Resultado y decisión ya normalizados
    Success {
        result: Option<String>,
        decision: Option<String>,
    },
    Failure(String),
}

impl Completion {
    /// Escribe el resultado en el registro. Retorna `false` si el job ya
    /// estaba en un estado terminal.
    pub fn apply(&self, record: &mut JobRecord) -> bool {
        match self {
            Completion::Success { result, decision } => {
                record.mark_completed(result.clone(), decision.clone())
            }
            Completion::Failure(error) => record.mark_failed(error.clone()),
        }
    }
}

/// Resultado de una espera sobre el canal
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelPoll {
    Delivered(Completion),

    /// Todavía no hay mensaje
    Pending,

    /// El emisor desapareció sin publicar (o el mensaje ya se consumió)
    Disconnected,
}

/// Extremo receptor del canal de un solo mensaje
#[derive(Debug)]
pub struct CompletionChannel {
    receiver: Receiver<Completion>,
}

impl CompletionChannel {
    /// Espera hasta `timeout` por el mensaje
    pub fn wait(&self, timeout: Duration) -> ChannelPoll {
        match self.receiver.recv_timeout(timeout) {
            Ok(completion) => ChannelPoll::Delivered(completion),
            Err(RecvTimeoutError::Timeout) => ChannelPoll::Pending,
            Err(RecvTimeoutError::Disconnected) => ChannelPoll::Disconnected,
        }
    }

    /// Consulta sin bloquear
    pub fn try_take(&self) -> ChannelPoll {
        match self.receiver.try_recv() {
            Ok(completion) => ChannelPoll::Delivered(completion),
            Err(TryRecvError::Empty) => ChannelPoll::Pending,
            Err(TryRecvError::Disconnected) => ChannelPoll::Disconnected,
        }
    }
}

/// Lanza ejecuciones de la rutina de análisis
pub struct JobExecutor;

impl JobExecutor {
    /// Inicia `routine.run(symbol, date)` en un thread nuevo y retorna de
    /// inmediato con el canal de resultado. `budget` se cuenta desde
    /// `started_at` del registro.
    pub fn execute(
        symbol: &str,
        date: &str,
        routine: Arc<dyn AnalysisRoutine>,
        record: JobHandle,
        budget: Duration,
    ) -> JobResult<CompletionChannel> {
        // Capacidad 1: el único envío nunca bloquea al thread
        let (sender, receiver) = mpsc::sync_channel(1);
        let symbol = symbol.to_string();
        let date = date.to_string();

        thread::Builder::new()
            .name(format!("analysis-{}", record.id()))
            .spawn(move || run_job(&symbol, &date, routine, record, budget, sender))
            .map_err(|e| JobError::Execution(format!("failed to spawn analysis thread: {}", e)))?;

        Ok(CompletionChannel { receiver })
    }
}

/// Cuerpo del thread de análisis
fn run_job(
    symbol: &str,
    date: &str,
    routine: Arc<dyn AnalysisRoutine>,
    record: JobHandle,
    budget: Duration,
    sender: SyncSender<Completion>,
) {
    let start = Instant::now();
    tracing::info!(job_id = record.id(), symbol, date, "Analysis started");

    record.update(|r| {
        r.mark_analyzing(
            STAGES[0].1,
            BASE_PROGRESS,
            format!("🔍 Running multi-agent analysis for {} on {}", symbol, date),
        )
    });

    let completion = match panic::catch_unwind(AssertUnwindSafe(|| routine.run(symbol, date))) {
        Ok(Ok(output)) => Completion::Success {
            result: normalize_result(&output.result),
            decision: normalize_decision(&output.decision),
        },
        Ok(Err(e)) => Completion::Failure(e.to_string()),
        Err(payload) => Completion::Failure(format!(
            "analysis routine panicked: {}",
            panic_message(payload.as_ref())
        )),
    };

    let elapsed_secs = start.elapsed().as_secs_f64();
    match &completion {
        Completion::Success { decision, .. } => tracing::info!(
            job_id = record.id(),
            elapsed_secs,
            decision = decision.as_deref().unwrap_or("-"),
            "Analysis finished"
        ),
        Completion::Failure(error) => tracing::error!(
            job_id = record.id(),
            elapsed_secs,
            error = %error,
            "Analysis failed"
        ),
    }

    let (applied, overrun) = record.update(|r| {
        let elapsed = r.elapsed(Utc::now());
        if elapsed > budget {
            let error = JobError::Timeout {
                elapsed_secs: elapsed.as_secs(),
            }
            .to_string();
            (r.mark_timeout(error), Some(elapsed))
        } else {
            (completion.apply(r), None)
        }
    });

    match (applied, overrun) {
        (true, Some(elapsed)) => tracing::warn!(
            job_id = record.id(),
            elapsed_secs = elapsed.as_secs(),
            "Analysis finished after its time budget, result discarded"
        ),
        (false, _) => tracing::debug!(
            job_id = record.id(),
            status = %record.snapshot().status,
            "Late delivery ignored, job already finished"
        ),
        (true, None) => {}
    }

    // Si el receptor ya no existe, nadie está esperando
    let _ = sender.try_send(completion);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, AnalysisOutput};
    use crate::jobs::types::JobStatus;

    const BUDGET: Duration = Duration::from_secs(60);

    fn handle(id: &str) -> JobHandle {
        JobHandle::new(JobRecord::new(
            id.to_string(),
            "AAPL".to_string(),
            "2025-08-27".to_string(),
        ))
    }

    fn routine<F>(f: F) -> Arc<dyn AnalysisRoutine>
    where
        F: Fn(&str, &str) -> Result<AnalysisOutput, AnalysisError> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    #[test]
    fn test_execute_success_writes_record_and_channel() {
        let job = handle("ok");
        let channel = JobExecutor::execute(
            "AAPL",
            "2025-08-27",
            routine(|s, d| {
                Ok(AnalysisOutput::new(
                    format!("report {} {}", s, d),
                    "Reasoning\nFINAL TRANSACTION PROPOSAL: BUY",
                ))
            }),
            job.clone(),
            BUDGET,
        )
        .unwrap();

        let delivered = channel.wait(Duration::from_secs(5));
        assert_eq!(
            delivered,
            ChannelPoll::Delivered(Completion::Success {
                result: Some("report AAPL 2025-08-27".to_string()),
                decision: Some("BUY".to_string()),
            })
        );

        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.decision.as_deref(), Some("BUY"));
        assert_eq!(snapshot.progress, 100);
    }

    #[test]
    fn test_execute_delivers_only_once() {
        let job = handle("once");
        let channel = JobExecutor::execute(
            "AAPL",
            "2025-08-27",
            routine(|_, _| Ok(AnalysisOutput::new("r", "HOLD"))),
            job,
            BUDGET,
        )
        .unwrap();

        assert!(matches!(
            channel.wait(Duration::from_secs(5)),
            ChannelPoll::Delivered(_)
        ));
        assert_eq!(channel.wait(Duration::from_millis(50)), ChannelPoll::Disconnected);
    }

    #[test]
    fn test_execute_failure() {
        let job = handle("fail");
        let channel = JobExecutor::execute(
            "AAPL",
            "2025-08-27",
            routine(|_, _| Err(AnalysisError::Failed("rate limited".to_string()))),
            job.clone(),
            BUDGET,
        )
        .unwrap();

        assert_eq!(
            channel.wait(Duration::from_secs(5)),
            ChannelPoll::Delivered(Completion::Failure("rate limited".to_string()))
        );
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_execute_panic_becomes_failure() {
        let job = handle("panic");
        let channel = JobExecutor::execute(
            "AAPL",
            "2025-08-27",
            routine(|_, _| panic!("model exploded")),
            job.clone(),
            BUDGET,
        )
        .unwrap();

        match channel.wait(Duration::from_secs(5)) {
            ChannelPoll::Delivered(Completion::Failure(message)) => {
                assert!(message.contains("model exploded"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(job.snapshot().status, JobStatus::Failed);
    }

    #[test]
    fn test_late_delivery_does_not_overwrite_timeout() {
        let job = handle("late");
        let channel = JobExecutor::execute(
            "AAPL",
            "2025-08-27",
            routine(|_, _| {
                thread::sleep(Duration::from_millis(200));
                Ok(AnalysisOutput::new("late report", "BUY"))
            }),
            job.clone(),
            BUDGET,
        )
        .unwrap();

        assert_eq!(channel.try_take(), ChannelPoll::Pending);
        job.update(|r| r.mark_timeout("Analysis timed out after 0s".to_string()));

        // El thread sigue corriendo y publica igual
        assert!(matches!(
            channel.wait(Duration::from_secs(5)),
            ChannelPoll::Delivered(Completion::Success { .. })
        ));
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Timeout);
        assert!(snapshot.result.is_none());
        assert!(snapshot.decision.is_none());
    }

    #[test]
    fn test_result_after_budget_is_recorded_as_timeout() {
        let job = handle("overrun");
        let channel = JobExecutor::execute(
            "AAPL",
            "2025-08-27",
            routine(|_, _| {
                thread::sleep(Duration::from_millis(150));
                Ok(AnalysisOutput::new("slow report", "BUY"))
            }),
            job.clone(),
            Duration::from_millis(50),
        )
        .unwrap();

        assert!(matches!(
            channel.wait(Duration::from_secs(5)),
            ChannelPoll::Delivered(Completion::Success { .. })
        ));
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Timeout);
        assert!(snapshot.error.as_deref().unwrap().contains("timed out"));
        assert!(snapshot.result.is_none());
    }

    #[test]
    fn test_execute_without_receiver_still_finishes() {
        let job = handle("orphan");
        let channel = JobExecutor::execute(
            "AAPL",
            "2025-08-27",
            routine(|_, _| {
                thread::sleep(Duration::from_millis(50));
                Ok(AnalysisOutput::new("r", "SELL"))
            }),
            job.clone(),
            BUDGET,
        )
        .unwrap();
        drop(channel);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !job.is_terminal() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(job.snapshot().decision.as_deref(), Some("SELL"));
    }
}
