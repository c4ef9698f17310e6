//! # Supervisor de Timeout
//! src/jobs/supervisor.rs
//!
//! Maneja la espera del llamador en modo síncrono: consulta el canal de
//! resultado cada `poll_interval` hasta agotar `total_budget`, agregando
//! heartbeats al job mientras tanto.
//!
//! Al vencer el presupuesto retorna `TimedOut` sin consumir el canal; el
//! thread de análisis queda huérfano y sigue corriendo.

use crate::jobs::executor::{ChannelPoll, CompletionChannel, Completion};
use crate::jobs::job::JobHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progreso inicial de un job en ejecución
pub const BASE_PROGRESS: u8 = 10;

/// Progreso máximo que se estima por tiempo transcurrido
pub const MAX_ESTIMATED_PROGRESS: u8 = 95;

/// Etapas de los equipos de agentes, con el progreso a partir del cual
/// se consideran activas
pub const STAGES: [(u8, &str); 7] = [
    (BASE_PROGRESS, "Market Analyst"),
    (22, "Sentiment Analyst"),
    (34, "News Analyst"),
    (46, "Fundamentals Analyst"),
    (58, "Research Debate"),
    (70, "Trader"),
    (82, "Risk Management"),
];

/// Resultado de la espera
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        result: Option<String>,
        decision: Option<String>,
    },
    Failure(String),

    /// Se agotó el presupuesto sin resultado
    TimedOut { elapsed: Duration },

    /// El llamador dejó de esperar (ver `WaitCancel`)
    Abandoned,
}

impl From<Completion> for Outcome {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Success { result, decision } => Outcome::Success { result, decision },
            Completion::Failure(error) => Outcome::Failure(error),
        }
    }
}

/// Token para abandonar una espera
///
/// Cancelar solo detiene la espera; la rutina de análisis sigue corriendo.
#[derive(Debug, Clone, Default)]
pub struct WaitCancel {
    cancelled: Arc<AtomicBool>,
}

impl WaitCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Supervisor de la espera síncrona
#[derive(Debug, Clone, Copy)]
pub struct TimeoutSupervisor {
    total_budget: Duration,
    poll_interval: Duration,
}

impl TimeoutSupervisor {
    pub fn new(total_budget: Duration, poll_interval: Duration) -> Self {
        Self {
            total_budget,
            poll_interval,
        }
    }

    /// Espera el resultado del canal respetando el presupuesto
    pub fn await_with_timeout(
        &self,
        channel: &CompletionChannel,
        record: &JobHandle,
        cancel: &WaitCancel,
    ) -> Outcome {
        let start = Instant::now();

        loop {
            if cancel.is_cancelled() {
                tracing::warn!(job_id = record.id(), "Wait abandoned by caller");
                return Outcome::Abandoned;
            }

            let elapsed = start.elapsed();
            if elapsed >= self.total_budget {
                tracing::warn!(
                    job_id = record.id(),
                    elapsed_secs = elapsed.as_secs(),
                    "Analysis exceeded time budget"
                );
                return Outcome::TimedOut { elapsed };
            }

            let wait = self.poll_interval.min(self.total_budget - elapsed);
            match channel.wait(wait) {
                ChannelPoll::Delivered(completion) => return completion.into(),
                ChannelPoll::Disconnected => {
                    return Outcome::Failure(
                        "analysis worker exited without reporting a result".to_string(),
                    )
                }
                ChannelPoll::Pending => {
                    let elapsed = start.elapsed();
                    if elapsed < self.total_budget && !cancel.is_cancelled() {
                        self.heartbeat(record, elapsed);
                    }
                }
            }
        }
    }

    fn heartbeat(&self, record: &JobHandle, elapsed: Duration) {
        let (progress, stage) = progress_for_elapsed(elapsed, self.total_budget);
        let applied = record.update(|r| r.record_heartbeat(stage, progress, heartbeat_message(elapsed)));
        if applied {
            tracing::debug!(
                job_id = record.id(),
                elapsed_secs = elapsed.as_secs(),
                progress,
                stage,
                "Heartbeat"
            );
        }
    }
}

/// Mensaje de heartbeat
pub fn heartbeat_message(elapsed: Duration) -> String {
    format!("⏳ Analysis still running, {}s elapsed", elapsed.as_secs())
}

/// Estima progreso y etapa a partir del tiempo transcurrido:
/// `10 + 85 * elapsed / budget`, con tope en 95.
pub fn progress_for_elapsed(elapsed: Duration, budget: Duration) -> (u8, &'static str) {
    let ratio = if budget.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / budget.as_secs_f64()).min(1.0)
    };
    let span = (MAX_ESTIMATED_PROGRESS - BASE_PROGRESS) as f64;
    let progress = (BASE_PROGRESS as f64 + span * ratio).floor() as u8;
    let progress = progress.min(MAX_ESTIMATED_PROGRESS);

    let stage = STAGES
        .iter()
        .rev()
        .find(|(threshold, _)| progress >= *threshold)
        .map(|(_, name)| *name)
        .unwrap_or(STAGES[0].1);

    (progress, stage)
}
