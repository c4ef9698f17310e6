//! # Tipos y Estructuras para el Sistema de Jobs
//! src/jobs/types.rs
//!
//! Define el estado de un job de análisis y su registro (`JobRecord`).
//!
//! ## Máquina de estados
//!
//! ```text
//! starting → analyzing ⟲ → completed | failed | timeout
//! ```
//!
//! Los tres estados finales son pegajosos: una vez alcanzado uno,
//! cualquier transición posterior se ignora (retorna `false`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progreso máximo que puede mostrar un job que todavía no terminó
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// Estado de un job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Registro creado, el análisis todavía no arrancó
    Starting,

    /// El análisis está corriendo (puede repetirse con cada heartbeat)
    Analyzing,

    /// Terminó con resultado y decisión
    Completed,

    /// La rutina de análisis falló
    Failed,

    /// Se agotó el presupuesto de tiempo
    Timeout,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
        }
    }

    /// Verifica si el estado es terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Timeout
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registro de un job de análisis
///
/// Es a la vez el estado canónico (dentro de un `JobHandle`) y el
/// snapshot que se entrega a los clientes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// ID del job
    #[serde(rename = "analysis_id")]
    pub id: String,

    /// Símbolo analizado (ej: "AAPL")
    pub symbol: String,

    /// Fecha de análisis (YYYY-MM-DD)
    pub date: String,

    /// Estado actual
    pub status: JobStatus,

    /// Progreso (0-100)
    pub progress: u8,

    /// Etapa "activa", solo informativa
    #[serde(rename = "current_agent")]
    pub current_stage: String,

    /// Bitácora del job, solo se agregan elementos
    pub messages: Vec<String>,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Duración en segundos, calculada una sola vez al terminar
    pub duration: Option<f64>,

    pub duration_formatted: Option<String>,

    /// Reporte normalizado (solo en `completed`)
    pub result: Option<String>,

    /// Decisión normalizada (solo en `completed`)
    pub decision: Option<String>,

    /// Causa del fallo (solo en `failed` / `timeout`)
    pub error: Option<String>,

    /// Registro de ejemplo para el historial vacío, nunca es un dato real
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_sample: bool,

    /// Momento del último heartbeat (no se serializa)
    #[serde(skip)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl JobRecord {
    /// Crea un registro nuevo en estado `starting`
    pub fn new(id: String, symbol: String, date: String) -> Self {
        let created = format!("🚀 Analysis requested for {} on {}", symbol, date);
        Self {
            id,
            symbol,
            date,
            status: JobStatus::Starting,
            progress: 0,
            current_stage: "Initializing".to_string(),
            messages: vec![created],
            started_at: Utc::now(),
            completed_at: None,
            duration: None,
            duration_formatted: None,
            result: None,
            decision: None,
            error: None,
            is_sample: false,
            last_heartbeat: None,
        }
    }

    /// Verifica si el job está en estado terminal
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Agrega un mensaje a la bitácora (ignorado si el job ya terminó)
    pub fn push_message(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.messages.push(message.into());
        true
    }

    /// Pasa a `analyzing` y avanza el progreso sin agregar mensajes
    ///
    /// El progreso nunca retrocede y queda por debajo de 100 hasta que
    /// el job se completa. La etapa solo cambia junto con el progreso.
    pub fn advance(&mut self, stage: &str, progress: u8) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Analyzing;
        let progress = progress.min(MAX_RUNNING_PROGRESS);
        if progress >= self.progress {
            self.progress = progress;
            self.current_stage = stage.to_string();
        }
        true
    }

    /// Marca el job como `analyzing` y agrega un mensaje
    pub fn mark_analyzing(&mut self, stage: &str, progress: u8, message: impl Into<String>) -> bool {
        if !self.advance(stage, progress) {
            return false;
        }
        self.messages.push(message.into());
        true
    }

    /// Igual que `mark_analyzing`, registrando el instante del heartbeat
    pub fn record_heartbeat(&mut self, stage: &str, progress: u8, message: impl Into<String>) -> bool {
        if !self.mark_analyzing(stage, progress, message) {
            return false;
        }
        self.last_heartbeat = Some(Utc::now());
        true
    }

    /// Tiempo transcurrido desde `started_at`
    pub fn elapsed(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.started_at).to_std().unwrap_or_default()
    }

    /// Tiempo desde el último heartbeat (o desde el inicio si no hubo)
    pub fn since_last_heartbeat(&self, now: DateTime<Utc>) -> std::time::Duration {
        let reference = self.last_heartbeat.unwrap_or(self.started_at);
        (now - reference).to_std().unwrap_or_default()
    }

    /// Marca el job como completado
    pub fn mark_completed(&mut self, result: Option<String>, decision: Option<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let label = decision.as_deref().unwrap_or("no decision").to_string();
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.current_stage = "Completed".to_string();
        self.result = result;
        self.decision = decision;
        self.finish(format!("✅ Analysis completed: {}", label));
        true
    }

    /// Marca el job como fallido
    pub fn mark_failed(&mut self, error: String) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.current_stage = "Failed".to_string();
        let message = format!("❌ Analysis failed: {}", error);
        self.error = Some(error);
        self.finish(message);
        true
    }

    /// Marca el job como timeout
    pub fn mark_timeout(&mut self, error: String) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Timeout;
        self.current_stage = "Timed out".to_string();
        let message = format!("⏱️ {}", error);
        self.error = Some(error);
        self.finish(message);
        true
    }

    /// Fija `completed_at` y la duración. Se llama una sola vez.
    fn finish(&mut self, message: String) {
        let now = Utc::now();
        let secs = (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        self.completed_at = Some(now);
        self.duration = Some(secs);
        self.duration_formatted = Some(format_duration(secs));
        self.messages.push(message);
    }
}

/// Formatea una duración en segundos como "Xm Ys"
pub fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    let (minutes, seconds) = (total / 60, total % 60);
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
