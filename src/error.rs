//! # Errores del Motor de Jobs
//! src/error.rs
//!
//! Taxonomía de errores que puede devolver el servicio de jobs.
//! Cada variante se traduce a un único código HTTP en `jobs::handlers`.

use crate::jobs::types::JobStatus;

/// Errores del servicio de jobs
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    /// Precondición de configuración no cumplida (ej: API key ausente)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// La rutina de análisis falló
    #[error("Analysis failed: {0}")]
    Execution(String),

    /// Se agotó el presupuesto de espera
    #[error("Analysis timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// No existe un job con ese ID
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Ya existe un job con ese ID
    #[error("Duplicate job id: {0}")]
    DuplicateId(String),

    /// El job todavía no llegó a un estado terminal
    #[error("Job {id} is not finished yet (status: {status})")]
    NotReady { id: String, status: JobStatus },

    /// Parámetros de entrada inválidos
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type JobResult<T> = Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = JobError::NotFound("AAPL_2025-08-27_20250827120000".to_string());
        assert_eq!(err.to_string(), "Job not found: AAPL_2025-08-27_20250827120000");

        let err = JobError::Timeout { elapsed_secs: 120 };
        assert_eq!(err.to_string(), "Analysis timed out after 120s");

        let err = JobError::NotReady {
            id: "x".to_string(),
            status: JobStatus::Analyzing,
        };
        assert!(err.to_string().contains("analyzing"));
    }
}
