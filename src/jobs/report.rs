//! # Reporte en Texto
//! src/jobs/report.rs
//!
//! Transformación pura de un job terminado a un documento de texto plano
//! para descargar.

use crate::error::{JobError, JobResult};
use crate::jobs::types::{JobRecord, JobStatus};
use std::fmt::Write;

const RULE: &str = "================================================================";

/// Nombre sugerido para el archivo del reporte
pub fn report_filename(record: &JobRecord) -> String {
    format!("{}_{}_analysis.txt", record.symbol, record.date)
}

/// Genera el reporte de un job terminado
///
/// Falla con `NotReady` si el job sigue en curso.
pub fn render_text_report(record: &JobRecord) -> JobResult<String> {
    if !record.is_terminal() {
        return Err(JobError::NotReady {
            id: record.id.clone(),
            status: record.status,
        });
    }

    let mut out = String::new();
    // Escribir en un String no falla
    let _ = write_report(&mut out, record);
    Ok(out)
}

fn write_report(out: &mut String, record: &JobRecord) -> std::fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "MULTI-AGENT TRADING ANALYSIS REPORT")?;
    if record.is_sample {
        writeln!(out, "(sample analysis, not real data)")?;
    }
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "Analysis ID:    {}", record.id)?;
    writeln!(out, "Symbol:         {}", record.symbol)?;
    writeln!(out, "Analysis date:  {}", record.date)?;
    writeln!(out, "Status:         {}", record.status.as_str().to_uppercase())?;
    if let Some(decision) = &record.decision {
        writeln!(out, "Decision:       {}", decision)?;
    }
    writeln!(out, "Started:        {}", record.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    if let Some(completed_at) = record.completed_at {
        writeln!(out, "Completed:      {}", completed_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    }
    if let Some(duration) = &record.duration_formatted {
        writeln!(out, "Duration:       {}", duration)?;
    }
    writeln!(out)?;

    match record.status {
        JobStatus::Completed => {
            writeln!(out, "ANALYSIS")?;
            writeln!(out, "{}", "-".repeat(RULE.len()))?;
            writeln!(
                out,
                "{}",
                record.result.as_deref().unwrap_or("(the analysis produced no report)")
            )?;
        }
        _ => {
            writeln!(out, "ERROR")?;
            writeln!(out, "{}", "-".repeat(RULE.len()))?;
            writeln!(out, "{}", record.error.as_deref().unwrap_or("unknown error"))?;
        }
    }
    writeln!(out)?;

    writeln!(out, "LOG")?;
    writeln!(out, "{}", "-".repeat(RULE.len()))?;
    for message in &record.messages {
        writeln!(out, "- {}", message)?;
    }
    Ok(())
}
