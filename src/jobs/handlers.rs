//! # Handlers HTTP para Jobs
//! src/jobs/handlers.rs
//!
//! Endpoints de la API de análisis:
//! - `GET  /`
//! - `GET  /health`, `/api/health`
//! - `POST /api/analyze`
//! - `GET  /api/progress/{id}`, `/api/progress`
//! - `GET  /api/history?limit=N`
//! - `GET  /api/download/{id}`
//! - `GET  /api/config`
//! - `GET  /agents`, `/api/agents`

use crate::error::JobError;
use crate::http::{Request, Response, StatusCode};
use crate::jobs::manager::{sample_record, SAMPLE_ID};
use crate::jobs::report::{render_text_report, report_filename};
use crate::jobs::types::JobStatus;
use crate::server::AppState;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;

/// Símbolo usado cuando el request no indica uno
const DEFAULT_SYMBOL: &str = "AAPL";

/// Cuerpo de `POST /api/analyze`, todos los campos opcionales
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzeRequest {
    symbol: Option<String>,
    date: Option<String>,
    mode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Async,
    Sync,
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9.^-]{1,15}$").expect("valid symbol pattern"))
}

/// Traduce un error del servicio a su código HTTP
pub fn status_for(error: &JobError) -> StatusCode {
    match error {
        JobError::Configuration(_) => StatusCode::ServiceUnavailable,
        JobError::Execution(_) => StatusCode::InternalServerError,
        JobError::Timeout { .. } => StatusCode::RequestTimeout,
        JobError::NotFound(_) => StatusCode::NotFound,
        JobError::DuplicateId(_) => StatusCode::Conflict,
        JobError::NotReady { .. } => StatusCode::Conflict,
        JobError::InvalidRequest(_) => StatusCode::BadRequest,
    }
}

pub fn error_response(error: &JobError) -> Response {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::warn!(error = %error, status = status.as_u16(), "Request failed");
    }
    Response::error(status, &error.to_string())
}

/// Handler para / (información del servicio)
pub fn index_handler(_req: &Request, _state: &AppState) -> Response {
    Response::json_value(
        StatusCode::Ok,
        &json!({
            "message": "Multi-agent LLM stock analysis server",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "/health": "Health check and API key presence",
                "/api/analyze": "POST: start an analysis (async) or wait for it (sync)",
                "/api/progress/{id}": "Progress of one analysis",
                "/api/progress": "Progress of every analysis",
                "/api/history": "Completed analyses, newest first",
                "/api/download/{id}": "Plain-text report of a finished analysis",
                "/api/config": "Effective configuration",
                "/api/agents": "Agent teams taking part in an analysis",
            },
        }),
    )
}

/// Handler para /agents y /api/agents
///
/// Catálogo estático de los equipos de agentes.
pub fn agents_handler(_req: &Request, _state: &AppState) -> Response {
    Response::json_value(
        StatusCode::Ok,
        &json!({
            "analyst_team": {
                "market_analyst": "Technical indicators and price action (MACD, RSI)",
                "sentiment_analyst": "Social media and public sentiment",
                "news_analyst": "Global news and macroeconomic indicators",
                "fundamentals_analyst": "Company financials and performance metrics",
            },
            "researcher_team": {
                "bull_researcher": "Arguments to buy or hold",
                "bear_researcher": "Arguments to sell or short",
                "research_manager": "Judges the debate and issues an investment plan",
            },
            "decision_makers": {
                "trader": "Turns the investment plan into a transaction proposal",
                "risk_management": "Weighs risk and approves or rejects the trade",
                "portfolio_manager": "Final approval for trade execution",
            },
        }),
    )
}

/// Handler para /health y /api/health
///
/// # Ejemplo de response
/// ```json
/// {"status": "healthy", "api_keys": {"openai": true, ...}, "jobs": 3}
/// ```
pub fn health_handler(_req: &Request, state: &AppState) -> Response {
    Response::json_value(
        StatusCode::Ok,
        &json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "api_keys": state.config.api_keys_present(),
            "credentials_ready": state.service.config().credentials_ready,
            "jobs": state.service.registry().count(),
        }),
    )
}

/// Handler para POST /api/analyze
///
/// Body JSON (opcional): `{"symbol": "AAPL", "date": "2025-08-27", "mode": "async"}`
///
/// - `async` (default): 202 con el ID del análisis
/// - `sync`: espera el resultado; 200 completado, 500 fallido, 408 timeout
pub fn analyze_handler(req: &Request, state: &AppState) -> Response {
    let (symbol, date, mode) = match parse_analyze_request(req) {
        Ok(parsed) => parsed,
        Err(e) => return error_response(&e),
    };

    match mode {
        Mode::Async => match state.service.submit(&symbol, &date) {
            Ok(id) => Response::json_value(
                StatusCode::Accepted,
                &json!({
                    "analysis_id": id,
                    "status": "started",
                    "symbol": symbol,
                    "date": date,
                    "message": format!("Analysis started, poll /api/progress/{}", id),
                }),
            ),
            Err(e) => error_response(&e),
        },
        Mode::Sync => match state.service.submit_and_wait(&symbol, &date) {
            Ok(record) => {
                let status = match record.status {
                    JobStatus::Completed => StatusCode::Ok,
                    JobStatus::Timeout => StatusCode::RequestTimeout,
                    _ => StatusCode::InternalServerError,
                };
                Response::json_value(status, &record)
            }
            Err(e) => error_response(&e),
        },
    }
}

/// Valida el body de /api/analyze: símbolo, fecha y modo
fn parse_analyze_request(req: &Request) -> Result<(String, String, Mode), JobError> {
    let body = if req.body().iter().all(u8::is_ascii_whitespace) {
        AnalyzeRequest::default()
    } else {
        req.json::<AnalyzeRequest>()
            .map_err(|e| JobError::InvalidRequest(format!("malformed JSON body: {}", e)))?
    };

    let symbol = body
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYMBOL);
    if !symbol_pattern().is_match(symbol) {
        return Err(JobError::InvalidRequest(format!("invalid symbol: {}", symbol)));
    }

    let date = match body.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| JobError::InvalidRequest(format!("invalid date (expected YYYY-MM-DD): {}", date)))?,
        None => Utc::now().date_naive(),
    };

    let mode = match body.mode.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("async") => Mode::Async,
        Some("sync") => Mode::Sync,
        Some(other) => {
            return Err(JobError::InvalidRequest(format!(
                "invalid mode: {} (use async or sync)",
                other
            )))
        }
    };

    Ok((symbol.to_uppercase(), date.format("%Y-%m-%d").to_string(), mode))
}

/// Handler para GET /api/progress/{id}
pub fn progress_handler(req: &Request, state: &AppState) -> Response {
    let id = req.path_param("id").unwrap_or_default();
    match state.service.query_progress(id) {
        Ok(record) => Response::json_value(StatusCode::Ok, &record),
        Err(e) => error_response(&e),
    }
}

/// Handler para GET /api/progress
pub fn all_progress_handler(_req: &Request, state: &AppState) -> Response {
    let analyses = state.service.query_all();
    Response::json_value(
        StatusCode::Ok,
        &json!({
            "count": analyses.len(),
            "analyses": analyses,
        }),
    )
}

/// Handler para GET /api/history?limit=N
///
/// # Ejemplo de response
/// ```json
/// {"history": [...], "count": 2, "is_sample": false}
/// ```
pub fn history_handler(req: &Request, state: &AppState) -> Response {
    let limit = match req.query_param("limit") {
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) => limit,
            Err(_) => {
                return error_response(&JobError::InvalidRequest(format!(
                    "invalid limit: {}",
                    raw
                )))
            }
        },
        None => state.config.history_limit,
    };

    let history = state.service.history(limit);
    let is_sample = history.iter().any(|r| r.is_sample);
    Response::json_value(
        StatusCode::Ok,
        &json!({
            "count": history.len(),
            "is_sample": is_sample,
            "history": history,
        }),
    )
}

/// Handler para GET /api/download/{id}
///
/// Retorna el reporte en texto plano como adjunto. 409 si el job no
/// terminó todavía.
pub fn download_handler(req: &Request, state: &AppState) -> Response {
    let id = req.path_param("id").unwrap_or_default();
    let record = if id == SAMPLE_ID {
        Ok(sample_record())
    } else {
        state.service.query_progress(id)
    };

    let result = record.and_then(|record| {
        render_text_report(&record).map(|report| (report_filename(&record), report))
    });
    match result {
        Ok((filename, report)) => Response::text(StatusCode::Ok, &report).with_header(
            "Content-Disposition",
            &format!("attachment; filename=\"{}\"", filename),
        ),
        Err(e) => error_response(&e),
    }
}

/// Handler para GET /api/config
pub fn config_handler(_req: &Request, state: &AppState) -> Response {
    Response::json_value(StatusCode::Ok, &state.config.public_view())
}
