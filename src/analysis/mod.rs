//! # Rutina de Análisis
//! src/analysis/mod.rs
//!
//! La rutina de análisis es una caja negra lenta: recibe `(symbol, date)`
//! y devuelve un reporte y una decisión con forma arbitraria. Este módulo
//! define el trait que la abstrae y el conjunto cerrado de formas de
//! resultado que el normalizador sabe interpretar.
//!
//! ## Formas reconocidas
//!
//! - `Null`: la rutina no produjo nada
//! - `Text`: texto plano
//! - `Message`: objeto con un campo `content`
//! - `State`: estado de agentes (mensajes, secciones de reporte, debate)
//! - `Other`: cualquier otro JSON

pub mod command;

pub use command::{CommandAnalysis, UnconfiguredAnalysis};

use serde_json::{Map, Value};

/// Claves que identifican un estado de agentes
const STATE_KEYS: [&str; 7] = [
    "messages",
    "market_report",
    "sentiment_report",
    "news_report",
    "fundamentals_report",
    "investment_debate_state",
    "final_trade_decision",
];

/// Errores de la rutina de análisis
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Failed(String),

    /// No hay rutina configurada en este proceso
    #[error("Analysis routine unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resultado crudo de una ejecución: reporte y decisión
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutput {
    pub result: AnalysisValue,
    pub decision: AnalysisValue,
}

impl AnalysisOutput {
    pub fn new(result: impl Into<AnalysisValue>, decision: impl Into<AnalysisValue>) -> Self {
        Self {
            result: result.into(),
            decision: decision.into(),
        }
    }
}

/// La función `run_analysis(symbol, date)`
///
/// Puede tardar minutos y no se puede interrumpir una vez iniciada.
pub trait AnalysisRoutine: Send + Sync {
    fn run(&self, symbol: &str, date: &str) -> Result<AnalysisOutput, AnalysisError>;
}

impl<F> AnalysisRoutine for F
where
    F: Fn(&str, &str) -> Result<AnalysisOutput, AnalysisError> + Send + Sync,
{
    fn run(&self, symbol: &str, date: &str) -> Result<AnalysisOutput, AnalysisError> {
        self(symbol, date)
    }
}

/// Valor devuelto por la rutina, clasificado en un conjunto cerrado
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    Null,
    Text(String),
    Message { content: String },
    State(AgentState),
    Other(Value),
}

/// Estado final de los agentes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentState {
    /// Contenido textual de cada mensaje, en orden
    pub messages: Vec<String>,
    pub market_report: Option<String>,
    pub sentiment_report: Option<String>,
    pub news_report: Option<String>,
    pub fundamentals_report: Option<String>,

    /// `investment_debate_state.judge_decision`
    pub judge_decision: Option<String>,
    pub final_trade_decision: Option<String>,

    /// JSON original, para la representación de respaldo
    pub raw: Value,
}

impl AnalysisValue {
    /// Clasifica un JSON arbitrario
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => AnalysisValue::Null,
            Value::String(text) => AnalysisValue::Text(text),
            Value::Object(map) if STATE_KEYS.iter().any(|k| map.contains_key(*k)) => {
                AnalysisValue::State(AgentState::from_object(map))
            }
            Value::Object(map) => match map.get("content") {
                Some(Value::String(content)) => AnalysisValue::Message {
                    content: content.clone(),
                },
                _ => AnalysisValue::Other(Value::Object(map)),
            },
            other => AnalysisValue::Other(other),
        }
    }
}

impl From<&str> for AnalysisValue {
    fn from(text: &str) -> Self {
        AnalysisValue::Text(text.to_string())
    }
}

impl From<String> for AnalysisValue {
    fn from(text: String) -> Self {
        AnalysisValue::Text(text)
    }
}

impl From<Value> for AnalysisValue {
    fn from(value: Value) -> Self {
        AnalysisValue::from_json(value)
    }
}

impl<T: Into<AnalysisValue>> From<Option<T>> for AnalysisValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AnalysisValue::Null)
    }
}

impl AgentState {
    fn from_object(map: Map<String, Value>) -> Self {
        let messages = match map.get("messages") {
            Some(Value::Array(items)) => items.iter().filter_map(message_text).collect(),
            _ => Vec::new(),
        };

        let judge_decision = map
            .get("investment_debate_state")
            .and_then(|debate| debate.get("judge_decision"))
            .and_then(text_field);

        Self {
            messages,
            market_report: map.get("market_report").and_then(text_field),
            sentiment_report: map.get("sentiment_report").and_then(text_field),
            news_report: map.get("news_report").and_then(text_field),
            fundamentals_report: map.get("fundamentals_report").and_then(text_field),
            judge_decision,
            final_trade_decision: map.get("final_trade_decision").and_then(text_field),
            raw: Value::Object(map),
        }
    }
}

/// Texto de un mensaje: un string, o el `content` de un objeto
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => match map.get("content") {
            Some(Value::String(content)) => Some(content.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
