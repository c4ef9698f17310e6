//! # Normalizador de Resultados
//! src/jobs/normalizer.rs
//!
//! Convierte el resultado crudo de la rutina de análisis en dos strings
//! legibles: el texto del reporte y la etiqueta de decisión.
//! Son funciones puras y nunca fallan.

use crate::analysis::{AgentState, AnalysisValue};
use serde_json::Value;

/// Frase que marca la línea con la decisión final
pub const DECISION_MARKER: &str = "FINAL TRANSACTION PROPOSAL";

/// Texto del reporte
pub fn normalize_result(raw: &AnalysisValue) -> Option<String> {
    match raw {
        AnalysisValue::Null => None,
        AnalysisValue::Text(text) => Some(text.clone()),
        AnalysisValue::Message { content } => Some(content.clone()),
        AnalysisValue::State(state) => Some(state_report(state)),
        AnalysisValue::Other(value) => Some(value_to_string(value)),
    }
}

/// Etiqueta de decisión
///
/// Si el contenido trae la línea `FINAL TRANSACTION PROPOSAL: X`, retorna
/// lo que sigue al último `:` de esa línea. Si no, el contenido completo.
pub fn normalize_decision(raw: &AnalysisValue) -> Option<String> {
    let content = match raw {
        AnalysisValue::Null => return None,
        AnalysisValue::Text(text) => text.clone(),
        AnalysisValue::Message { content } => content.clone(),
        AnalysisValue::State(state) => state
            .final_trade_decision
            .clone()
            .or_else(|| state.messages.last().cloned())
            .or_else(|| state.judge_decision.clone())
            .unwrap_or_else(|| state.raw.to_string()),
        AnalysisValue::Other(value) => value_to_string(value),
    };

    Some(extract_marked_decision(&content).unwrap_or(content))
}

/// Busca la primera línea con el marcador
fn extract_marked_decision(content: &str) -> Option<String> {
    if !content.contains(DECISION_MARKER) {
        return None;
    }
    let line = content.lines().find(|line| line.contains(DECISION_MARKER))?;
    let decision = match line.rfind(':') {
        Some(idx) => &line[idx + 1..],
        None => line,
    };
    Some(decision.trim().to_string())
}

fn state_report(state: &AgentState) -> String {
    let mut parts: Vec<String> = state
        .messages
        .iter()
        .filter(|m| !m.trim().is_empty())
        .cloned()
        .collect();

    for (heading, section) in sections(state) {
        if let Some(text) = section.filter(|t| !t.trim().is_empty()) {
            parts.push(format!("## {}\n\n{}", heading, text));
        }
    }

    if let Some(judge) = state.judge_decision.as_deref().filter(|t| !t.trim().is_empty()) {
        parts.push(format!("## Investment Debate Decision\n\n{}", judge));
    }

    if parts.is_empty() {
        return state.raw.to_string();
    }
    parts.join("\n\n")
}

/// Secciones del reporte, en el orden en que se agregan
fn sections(state: &AgentState) -> [(&'static str, Option<&str>); 4] {
    [
        ("Market Analysis", state.market_report.as_deref()),
        ("Sentiment Analysis", state.sentiment_report.as_deref()),
        ("News Analysis", state.news_report.as_deref()),
        ("Fundamentals Analysis", state.fundamentals_report.as_deref()),
    ]
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_from_marker_line() {
        let raw = AnalysisValue::from(
            "The outlook is positive.\n...FINAL TRANSACTION PROPOSAL: BUY\nThanks.",
        );
        assert_eq!(normalize_decision(&raw).as_deref(), Some("BUY"));
    }

    #[test]
    fn test_decision_uses_last_colon() {
        let raw = AnalysisValue::from("Note: FINAL TRANSACTION PROPOSAL:  **SELL** ");
        assert_eq!(normalize_decision(&raw).as_deref(), Some("**SELL**"));
    }

    #[test]
    fn test_decision_without_marker_is_unchanged() {
        let raw = AnalysisValue::from("Hold the position for now");
        assert_eq!(
            normalize_decision(&raw).as_deref(),
            Some("Hold the position for now")
        );
    }

    #[test]
    fn test_null_normalizes_to_none() {
        assert_eq!(normalize_result(&AnalysisValue::Null), None);
        assert_eq!(normalize_decision(&AnalysisValue::Null), None);
    }

    #[test]
    fn test_decision_from_message_content() {
        let raw = AnalysisValue::from_json(json!({
            "content": "Analysis done\nFINAL TRANSACTION PROPOSAL: HOLD"
        }));
        assert_eq!(normalize_decision(&raw).as_deref(), Some("HOLD"));
    }

    #[test]
    fn test_decision_from_state_prefers_final_trade_decision() {
        let raw = AnalysisValue::from_json(json!({
            "messages": ["FINAL TRANSACTION PROPOSAL: SELL"],
            "final_trade_decision": "FINAL TRANSACTION PROPOSAL: BUY",
        }));
        assert_eq!(normalize_decision(&raw).as_deref(), Some("BUY"));
    }

    #[test]
    fn test_decision_from_other_value() {
        let raw = AnalysisValue::from_json(json!(42));
        assert_eq!(normalize_decision(&raw).as_deref(), Some("42"));
    }

    #[test]
    fn test_result_plain_text_unchanged() {
        let raw = AnalysisValue::from("  report text  ");
        assert_eq!(normalize_result(&raw).as_deref(), Some("  report text  "));
    }

    #[test]
    fn test_result_from_agent_state() {
        let raw = AnalysisValue::from_json(json!({
            "messages": [{"content": "Gathered data"}, {"content": "Ran models"}],
            "market_report": "Uptrend",
            "sentiment_report": "",
            "fundamentals_report": "Strong balance sheet",
            "investment_debate_state": {"judge_decision": "Bulls win"},
        }));

        let text = normalize_result(&raw).unwrap();
        assert_eq!(
            text,
            "Gathered data\n\nRan models\n\n## Market Analysis\n\nUptrend\n\n\
             ## Fundamentals Analysis\n\nStrong balance sheet\n\n\
             ## Investment Debate Decision\n\nBulls win"
        );
        assert!(!text.contains("Sentiment"));
    }

    #[test]
    fn test_result_empty_state_falls_back_to_json() {
        let raw = AnalysisValue::from_json(json!({"messages": []}));
        assert_eq!(normalize_result(&raw).as_deref(), Some(r#"{"messages":[]}"#));
    }

    #[test]
    fn test_result_other_value_is_stringified() {
        let raw = AnalysisValue::from_json(json!({"score": 0.7}));
        assert_eq!(normalize_result(&raw).as_deref(), Some(r#"{"score":0.7}"#));
    }
}
