//! # Análisis por Subproceso
//! src/analysis/command.rs
//!
//! Ejecuta un programa externo como rutina de análisis. El programa recibe
//! `symbol` y `date` como los dos últimos argumentos y escribe en stdout:
//!
//! - un JSON `{"result": ..., "decision": ...}`, o
//! - texto libre, que se usa como reporte y como decisión (el normalizador
//!   extrae luego la línea con la propuesta final).

use super::{AnalysisError, AnalysisOutput, AnalysisRoutine, AnalysisValue};
use serde_json::Value;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Caracteres de stderr que se conservan en el mensaje de error
const STDERR_TAIL_CHARS: usize = 500;

/// Rutina que lanza un programa externo por cada análisis
#[derive(Debug, Clone)]
pub struct CommandAnalysis {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CommandAnalysis {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            envs: Vec::new(),
        }
    }

    /// Construye la rutina desde una línea de comando separada por espacios.
    /// Retorna `None` si la línea está vacía.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    /// Agrega una variable de entorno para el subproceso
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl AnalysisRoutine for CommandAnalysis {
    fn run(&self, symbol: &str, date: &str) -> Result<AnalysisOutput, AnalysisError> {
        let start = Instant::now();
        tracing::debug!(program = %self.program, symbol, date, "Spawning analysis process");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(symbol)
            .arg(date)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        tracing::debug!(
            program = %self.program,
            exit_code = output.status.code().unwrap_or(-1),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis process exited"
        );

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(AnalysisError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                code,
                tail(stderr.trim(), STDERR_TAIL_CHARS)
            )));
        }

        parse_output(stdout.trim())
    }
}

/// Interpreta el stdout de la rutina
fn parse_output(stdout: &str) -> Result<AnalysisOutput, AnalysisError> {
    if stdout.is_empty() {
        return Err(AnalysisError::Failed(
            "analysis process produced no output".to_string(),
        ));
    }

    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(mut map)) if map.contains_key("result") || map.contains_key("decision") => {
            let result = map.remove("result").unwrap_or(Value::Null);
            let decision = map.remove("decision").unwrap_or(Value::Null);
            Ok(AnalysisOutput {
                result: AnalysisValue::from_json(result),
                decision: AnalysisValue::from_json(decision),
            })
        }
        _ => Ok(AnalysisOutput::new(stdout, stdout)),
    }
}

/// Últimos `max` caracteres de `text`
fn tail(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Rutina usada cuando no hay programa de análisis configurado.
/// Toda ejecución falla con `Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredAnalysis;

impl AnalysisRoutine for UnconfiguredAnalysis {
    fn run(&self, _symbol: &str, _date: &str) -> Result<AnalysisOutput, AnalysisError> {
        Err(AnalysisError::Unavailable(
            "no analysis command configured (set ANALYSIS_COMMAND)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line() {
        let routine = CommandAnalysis::from_command_line("python3 -m agents.run").unwrap();
        assert_eq!(routine.program(), "python3");
        assert_eq!(routine.args, vec!["-m", "agents.run"]);
        assert!(CommandAnalysis::from_command_line("   ").is_none());
    }

    #[test]
    fn test_parse_json_output() {
        let output =
            parse_output(r#"{"result": "Full report", "decision": {"content": "BUY"}}"#).unwrap();
        assert_eq!(output.result, AnalysisValue::Text("Full report".to_string()));
        assert_eq!(
            output.decision,
            AnalysisValue::Message {
                content: "BUY".to_string()
            }
        );
    }

    #[test]
    fn test_parse_text_output() {
        let output = parse_output("Report\nFINAL TRANSACTION PROPOSAL: HOLD").unwrap();
        assert_eq!(output.result, output.decision);
        assert!(matches!(output.result, AnalysisValue::Text(_)));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(matches!(parse_output(""), Err(AnalysisError::Failed(_))));
    }

    #[test]
    fn test_tail_keeps_last_chars() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("abc", 10), "abc");
        assert_eq!(tail("ñandú", 2), "dú");
    }

    #[test]
    fn test_unconfigured_analysis_fails() {
        let result = UnconfiguredAnalysis.run("AAPL", "2025-08-27");
        assert!(matches!(result, Err(AnalysisError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_receives_symbol_and_date() {
        // sh -c 'script' $0 $1
        let routine = CommandAnalysis::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"printf '{"result": "report %s %s", "decision": "SELL"}' "$0" "$1""#.to_string(),
            ],
        );
        let output = routine.run("MSFT", "2025-08-27").unwrap();
        assert_eq!(
            output.result,
            AnalysisValue::Text("report MSFT 2025-08-27".to_string())
        );
        assert_eq!(output.decision, AnalysisValue::Text("SELL".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_non_zero_exit() {
        let routine = CommandAnalysis::new(
            "sh",
            vec!["-c".to_string(), "echo 'missing API key' >&2; exit 3".to_string()],
        );
        match routine.run("MSFT", "2025-08-27") {
            Err(AnalysisError::Failed(message)) => {
                assert!(message.contains("exited with 3"));
                assert!(message.contains("missing API key"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let routine = CommandAnalysis::new("definitely-not-a-real-program-xyz", Vec::new());
        assert!(matches!(
            routine.run("AAPL", "2025-08-27"),
            Err(AnalysisError::Io(_))
        ));
    }
}
