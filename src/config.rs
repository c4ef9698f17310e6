//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor de análisis con soporte para argumentos CLI
//! y variables de entorno. El servicio de jobs nunca lee el entorno: recibe
//! un `ServiceConfig` derivado de acá.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./analysis_server --port 8001 \
//!   --timeout-secs 300 \
//!   --poll-interval-secs 10 \
//!   --analysis-command "python3 run_agents.py"
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! OPENAI_API_KEY=sk-... ANALYSIS_TIMEOUT_SECS=300 ./analysis_server
//! ```

use crate::analysis::{AnalysisRoutine, CommandAnalysis, UnconfiguredAnalysis};
use crate::jobs::manager::ServiceConfig;
use crate::logging::LogFormat;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

/// Configuración del servidor de análisis
#[derive(Debug, Clone, Parser)]
#[command(name = "analysis_server")]
#[command(about = "Servidor HTTP/1.0 para análisis multi-agente de acciones")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8001", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    // === Jobs ===

    /// Presupuesto total de un análisis en segundos
    #[arg(long = "timeout-secs", default_value = "480", env = "ANALYSIS_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// Intervalo entre heartbeats en segundos
    #[arg(long = "poll-interval-secs", default_value = "15", env = "ANALYSIS_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: u64,

    /// Máximo de jobs retenidos en memoria (0 = sin límite)
    #[arg(long = "max-jobs", default_value = "500", env = "MAX_JOBS")]
    pub max_jobs: usize,

    /// Tamaño por defecto del historial
    #[arg(long = "history-limit", default_value = "10", env = "HISTORY_LIMIT")]
    pub history_limit: usize,

    /// Mostrar un análisis de ejemplo si el historial está vacío
    #[arg(long = "history-sample", default_value_t = true, action = clap::ArgAction::Set, env = "HISTORY_SAMPLE")]
    pub history_sample: bool,

    /// Programa externo que ejecuta el análisis (recibe SYMBOL y DATE)
    #[arg(long = "analysis-command", env = "ANALYSIS_COMMAND")]
    pub analysis_command: Option<String>,

    // === Credenciales ===
    // Solo desde el entorno: un flag dejaría el secreto en la lista de procesos.

    #[arg(skip = secret_from_env("OPENAI_API_KEY"))]
    pub openai_api_key: Option<String>,

    #[arg(skip = secret_from_env("FINNHUB_API_KEY"))]
    pub finnhub_api_key: Option<String>,

    #[arg(skip = secret_from_env("GOOGLE_API_KEY"))]
    pub google_api_key: Option<String>,

    // === LLM ===

    /// Proveedor LLM (openai, google, ...)
    #[arg(long = "llm-provider", default_value = "openai", env = "LLM_PROVIDER")]
    pub llm_provider: String,

    /// Modelo para razonamiento profundo
    #[arg(long = "deep-think-llm", default_value = "gpt-4o-mini", env = "DEEP_THINK_LLM")]
    pub deep_think_llm: String,

    /// Modelo para razonamiento rápido
    #[arg(long = "quick-think-llm", default_value = "gpt-4o-mini", env = "QUICK_THINK_LLM")]
    pub quick_think_llm: String,

    /// Rondas de debate entre investigadores
    #[arg(long = "max-debate-rounds", default_value = "1", env = "MAX_DEBATE_ROUNDS")]
    pub max_debate_rounds: u32,

    /// Usar herramientas con datos en línea
    #[arg(long = "online-tools", default_value_t = true, action = clap::ArgAction::Set, env = "ONLINE_TOOLS")]
    pub online_tools: bool,

    // === Logging ===

    /// Formato de logs: text o json
    #[arg(long = "log-format", value_enum, default_value = "text", env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use analysis_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8001");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("Analysis timeout must be > 0".to_string());
        }
        if self.poll_interval_secs == 0 {
            return Err("Poll interval must be > 0".to_string());
        }
        if self.poll_interval_secs > self.timeout_secs {
            return Err(format!(
                "Poll interval ({}s) must not exceed the analysis timeout ({}s)",
                self.poll_interval_secs, self.timeout_secs
            ));
        }
        if self.max_debate_rounds == 0 {
            return Err("Max debate rounds must be >= 1".to_string());
        }
        Ok(())
    }

    /// API key que exige el proveedor LLM configurado, con su nombre.
    /// `None` si el proveedor no necesita una (ej: modelos locales).
    pub fn required_key(&self) -> Option<(&'static str, Option<&str>)> {
        match self.llm_provider.to_lowercase().as_str() {
            "openai" => Some(("OPENAI_API_KEY", self.openai_api_key.as_deref())),
            "google" => Some(("GOOGLE_API_KEY", self.google_api_key.as_deref())),
            _ => None,
        }
    }

    /// Las credenciales del proveedor están presentes y no son de ejemplo
    pub fn credentials_ready(&self) -> bool {
        match self.required_key() {
            Some((_, Some(key))) => !is_placeholder(key),
            Some((_, None)) => false,
            None => true,
        }
    }

    /// Configuración que consume el servicio de jobs
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            total_budget: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            history_sample: self.history_sample,
            credentials_ready: self.credentials_ready(),
        }
    }

    /// Rutina de análisis configurada
    ///
    /// Sin `ANALYSIS_COMMAND` todo análisis falla con un error claro.
    pub fn analysis_routine(&self) -> Arc<dyn AnalysisRoutine> {
        let Some(command) = self
            .analysis_command
            .as_deref()
            .and_then(CommandAnalysis::from_command_line)
        else {
            return Arc::new(UnconfiguredAnalysis);
        };

        let mut command = command
            .with_env("LLM_PROVIDER", self.llm_provider.as_str())
            .with_env("DEEP_THINK_LLM", self.deep_think_llm.as_str())
            .with_env("QUICK_THINK_LLM", self.quick_think_llm.as_str())
            .with_env("MAX_DEBATE_ROUNDS", self.max_debate_rounds.to_string())
            .with_env("ONLINE_TOOLS", self.online_tools.to_string());

        let keys = [
            ("OPENAI_API_KEY", &self.openai_api_key),
            ("FINNHUB_API_KEY", &self.finnhub_api_key),
            ("GOOGLE_API_KEY", &self.google_api_key),
        ];
        for (name, value) in keys {
            if let Some(value) = value {
                command = command.with_env(name, value.as_str());
            }
        }

        Arc::new(command)
    }

    /// Configuración efectiva en JSON, con los secretos como booleanos
    pub fn public_view(&self) -> serde_json::Value {
        serde_json::json!({
            "llm_provider": self.llm_provider,
            "deep_think_llm": self.deep_think_llm,
            "quick_think_llm": self.quick_think_llm,
            "max_debate_rounds": self.max_debate_rounds,
            "online_tools": self.online_tools,
            "timeout_secs": self.timeout_secs,
            "poll_interval_secs": self.poll_interval_secs,
            "max_jobs": self.max_jobs,
            "history_limit": self.history_limit,
            "analysis_command_configured": self.analysis_command.is_some(),
            "credentials_ready": self.credentials_ready(),
            "api_keys": self.api_keys_present(),
        })
    }

    /// Qué API keys están presentes (nunca su valor)
    pub fn api_keys_present(&self) -> serde_json::Value {
        let present = |key: &Option<String>| key.as_deref().map(|k| !is_placeholder(k)).unwrap_or(false);
        serde_json::json!({
            "openai": present(&self.openai_api_key),
            "finnhub": present(&self.finnhub_api_key),
            "google": present(&self.google_api_key),
        })
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║            Multi-Agent Analysis Server Configuration         ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:      {}", self.address());
        println!();
        println!("⏱️  Jobs:");
        println!("   Timeout:      {} s", self.timeout_secs);
        println!("   Heartbeat:    every {} s", self.poll_interval_secs);
        if self.max_jobs > 0 {
            println!("   Retention:    {} jobs", self.max_jobs);
        } else {
            println!("   Retention:    unbounded");
        }
        println!();
        println!("🤖 Analysis:");
        println!(
            "   Command:      {}",
            self.analysis_command.as_deref().unwrap_or("(not configured)")
        );
        println!("   Provider:     {}", self.llm_provider);
        println!("   Models:       deep={} quick={}", self.deep_think_llm, self.quick_think_llm);
        println!("   Debate:       {} round(s)", self.max_debate_rounds);
        println!(
            "   Credentials:  {}",
            if self.credentials_ready() { "ready" } else { "missing" }
        );
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8001,
            host: "127.0.0.1".to_string(),
            timeout_secs: 480,
            poll_interval_secs: 15,
            max_jobs: 500,
            history_limit: 10,
            history_sample: true,
            analysis_command: None,
            openai_api_key: None,
            finnhub_api_key: None,
            google_api_key: None,
            llm_provider: "openai".to_string(),
            deep_think_llm: "gpt-4o-mini".to_string(),
            quick_think_llm: "gpt-4o-mini".to_string(),
            max_debate_rounds: 1,
            online_tools: true,
            log_format: LogFormat::Text,
        }
    }
}

/// Lee una API key del entorno (vacía = ausente)
fn secret_from_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Detecta valores de ejemplo como `your_openai_api_key_here`
pub fn is_placeholder(key: &str) -> bool {
    let key = key.trim().to_lowercase();
    key.is_empty()
        || (key.starts_with("your_") && key.ends_with("_here"))
        || key == "changeme"
        || key.contains("placeholder")
        || (key.len() >= 3 && key.chars().all(|c| c == 'x'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_keys_are_not_cli_flags() {
        assert!(Config::try_parse_from(["analysis_server"]).is_ok());
        assert!(Config::try_parse_from(["analysis_server", "--openai-api-key", "sk-test"]).is_err());
        assert!(Config::try_parse_from(["analysis_server", "--google-api-key", "g-test"]).is_err());
        assert!(Config::try_parse_from(["analysis_server", "sk-test"]).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8001);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.timeout_secs, 480);
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.max_jobs, 500);
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::try_parse_from([
            "analysis_server",
            "--port",
            "9000",
            "--timeout-secs",
            "120",
            "--history-sample",
            "false",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.timeout_secs, 120);
        assert!(!config.history_sample);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    // ==================== Validation ====================

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.timeout_secs = 0;
        assert!(config.validate().unwrap_err().contains("timeout"));
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = Config::default();
        config.poll_interval_secs = 0;
        assert!(config.validate().unwrap_err().contains("Poll interval"));
    }

    #[test]
    fn test_validate_poll_longer_than_timeout() {
        let mut config = Config::default();
        config.timeout_secs = 10;
        config.poll_interval_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_debate_rounds() {
        let mut config = Config::default();
        config.max_debate_rounds = 0;
        assert!(config.validate().unwrap_err().contains("debate"));
    }

    // ==================== Credentials ====================

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("your_openai_api_key_here"));
        assert!(is_placeholder("CHANGEME"));
        assert!(is_placeholder("xxxxxxxx"));
        assert!(is_placeholder("<placeholder>"));
        assert!(!is_placeholder("sk-proj-abc123"));
    }

    #[test]
    fn test_credentials_ready_for_openai() {
        let mut config = Config::default();
        assert!(!config.credentials_ready());

        config.openai_api_key = Some("your_openai_api_key_here".to_string());
        assert!(!config.credentials_ready());

        config.openai_api_key = Some("sk-real-key".to_string());
        assert!(config.credentials_ready());
        assert!(config.service_config().credentials_ready);
    }

    #[test]
    fn test_credentials_follow_provider() {
        let mut config = Config::default();
        config.llm_provider = "google".to_string();
        config.openai_api_key = Some("sk-real-key".to_string());
        assert!(!config.credentials_ready());

        config.google_api_key = Some("AIza-real".to_string());
        assert!(config.credentials_ready());

        config.llm_provider = "ollama".to_string();
        config.google_api_key = None;
        assert!(config.credentials_ready());
    }

    #[test]
    fn test_public_view_hides_secrets() {
        let mut config = Config::default();
        config.openai_api_key = Some("sk-secret-value".to_string());
        let view = config.public_view().to_string();
        assert!(!view.contains("sk-secret-value"));
        assert!(view.contains(r#""openai":true"#));
    }

    #[test]
    fn test_service_config() {
        let mut config = Config::default();
        config.timeout_secs = 120;
        config.poll_interval_secs = 5;
        let service = config.service_config();
        assert_eq!(service.total_budget, Duration::from_secs(120));
        assert_eq!(service.poll_interval, Duration::from_secs(5));
        assert!(service.history_sample);
    }

    #[test]
    fn test_unconfigured_routine() {
        let routine = Config::default().analysis_routine();
        assert!(routine.run("AAPL", "2025-08-27").is_err());
    }

    #[test]
    fn test_config_print_summary() {
        let config = Config::default();
        // Should not panic
        config.print_summary();
    }
}
