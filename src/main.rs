//! # Analysis Server - Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor de análisis.

use analysis_server::config::Config;
use analysis_server::jobs::{JobRegistry, JobService};
use analysis_server::logging::init_logging;
use analysis_server::server::{AppState, Server};

fn main() {
    let config = Config::new();
    init_logging(config.log_format);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(2);
    }

    config.print_summary();
    if !config.credentials_ready() {
        tracing::warn!(
            provider = %config.llm_provider,
            "LLM credentials missing: synchronous analyses will be rejected"
        );
    }

    let registry = JobRegistry::new(config.max_jobs);
    let service = JobService::new(config.service_config(), registry, config.analysis_routine());
    let server = Server::new(AppState::new(config, service));

    if let Err(e) = server.run() {
        tracing::error!(error = %e, "Fatal server error");
        std::process::exit(1);
    }
}
