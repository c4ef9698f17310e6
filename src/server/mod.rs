//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Servidor TCP que expone el servicio de jobs:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones entrantes (un thread por conexión)
//! 3. Lee y parsea requests HTTP/1.0
//! 4. Despacha al router y envía la respuesta

pub mod tcp;

use crate::config::Config;
use crate::jobs::JobService;

pub use tcp::{build_router, Server};

/// Estado compartido por todos los handlers
pub struct AppState {
    pub config: Config,
    pub service: JobService,
}

impl AppState {
    pub fn new(config: Config, service: JobService) -> Self {
        Self { config, service }
    }
}
