//! # Analysis Server
//! src/lib.rs
//!
//! Motor de jobs para análisis multi-agente de acciones, expuesto por un
//! servidor HTTP/1.0 implementado desde cero.
//!
//! ## Arquitectura
//!
//! - `analysis`: contrato de la rutina de análisis y su salida cruda
//! - `jobs`: registro, ejecutor, supervisor de timeout y servicio de jobs
//! - `http`: parsing y construcción de mensajes HTTP/1.0
//! - `router`: enrutamiento de `(método, path)` a handlers
//! - `server`: servidor TCP, un thread por conexión
//! - `config`: argumentos CLI y variables de entorno
//! - `logging`: inicialización de `tracing`
//! - `error`: errores del servicio de jobs
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use analysis_server::config::Config;
//! use analysis_server::jobs::{JobRegistry, JobService};
//! use analysis_server::server::{AppState, Server};
//!
//! let config = Config::default();
//! let registry = JobRegistry::new(config.max_jobs);
//! let service = JobService::new(config.service_config(), registry, config.analysis_routine());
//! let server = Server::new(AppState::new(config, service));
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod logging;
pub mod router;
pub mod server;
