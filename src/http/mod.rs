//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Implementación mínima de HTTP/1.0 para exponer el servicio de jobs:
//!
//! - Parsing de requests (con body JSON para POST)
//! - Construcción de responses
//! - Códigos de estado
//!
//! HTTP/1.0 (RFC 1945) no mantiene conexiones persistentes: cada request
//! abre su propia conexión y el servidor la cierra al responder.

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, Request};
pub use response::Response;
pub use status::StatusCode;
