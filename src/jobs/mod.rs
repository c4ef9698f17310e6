//! # Sistema de Jobs
//! src/jobs/mod.rs
//!
//! Motor asíncrono de análisis: cada job corre en su propio thread y
//! los clientes consultan su progreso sin bloquear.
//!
//! ## Piezas
//!
//! - `types`: `JobRecord` y `JobStatus` (estados terminales pegajosos)
//! - `job`: `JobHandle`, el registro compartido detrás de un mutex
//! - `storage`: `JobRegistry`, tabla concurrente con retención acotada
//! - `normalizer`: reduce la salida cruda a reporte y decisión
//! - `executor`: lanza el análisis y entrega el resultado una sola vez
//! - `supervisor`: espera con presupuesto de tiempo y heartbeats
//! - `manager`: `JobService`, las operaciones públicas
//! - `report`: reporte de texto para descargar
//! - `handlers`: endpoints HTTP

pub mod executor;
pub mod handlers;
pub mod job;
pub mod manager;
pub mod normalizer;
pub mod report;
pub mod storage;
pub mod supervisor;
pub mod types;

pub use job::JobHandle;
pub use manager::{JobService, ServiceConfig};
pub use storage::JobRegistry;
pub use supervisor::WaitCancel;
pub use types::{JobRecord, JobStatus};
