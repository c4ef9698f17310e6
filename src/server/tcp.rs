//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Implementación del servidor TCP que maneja múltiples conexiones
//! simultáneas usando threads. Cada conexión se procesa en su propio
//! thread; un análisis síncrono bloquea solo su conexión.

use super::AppState;
use crate::http::request::{content_length, find_header_end};
use crate::http::{Method, Request, Response, StatusCode};
use crate::jobs::handlers;
use crate::router::Router;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Tamaño del buffer de lectura
const READ_CHUNK: usize = 8192;

/// Tamaño máximo aceptado para un request (headers + body)
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Tiempo máximo esperando bytes del cliente
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Tabla de rutas de la API
pub fn build_router() -> Router<AppState> {
    let mut router = Router::new();

    router.register(Method::GET, "/", handlers::index_handler);
    router.register(Method::GET, "/health", handlers::health_handler);
    router.register(Method::GET, "/api/health", handlers::health_handler);

    router.register(Method::POST, "/api/analyze", handlers::analyze_handler);
    router.register(Method::GET, "/api/progress", handlers::all_progress_handler);
    router.register(Method::GET, "/api/progress/{id}", handlers::progress_handler);
    router.register(Method::GET, "/api/history", handlers::history_handler);
    router.register(Method::GET, "/api/download/{id}", handlers::download_handler);
    router.register(Method::GET, "/api/config", handlers::config_handler);
    router.register(Method::GET, "/agents", handlers::agents_handler);
    router.register(Method::GET, "/api/agents", handlers::agents_handler);

    router
}

/// Servidor HTTP/1.0 concurrente
pub struct Server {
    state: Arc<AppState>,
    router: Arc<Router<AppState>>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            router: Arc::new(build_router()),
        }
    }

    /// Hace bind en la dirección configurada y atiende conexiones
    pub fn run(&self) -> io::Result<()> {
        let address = self.state.config.address();
        let listener = TcpListener::bind(&address)?;
        tracing::info!(%address, "Server listening (one thread per connection)");
        self.serve(listener)
    }

    /// Atiende conexiones de un listener ya creado
    pub fn serve(&self, listener: TcpListener) -> io::Result<()> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let router = Arc::clone(&self.router);
                    let state = Arc::clone(&self.state);

                    let peer_addr = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    tracing::debug!(peer = %peer_addr, "Connection accepted");

                    let spawned = thread::Builder::new()
                        .name("http-conn".to_string())
                        .spawn(move || {
                            if let Err(e) = Self::handle_connection_static(stream, router, state) {
                                tracing::warn!(peer = %peer_addr, error = %e, "Connection error");
                            }
                        });
                    if let Err(e) = spawned {
                        tracing::error!(error = %e, "Failed to spawn connection thread");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            }
        }

        Ok(())
    }

    fn handle_connection_static(
        mut stream: TcpStream,
        router: Arc<Router<AppState>>,
        state: Arc<AppState>,
    ) -> io::Result<()> {
        let start = Instant::now();
        let request_id = request_id();

        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let buffer = match read_request(&mut stream) {
            Ok(buffer) => buffer,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                let mut response = Response::error(StatusCode::BadRequest, &e.to_string());
                response.add_header("X-Request-Id", &request_id);
                stream.write_all(&response.to_bytes())?;
                return stream.flush();
            }
            Err(e) => return Err(e),
        };

        if buffer.is_empty() {
            tracing::debug!(request_id = %request_id, "Connection closed without data");
            return Ok(());
        }

        let (mut response, method, path) = match Request::parse(&buffer) {
            Ok(request) => {
                let method = request.method();
                let path = request.path().to_string();
                (router.route(request, &state), Some(method), path)
            }
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "Malformed request");
                (
                    Response::error(StatusCode::BadRequest, &format!("Invalid request: {}", e)),
                    None,
                    String::new(),
                )
            }
        };

        response.add_header("X-Request-Id", &request_id);

        let bytes = if method == Some(Method::HEAD) {
            response.head_bytes()
        } else {
            response.to_bytes()
        };
        stream.write_all(&bytes)?;
        stream.flush()?;

        tracing::info!(
            request_id = %request_id,
            method = method.map(|m| m.as_str()).unwrap_or("-"),
            path = %path,
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Request handled"
        );

        Ok(())
    }
}

/// ID corto para correlacionar logs y respuestas
fn request_id() -> String {
    let mut hasher = DefaultHasher::new();
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
        .hash(&mut hasher);
    thread::current().id().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Lee hasta completar headers y body (según `Content-Length`)
fn read_request(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let bytes_read = stream.read(&mut chunk)?;
        if bytes_read == 0 {
            return Ok(buffer);
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);

        if let Some(end) = find_header_end(&buffer) {
            let expected = content_length(&buffer[..end])
                .checked_add(end + 4)
                .filter(|expected| *expected <= MAX_REQUEST_BYTES)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Request too large"))?;
            if buffer.len() >= expected {
                return Ok(buffer);
            }
        } else if buffer.len() > MAX_REQUEST_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Request headers too large"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, AnalysisOutput, AnalysisRoutine};
    use crate::config::Config;
    use crate::jobs::{JobRegistry, JobService, ServiceConfig};

    fn test_state() -> Arc<AppState> {
        let routine: Arc<dyn AnalysisRoutine> =
            Arc::new(|_: &str, _: &str| -> Result<AnalysisOutput, AnalysisError> {
                Ok(AnalysisOutput::new("report", "FINAL TRANSACTION PROPOSAL: HOLD"))
            });
        let service = JobService::new(ServiceConfig::default(), JobRegistry::new(0), routine);
        Arc::new(AppState::new(Config::default(), service))
    }

    /// Acepta una conexión, la procesa y retorna lo que recibió el cliente
    fn roundtrip(raw: &[u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();

        let router = Arc::new(build_router());
        let state = test_state();
        let t = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            Server::handle_connection_static(stream, router, state).unwrap();
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(raw).unwrap();
        client.shutdown(std::net::Shutdown::Write).unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).unwrap();
        t.join().unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_health_ok() {
        let text = roundtrip(b"GET /health HTTP/1.0\r\n\r\n");

        assert!(text.starts_with("HTTP/1.0 200 OK"));
        assert!(text.contains("X-Request-Id:"));
        assert!(text.contains("Connection: close"));
        assert!(text.contains("\"healthy\""));
    }

    #[test]
    fn test_index_and_agents_routes() {
        let text = roundtrip(b"GET / HTTP/1.0\r\n\r\n");
        assert!(text.starts_with("HTTP/1.0 200 OK"));
        assert!(text.contains("\"endpoints\""));

        let text = roundtrip(b"GET /api/agents HTTP/1.0\r\n\r\n");
        assert!(text.starts_with("HTTP/1.0 200 OK"));
        assert!(text.contains("\"analyst_team\""));
    }

    #[test]
    fn test_head_has_no_body() {
        let text = roundtrip(b"HEAD /api/health HTTP/1.0\r\n\r\n");

        assert!(text.starts_with("HTTP/1.0 200 OK"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_post_body_split_across_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();
        let router = Arc::new(build_router());
        let state = test_state();
        let t = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            Server::handle_connection_static(stream, router, state).unwrap();
        });

        let body = r#"{"symbol": "MSFT", "date": "2025-08-27"}"#;
        let mut client = TcpStream::connect(addr).unwrap();
        client
            .write_all(
                format!(
                    "POST /api/analyze HTTP/1.0\r\nContent-Length: {}\r\n\r\n",
                    body.len()
                )
                .as_bytes(),
            )
            .unwrap();
        client.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
        client.write_all(body.as_bytes()).unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).unwrap();
        t.join().unwrap();

        let text = String::from_utf8_lossy(&buf);
        assert!(text.starts_with("HTTP/1.0 202 Accepted"));
        assert!(text.contains("MSFT_2025-08-27_"));
    }

    #[test]
    fn test_huge_content_length_rejected() {
        let text = roundtrip(
            b"POST /api/analyze HTTP/1.0\r\nContent-Length: 18446744073709551615\r\n\r\n{}",
        );
        assert!(text.starts_with("HTTP/1.0 400 Bad Request"));
        assert!(text.contains("Request too large"));
    }

    #[test]
    fn test_oversized_body_rejected() {
        let raw = format!(
            "POST /api/analyze HTTP/1.0\r\nContent-Length: {}\r\n\r\n{{}}",
            MAX_REQUEST_BYTES + 1
        );
        let text = roundtrip(raw.as_bytes());
        assert!(text.starts_with("HTTP/1.0 400 Bad Request"));
    }

    #[test]
    fn test_unknown_route() {
        let text = roundtrip(b"GET /api/unknown HTTP/1.0\r\n\r\n");
        assert!(text.starts_with("HTTP/1.0 404 Not Found"));
    }

    #[test]
    fn test_method_not_allowed() {
        let text = roundtrip(b"GET /api/analyze HTTP/1.0\r\n\r\n");
        assert!(text.starts_with("HTTP/1.0 405 Method Not Allowed"));
    }

    #[test]
    fn test_parse_error() {
        let text = roundtrip(b"\x00\x01\x02\x03garbage\r\n\r\n");
        assert!(text.contains("400 Bad Request"));
        assert!(text.contains("Invalid request"));
    }

    #[test]
    fn test_peer_closed_immediately() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().unwrap();
        let router = Arc::new(build_router());
        let state = test_state();

        let t = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            Server::handle_connection_static(stream, router, state).unwrap();
        });

        drop(TcpStream::connect(addr).unwrap());
        t.join().unwrap();
    }
}
