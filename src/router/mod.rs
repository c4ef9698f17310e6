//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea `(método, path)` a handlers.
//!
//! ```text
//! Request → Router → Handler(&Request, &State) → Response
//! ```
//!
//! Los patrones admiten segmentos `{nombre}` que se capturan como
//! parámetros del path (ej: `/api/progress/{id}`). Un request `HEAD` usa
//! la ruta `GET` equivalente. Sin ruta para el path se retorna 404; con
//! ruta pero otro método, 405.

use crate::http::{Method, Request, Response, StatusCode};
use std::collections::HashMap;

/// Un handler recibe el request y el estado compartido del servidor
pub type Handler<S> = fn(&Request, &S) -> Response;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route<S> {
    method: Method,
    segments: Vec<Segment>,
    handler: Handler<S>,
}

impl<S> Route<S> {
    /// Compara el path con el patrón y captura los parámetros
    fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

/// Router que mapea rutas a handlers
pub struct Router<S> {
    routes: Vec<Route<S>>,
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registra una ruta con su handler
    ///
    /// # Ejemplo
    /// ```
    /// use analysis_server::router::Router;
    /// use analysis_server::http::{Method, Request, Response};
    ///
    /// fn hello_handler(_req: &Request, _state: &()) -> Response {
    ///     Response::json(r#"{"message": "Hello"}"#)
    /// }
    ///
    /// let mut router: Router<()> = Router::new();
    /// router.register(Method::GET, "/hello", hello_handler);
    /// ```
    pub fn register(&mut self, method: Method, pattern: &str, handler: Handler<S>) {
        let segments = split_path(pattern)
            .map(|part| {
                match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                    Some(name) => Segment::Param(name.to_string()),
                    None => Segment::Literal(part.to_string()),
                }
            })
            .collect();

        self.routes.push(Route {
            method,
            segments,
            handler,
        });
    }

    /// Encuentra y ejecuta el handler apropiado
    pub fn route(&self, mut request: Request, state: &S) -> Response {
        let method = match request.method() {
            Method::HEAD => Method::GET,
            other => other,
        };

        let mut path_known = false;
        for route in &self.routes {
            let Some(params) = route.matches(request.path()) else {
                continue;
            };
            path_known = true;
            if route.method != method {
                continue;
            }

            request.set_path_params(params);
            let mut response = (route.handler)(&request, state);
            Self::add_common_headers(&mut response);
            return response;
        }

        let mut response = if path_known {
            Response::error(
                StatusCode::MethodNotAllowed,
                &format!("Method {} not allowed for {}", request.method().as_str(), request.path()),
            )
        } else {
            Response::error(
                StatusCode::NotFound,
                &format!("Route not found: {}", request.path()),
            )
        };
        Self::add_common_headers(&mut response);
        response
    }

    /// Headers comunes a todas las respuestas
    fn add_common_headers(response: &mut Response) {
        response.add_header("Server", "analysis-server/0.1");
        response.add_header("Connection", "close");
    }
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_handler(_req: &Request, _state: &()) -> Response {
        Response::json(r#"{"test": "ok"}"#)
    }

    fn echo_id_handler(req: &Request, _state: &()) -> Response {
        Response::json(&format!(r#"{{"id": "{}"}}"#, req.path_param("id").unwrap_or("")))
    }

    fn counter_handler(_req: &Request, state: &usize) -> Response {
        Response::json(&format!(r#"{{"count": {}}}"#, state))
    }

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_route_found() {
        let mut router: Router<()> = Router::new();
        router.register(Method::GET, "/api/health", ok_handler);

        let response = router.route(request("GET /api/health HTTP/1.0\r\n\r\n"), &());
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.header("Connection"), Some("close"));
    }

    #[test]
    fn test_route_not_found() {
        let router: Router<()> = Router::new();
        let response = router.route(request("GET /nonexistent HTTP/1.0\r\n\r\n"), &());
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[test]
    fn test_path_params() {
        let mut router: Router<()> = Router::new();
        router.register(Method::GET, "/api/progress/{id}", echo_id_handler);

        let response = router.route(
            request("GET /api/progress/AAPL_2025-08-27_20250827120000 HTTP/1.0\r\n\r\n"),
            &(),
        );
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(
            response.body(),
            br#"{"id": "AAPL_2025-08-27_20250827120000"}"#
        );

        // Un segmento extra no coincide
        let response = router.route(request("GET /api/progress/a/b HTTP/1.0\r\n\r\n"), &());
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[test]
    fn test_literal_wins_by_registration_order() {
        let mut router: Router<()> = Router::new();
        router.register(Method::GET, "/api/progress", ok_handler);
        router.register(Method::GET, "/api/progress/{id}", echo_id_handler);

        let response = router.route(request("GET /api/progress HTTP/1.0\r\n\r\n"), &());
        assert_eq!(response.body(), br#"{"test": "ok"}"#);
    }

    #[test]
    fn test_method_not_allowed() {
        let mut router: Router<()> = Router::new();
        router.register(Method::POST, "/api/analyze", ok_handler);

        let response = router.route(request("GET /api/analyze HTTP/1.0\r\n\r\n"), &());
        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
    }

    #[test]
    fn test_head_uses_get_route() {
        let mut router: Router<()> = Router::new();
        router.register(Method::GET, "/health", ok_handler);

        let response = router.route(request("HEAD /health HTTP/1.0\r\n\r\n"), &());
        assert_eq!(response.status(), StatusCode::Ok);
    }

    #[test]
    fn test_state_is_passed() {
        let mut router: Router<usize> = Router::new();
        router.register(Method::GET, "/count", counter_handler);

        let response = router.route(request("GET /count HTTP/1.0\r\n\r\n"), &7usize);
        assert_eq!(response.body(), br#"{"count": 7}"#);
    }
}
