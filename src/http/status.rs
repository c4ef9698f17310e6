//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! Códigos que usa la API de análisis:
//!
//! - **2xx**: 200 (snapshot), 202 (análisis iniciado), 204
//! - **4xx**: 400, 404, 405, 408 (timeout del análisis), 409 (reporte no listo)
//! - **5xx**: 500 (análisis fallido), 503 (credenciales no configuradas)

/// Códigos de estado soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 200,

    /// El análisis se inició en segundo plano
    Accepted = 202,

    NoContent = 204,

    BadRequest = 400,

    NotFound = 404,

    /// Ruta conocida con otro método
    MethodNotAllowed = 405,

    /// El análisis agotó su presupuesto de tiempo
    RequestTimeout = 408,

    /// Conflicto en el estado del recurso (ej: reporte de un job en curso)
    Conflict = 409,

    InternalServerError = 500,

    /// Precondición de configuración no cumplida
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Convierte el código a su valor numérico
    ///
    /// # Ejemplo
    /// ```
    /// use analysis_server::http::StatusCode;
    /// assert_eq!(StatusCode::Accepted.as_u16(), 202);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::Conflict => "Conflict",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Verifica si el código indica éxito (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::Ok.as_u16(), 200);
        assert_eq!(StatusCode::RequestTimeout.as_u16(), 408);
        assert_eq!(StatusCode::ServiceUnavailable.as_u16(), 503);
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::Accepted.to_string(), "202 Accepted");
        assert_eq!(StatusCode::RequestTimeout.to_string(), "408 Request Timeout");
    }

    #[test]
    fn test_categories() {
        assert!(StatusCode::Accepted.is_success());
        assert!(StatusCode::NoContent.is_success());
        assert!(StatusCode::Conflict.is_client_error());
        assert!(!StatusCode::Conflict.is_server_error());
        assert!(StatusCode::InternalServerError.is_server_error());
    }
}
