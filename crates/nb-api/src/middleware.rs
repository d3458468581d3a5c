//! noticeboard/crates/nb-api/src/middleware.rs Middleware
//!
//! Custom middleware for security, logging, and traffic control.

use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};

/// Returns the request logger for the noticeboard.
pub fn standard_middleware() -> Logger {
    // remote-ip "request-line" status-code response-size "referrer" "user-agent"
    Logger::default()
}

/// Configures CORS (Cross-Origin Resource Sharing) for the JSON API.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_any_header()
        .max_age(3600)
}

/// Headers added to every response.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("Content-Security-Policy", "default-src 'self'; style-src 'self' 'unsafe-inline'"))
}
