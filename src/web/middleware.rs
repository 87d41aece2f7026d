//! Web middleware: request ids and API key authentication

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::config::SharedConfig;

use super::extractors::RequestContext;
use super::responses::ErrorBody;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Assign a short unique id to every request and echo it in the response
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(request).await;
    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", header_value);
    }
    response
}

/// Require the configured API key on every route except the health probe.
/// A missing configuration disables the check entirely.
pub async fn api_key_middleware(
    axum::extract::State(config): axum::extract::State<SharedConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let expected = {
        let config = config.read().await;
        config.web.api_key.clone()
    };

    let Some(expected) = expected.filter(|k| !k.is_empty()) else {
        return next.run(request).await;
    };

    if request.uri().path().ends_with("/health") {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        return next.run(request).await;
    }

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let body = ErrorBody {
        error: "Invalid or missing API key".to_string(),
        code: "AUTH_001".to_string(),
        timestamp: chrono::Utc::now(),
        request_id,
        context: None,
        troubleshooting: Some(format!(
            "Provide the configured API key in the {API_KEY_HEADER} header."
        )),
    };
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}
