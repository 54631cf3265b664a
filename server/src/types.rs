//! Shared HTTP-layer types: application context, error response shape, and
//! the resource-kind table the router is built from.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rmmgate_core::model::ErrorInfo;
use rmmgate_core::{CollectionStore, GatewayError};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn CollectionStore>,
    pub start_time: Instant,
}

/// The nine document collections the Resource Router is mounted over.
pub const RESOURCE_COLLECTIONS: [&str; 9] =
    ["records", "fields", "apis", "releasesets", "taxonomy", "versions", "code", "patents", "papers"];

/// Candidate identifier fields tried, in order, for a single-document
/// lookup across any resource collection.
pub const ID_FIELDS: [&str; 2] = ["ediid", "@id"];

fn status_from_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Render a [`GatewayError`] as the shared `{url, message, httpStatus}`
/// error body, at the given request path.
pub fn error_response(err: GatewayError, path: &str) -> Response {
    let status = status_from_code(err.status_code());
    let body = ErrorInfo { url: path.to_string(), message: err.to_string(), http_status: status.to_string() };
    (status, Json(body)).into_response()
}
