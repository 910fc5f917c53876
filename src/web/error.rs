//! Mapping of application errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{CameraError, Error};

/// JSON body of every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

/// Error returned from request handlers
#[derive(Debug)]
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Camera(CameraError::Busy) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Camera(CameraError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Error::Camera(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Imaging(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Error::Imaging(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Serialization(_) | Error::Config(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client
    fn reason(&self) -> String {
        match &self.0 {
            Error::Camera(e) => e.to_string(),
            Error::Imaging(e) => e.to_string(),
            Error::InvalidRequest(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = self.reason();

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("Error processing request: {}", self.0);
        } else {
            tracing::warn!("Request failed ({}): {}", status.as_u16(), reason);
        }

        let body = ErrorBody {
            error: reason,
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
