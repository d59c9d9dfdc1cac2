//! Public and back-office REST API.

pub mod admin;
pub mod applications;
pub mod payments;
pub mod visas;

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use evisa_core::errors::{ApplicationError, FieldError, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};

use crate::pdf::VisaDocumentRenderer;
use crate::workflow::VisaWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<VisaWorkflow>,
    pub documents: Arc<VisaDocumentRenderer>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/visa-products", get(applications::list_products))
        .route("/api/applications/draft", post(applications::create_draft))
        .route("/api/applications/track/{reference}", get(applications::track))
        .route(
            "/api/applications/{id}",
            get(applications::get_application).patch(applications::update_application),
        )
        .route("/api/payments/{id}/confirm", post(payments::confirm))
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/applications", get(admin::list_applications))
        .route("/api/admin/applications/{id}", get(admin::application_detail))
        .route("/api/admin/applications/{id}/status", patch(admin::change_status))
        .route("/api/visas/{id}/pdf", get(visas::download_pdf))
        .route("/api/verify/{code}", get(visas::verify))
        .with_state(state)
}

pub(crate) fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Error body: `{"error": ..., "correlationId": ..., "fields": [...]}`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: &'a str,
    correlation_id: &'a str,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [FieldError],
}

fn no_fields(fields: &&[FieldError]) -> bool {
    fields.is_empty()
}

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn unauthorized(correlation_id: &str) -> Self {
        Self(InterfaceError::Unauthorized {
            message: "Invalid credentials".to_string(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            fields: Vec::new(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn internal(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::Internal {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation_id = self.0.correlation_id();
        let empty: &[FieldError] = &[];
        let (status, message, fields) = match &self.0 {
            InterfaceError::BadRequest { message, fields, .. } => {
                (StatusCode::BAD_REQUEST, message.as_str(), fields.as_slice())
            }
            InterfaceError::Unauthorized { message, .. } => {
                (StatusCode::UNAUTHORIZED, message.as_str(), empty)
            }
            InterfaceError::NotFound { message, .. } => (StatusCode::NOT_FOUND, message.as_str(), empty),
            InterfaceError::Conflict { message, .. } => (StatusCode::CONFLICT, message.as_str(), empty),
            InterfaceError::Internal { message, .. } => {
                error!(
                    event_name = "api.request.failed",
                    correlation_id = %correlation_id,
                    error = %message,
                    "request failed with internal error"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.user_message(), empty)
            }
        };
        if status.is_client_error() {
            warn!(
                event_name = "api.request.rejected",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %message,
                "request rejected"
            );
        }

        let body = ErrorBody { error: message, correlation_id, fields };
        (status, Json(body)).into_response()
    }
}

pub(crate) trait OrApiError<T> {
    fn or_api(self, correlation_id: &str) -> Result<T, ApiError>;
}

impl<T> OrApiError<T> for Result<T, ApplicationError> {
    fn or_api(self, correlation_id: &str) -> Result<T, ApiError> {
        self.map_err(|error| ApiError::from_application(error, correlation_id))
    }
}

/// Unwraps a JSON body, reporting malformed input as 400.
pub(crate) fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        ApiError::bad_request(format!("invalid request body: {}", rejection.body_text()), correlation_id)
    })
}
