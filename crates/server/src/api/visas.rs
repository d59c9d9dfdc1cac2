//! Visa document download and public verification.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use evisa_core::domain::application::ApplicationId;
use tracing::info;

use super::{new_correlation_id, ApiError, AppState, OrApiError};
use crate::workflow::Verification;

pub async fn download_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let correlation_id = new_correlation_id();
    let document = state.workflow.visa_document(&ApplicationId(id)).await.or_api(&correlation_id)?;

    let rendered = state
        .documents
        .render(&document.application, &document.visa, document.product.as_ref())
        .await
        .map_err(|error| ApiError::internal(error.to_string(), &correlation_id))?;

    info!(
        event_name = "visa.document.served",
        correlation_id = %correlation_id,
        application_id = %document.application.id,
        visa_number = %document.visa.visa_number,
        "visa document rendered"
    );
    Ok(rendered.into_response(&format!("e-Visa-{}.pdf", document.application.application_number)))
}

pub async fn verify(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Verification>, ApiError> {
    let correlation_id = new_correlation_id();
    let verification = state.workflow.verify(code.trim()).await.or_api(&correlation_id)?;
    Ok(Json(verification))
}
