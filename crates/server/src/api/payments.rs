//! Payment provider callback.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use evisa_core::domain::application::ApplicationId;
use evisa_core::domain::payment::Payment;
use serde::Deserialize;

use super::{new_correlation_id, ApiError, AppState, OrApiError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub transaction_id: Option<String>,
}

/// The body is optional; an empty request confirms with a generated transaction id.
pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Payment>, ApiError> {
    let correlation_id = new_correlation_id();
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ConfirmRequest::default()
    } else {
        serde_json::from_slice::<ConfirmRequest>(&body)
            .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?
    };

    let payment = state
        .workflow
        .confirm_payment(&ApplicationId(id), request.transaction_id)
        .await
        .or_api(&correlation_id)?;
    Ok(Json(payment))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::{seeded_app, send, send_raw};

    #[tokio::test]
    async fn confirming_a_paid_file_is_idempotent() {
        let (app, _pool) = seeded_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/payments/app-seed-usa-002/confirm",
            Some(json!({ "transactionId": "TXN-REPLAY" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "PAID");
        assert_eq!(body["transactionId"], "TXN-SEED-0002");
    }

    #[tokio::test]
    async fn pending_payment_is_confirmed_without_body() {
        let (app, _pool) = seeded_app().await;
        let (status, _) = send(
            &app,
            "PATCH",
            "/api/applications/app-seed-bel-003",
            Some(json!({
                "phone": "+32 470 12 34 56",
                "dateOfBirth": "1992-03-04",
                "passportNumber": "EM1234567",
                "passportExpiryDate": "2031-09-30",
                "arrivalDate": "2026-12-01",
                "status": "SUBMITTED"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, bytes) = send_raw(&app, "POST", "/api/payments/app-seed-bel-003/confirm", None).await;
        assert_eq!(status, StatusCode::OK);
        let payment: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payment["status"], "PAID");
        assert_eq!(payment["amount"], "255");
        assert!(payment["transactionId"].as_str().unwrap_or_default().starts_with("TXN-"));

        let (_, application) = send(&app, "GET", "/api/applications/app-seed-bel-003", None).await;
        assert_eq!(application["paymentStatus"], "PAID");
    }

    #[tokio::test]
    async fn draft_without_payment_is_not_found() {
        let (app, _pool) = seeded_app().await;

        let (status, _) = send(&app, "POST", "/api/payments/app-seed-bel-003/confirm", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
