//! Applicant-facing endpoints: products, drafts, updates, submission and tracking.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use evisa_core::domain::application::{Application, ApplicationId, ApplicationPatch, DraftRequest};
use evisa_core::domain::product::VisaProduct;
use serde::Deserialize;

use super::{json_body, new_correlation_id, ApiError, AppState, OrApiError};

#[derive(Debug, Default, Deserialize)]
pub struct TrackQuery {
    pub email: Option<String>,
}

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<VisaProduct>>, ApiError> {
    let correlation_id = new_correlation_id();
    let products = state.workflow.list_products().await.or_api(&correlation_id)?;
    Ok(Json(products))
}

pub async fn create_draft(
    State(state): State<AppState>,
    payload: Result<Json<DraftRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let correlation_id = new_correlation_id();
    let draft = json_body(payload, &correlation_id)?;
    let application = state.workflow.create_draft(draft).await.or_api(&correlation_id)?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    let correlation_id = new_correlation_id();
    let application =
        state.workflow.get_application(&ApplicationId(id)).await.or_api(&correlation_id)?;
    Ok(Json(application))
}

pub async fn update_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ApplicationPatch>, JsonRejection>,
) -> Result<Json<Application>, ApiError> {
    let correlation_id = new_correlation_id();
    let patch = json_body(payload, &correlation_id)?;
    let application = state
        .workflow
        .update_application(&ApplicationId(id), patch)
        .await
        .or_api(&correlation_id)?;
    Ok(Json(application))
}

pub async fn track(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<Application>, ApiError> {
    let correlation_id = new_correlation_id();
    let application =
        state.workflow.track(&reference, query.email.as_deref()).await.or_api(&correlation_id)?;
    Ok(Json(application))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::{seeded_app, send, send_raw};

    #[tokio::test]
    async fn lists_active_products() {
        let (app, _pool) = seeded_app().await;

        let (status, body) = send(&app, "GET", "/api/visa-products", None).await;

        assert_eq!(status, StatusCode::OK);
        let types: Vec<_> = body
            .as_array()
            .expect("array")
            .iter()
            .map(|product| product["type"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(types, vec!["VOLANT_ORDINAIRE", "VOLANT_SPECIFIQUE"]);
    }

    #[tokio::test]
    async fn draft_continues_seeded_numbering() {
        let (app, _pool) = seeded_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/applications/draft",
            Some(json!({
                "firstName": "Amina",
                "lastName": "Diallo",
                "email": "amina@example.sn",
                "nationality": "Sénégal"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "DRAFT");
        assert_eq!(body["visaType"], "VOLANT_ORDINAIRE");
        let number = body["applicationNumber"].as_str().expect("number");
        assert!(number.starts_with("eVisa-SEN-"), "{number}");
        assert!(number.ends_with("-00004"), "{number}");
    }

    #[tokio::test]
    async fn invalid_draft_reports_fields() {
        let (app, _pool) = seeded_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/applications/draft",
            Some(json!({ "firstName": "", "lastName": "Diallo", "email": "not-an-email", "nationality": "S" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<_> = body["fields"]
            .as_array()
            .expect("fields")
            .iter()
            .map(|field| field["field"].as_str().unwrap_or_default().to_string())
            .collect();
        assert!(fields.contains(&"firstName".to_string()));
        assert!(fields.contains(&"email".to_string()));
        assert!(fields.contains(&"nationality".to_string()));
        assert!(body["correlationId"].as_str().is_some());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (app, _pool) = seeded_app().await;

        let (status, _) =
            send_raw(&app, "POST", "/api/applications/draft", Some("{\"firstName\":".to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn patch_rejects_bad_dates_and_passport() {
        let (app, _pool) = seeded_app().await;

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/applications/app-seed-bel-003",
            Some(json!({ "arrivalDate": "01/06/2026" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/applications/app-seed-bel-003",
            Some(json!({ "passportNumber": "AB-12" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"][0]["field"], "passportNumber");
    }

    #[tokio::test]
    async fn draft_can_be_completed_and_submitted() {
        let (app, _pool) = seeded_app().await;

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/applications/app-seed-bel-003",
            Some(json!({
                "phone": "+32 470 12 34 56",
                "dateOfBirth": "1992-03-04",
                "passportNumber": "EM1234567",
                "passportExpiryDate": "2031-09-30",
                "arrivalDate": "2026-12-01",
                "departureDate": "2026-12-07",
                "purposeOfVisit": "Visite touristique au parc de la Garamba",
                "status": "SUBMITTED"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "SUBMITTED");
        assert_eq!(body["paymentStatus"], "PENDING");
        assert!(body["submittedAt"].is_string());
    }

    #[tokio::test]
    async fn applicant_cannot_request_review_statuses() {
        let (app, _pool) = seeded_app().await;

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/applications/app-seed-bel-003",
            Some(json!({ "status": "APPROVED" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn issued_application_is_locked() {
        let (app, _pool) = seeded_app().await;

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/applications/app-seed-fra-001",
            Some(json!({ "occupation": "Architecte" })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let (app, _pool) = seeded_app().await;

        let (status, body) = send(&app, "GET", "/api/applications/does-not-exist", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn tracking_matches_number_and_email_case_insensitively() {
        let (app, _pool) = seeded_app().await;

        let (status, body) = send(
            &app,
            "GET",
            "/api/applications/track/EVISA-USA-26-00002?email=John.Doe@Example.com",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "app-seed-usa-002");

        let (status, body) = send(
            &app,
            "GET",
            "/api/applications/track/eVisa-USA-26-00002?email=intruder@example.com",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("id").is_none());

        let (status, _) = send(&app, "GET", "/api/applications/track/eVisa-USA-26-00002", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
