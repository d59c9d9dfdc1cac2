use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::application::Application;
use crate::domain::product::{VisaProduct, FALLBACK_DURATION_DAYS};
use crate::domain::visa::{pdf_url_for, Visa, VisaId};
use crate::numbering::{verification_code, visa_number};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityWindow {
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub stay_duration: i64,
}

/// Window opens on the arrival date (or today) and lasts the product's stay duration.
pub fn validity_window(
    arrival_date: Option<NaiveDate>,
    today: NaiveDate,
    product: Option<&VisaProduct>,
) -> ValidityWindow {
    let valid_from = arrival_date.unwrap_or(today);
    let stay_duration = product.map_or(FALLBACK_DURATION_DAYS, |product| product.duration_days);
    ValidityWindow { valid_from, valid_to: valid_from + Duration::days(stay_duration), stay_duration }
}

/// Builds the visa row for an approved application from an already allocated sequence.
pub fn issue_visa(
    application: &Application,
    product: Option<&VisaProduct>,
    visa_sequence: i64,
    now: DateTime<Utc>,
) -> Visa {
    let window = validity_window(application.arrival_date, now.date_naive(), product);
    Visa {
        id: VisaId(Uuid::new_v4().to_string()),
        visa_number: visa_number(visa_sequence),
        verification_code: verification_code(now),
        application_id: application.id.clone(),
        valid_from: window.valid_from,
        valid_to: window.valid_to,
        stay_duration: window.stay_duration,
        pdf_url: Some(pdf_url_for(&application.id)),
        issued_at: now,
    }
}
