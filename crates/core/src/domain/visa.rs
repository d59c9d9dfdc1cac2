use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::{ApplicationId, ApplicationStatus};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisaId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visa {
    pub id: VisaId,
    pub visa_number: String,
    pub verification_code: String,
    pub application_id: ApplicationId,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub stay_duration: i64,
    pub pdf_url: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Visa {
    /// A visa verifies only while its window is open and the application is still issued.
    pub fn is_valid_on(&self, today: NaiveDate, status: ApplicationStatus) -> bool {
        self.valid_to >= today && status == ApplicationStatus::Issued
    }
}

pub fn pdf_url_for(application_id: &ApplicationId) -> String {
    format!("/api/visas/{}/pdf", application_id.0)
}
