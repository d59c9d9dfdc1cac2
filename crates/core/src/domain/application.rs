use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::payment::PaymentStatus;
use crate::domain::product::VisaType;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    NeedInfo,
    Approved,
    Rejected,
    Issued,
    Expired,
    Revoked,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 9] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::NeedInfo,
        Self::Approved,
        Self::Rejected,
        Self::Issued,
        Self::Expired,
        Self::Revoked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::NeedInfo => "NEED_INFO",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Issued => "ISSUED",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
        }
    }

    /// States an administrator can no longer move out of.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Issued | Self::Expired | Self::Revoked
        )
    }

    /// States in which the applicant may still edit their own data.
    pub fn is_applicant_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::NeedInfo)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!("unknown application status `{value}`"))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub application_number: String,
    pub sequence_number: i64,
    pub visa_type: VisaType,
    pub status: ApplicationStatus,

    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub nationality: String,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub gender: Option<String>,
    pub civil_status: Option<String>,
    pub occupation: Option<String>,
    pub address: Option<String>,
    pub country_of_origin: Option<String>,

    pub passport_number: Option<String>,
    pub passport_issue_date: Option<NaiveDate>,
    pub passport_expiry_date: Option<NaiveDate>,
    pub passport_issuing_country: Option<String>,

    pub arrival_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    pub entry_point: Option<String>,
    pub purpose_of_visit: Option<String>,
    pub institution_code: Option<String>,

    pub sponsor_first_name: Option<String>,
    pub sponsor_last_name: Option<String>,
    pub sponsor_address: Option<String>,
    pub sponsor_phone: Option<String>,

    pub photo_path: Option<String>,
    pub passport_copy_path: Option<String>,

    pub payment_status: PaymentStatus,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,

    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Builds a fresh draft. Numbering is assigned by the caller from the sequence allocator.
    pub fn new_draft(
        draft: &DraftRequest,
        visa_type: VisaType,
        application_number: String,
        sequence_number: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::generate(),
            application_number,
            sequence_number,
            visa_type,
            status: ApplicationStatus::Draft,
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            email: draft.email.trim().to_string(),
            phone: None,
            nationality: draft.nationality.trim().to_string(),
            date_of_birth: None,
            place_of_birth: None,
            gender: None,
            civil_status: None,
            occupation: None,
            address: None,
            country_of_origin: None,
            passport_number: None,
            passport_issue_date: None,
            passport_expiry_date: None,
            passport_issuing_country: None,
            arrival_date: None,
            departure_date: None,
            entry_point: None,
            purpose_of_visit: None,
            institution_code: None,
            sponsor_first_name: None,
            sponsor_last_name: None,
            sponsor_address: None,
            sponsor_phone: None,
            photo_path: None,
            passport_copy_path: None,
            payment_status: PaymentStatus::Initiated,
            admin_notes: None,
            rejection_reason: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn sponsor_full_name(&self) -> Option<String> {
        match (&self.sponsor_first_name, &self.sponsor_last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        }
    }

    pub fn email_matches(&self, candidate: &str) -> bool {
        self.email.trim().to_lowercase() == candidate.trim().to_lowercase()
    }

    /// Copies every field present in the patch. Status is handled by the lifecycle, not here.
    pub fn apply_patch(&mut self, patch: &ApplicationPatch) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if let Some(value) = value {
                *target = Some(value.clone());
            }
        }

        set(&mut self.first_name, &patch.first_name);
        set(&mut self.last_name, &patch.last_name);
        set(&mut self.email, &patch.email);
        set(&mut self.nationality, &patch.nationality);
        set_opt(&mut self.phone, &patch.phone);
        set_opt(&mut self.date_of_birth, &patch.date_of_birth);
        set_opt(&mut self.place_of_birth, &patch.place_of_birth);
        set_opt(&mut self.gender, &patch.gender);
        set_opt(&mut self.civil_status, &patch.civil_status);
        set_opt(&mut self.occupation, &patch.occupation);
        set_opt(&mut self.address, &patch.address);
        set_opt(&mut self.country_of_origin, &patch.country_of_origin);
        set_opt(&mut self.passport_number, &patch.passport_number);
        set_opt(&mut self.passport_issue_date, &patch.passport_issue_date);
        set_opt(&mut self.passport_expiry_date, &patch.passport_expiry_date);
        set_opt(&mut self.passport_issuing_country, &patch.passport_issuing_country);
        set_opt(&mut self.arrival_date, &patch.arrival_date);
        set_opt(&mut self.departure_date, &patch.departure_date);
        set_opt(&mut self.entry_point, &patch.entry_point);
        set_opt(&mut self.purpose_of_visit, &patch.purpose_of_visit);
        set_opt(&mut self.institution_code, &patch.institution_code);
        set_opt(&mut self.sponsor_first_name, &patch.sponsor_first_name);
        set_opt(&mut self.sponsor_last_name, &patch.sponsor_last_name);
        set_opt(&mut self.sponsor_address, &patch.sponsor_address);
        set_opt(&mut self.sponsor_phone, &patch.sponsor_phone);
        set_opt(&mut self.photo_path, &patch.photo_path);
        set_opt(&mut self.passport_copy_path, &patch.passport_copy_path);
        if let Some(visa_type) = &patch.visa_type {
            self.visa_type = visa_type.clone();
        }
    }
}

/// Identity step of the wizard: the minimum needed to open a draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nationality: String,
    pub visa_type: Option<String>,
}

/// Partial update sent by the applicant while filling the wizard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub gender: Option<String>,
    pub civil_status: Option<String>,
    pub occupation: Option<String>,
    pub address: Option<String>,
    pub country_of_origin: Option<String>,
    pub passport_number: Option<String>,
    pub passport_issue_date: Option<NaiveDate>,
    pub passport_expiry_date: Option<NaiveDate>,
    pub passport_issuing_country: Option<String>,
    pub arrival_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    pub entry_point: Option<String>,
    pub purpose_of_visit: Option<String>,
    pub institution_code: Option<String>,
    pub sponsor_first_name: Option<String>,
    pub sponsor_last_name: Option<String>,
    pub sponsor_address: Option<String>,
    pub sponsor_phone: Option<String>,
    pub photo_path: Option<String>,
    pub passport_copy_path: Option<String>,
    pub visa_type: Option<VisaType>,
    pub status: Option<ApplicationStatus>,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{Application, ApplicationPatch, ApplicationStatus, DraftRequest};
    use crate::domain::product::VisaType;

    fn draft() -> Application {
        Application::new_draft(
            &DraftRequest {
                first_name: " Jean ".to_string(),
                last_name: "Dupont".to_string(),
                email: "Jean.Dupont@Example.com".to_string(),
                nationality: "France".to_string(),
                visa_type: None,
            },
            VisaType::default(),
            "eVisa-FRA-26-00001".to_string(),
            1,
            Utc::now(),
        )
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in ApplicationStatus::ALL {
            let parsed: ApplicationStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
        assert!("PENDING".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn new_draft_trims_identity_fields() {
        let application = draft();
        assert_eq!(application.first_name, "Jean");
        assert_eq!(application.status, ApplicationStatus::Draft);
        assert_eq!(application.full_name(), "Jean Dupont");
    }

    #[test]
    fn email_match_ignores_case_and_whitespace() {
        let application = draft();
        assert!(application.email_matches("jean.dupont@example.com "));
        assert!(!application.email_matches("someone@example.com"));
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut application = draft();
        application.apply_patch(&ApplicationPatch {
            passport_number: Some("AA1234567".to_string()),
            arrival_date: NaiveDate::from_ymd_opt(2026, 6, 1),
            ..ApplicationPatch::default()
        });

        assert_eq!(application.passport_number.as_deref(), Some("AA1234567"));
        assert_eq!(application.arrival_date, NaiveDate::from_ymd_opt(2026, 6, 1));
        assert_eq!(application.first_name, "Jean");
        assert_eq!(application.visa_type, VisaType::default());
    }

    #[test]
    fn terminal_states_are_not_editable() {
        assert!(ApplicationStatus::Draft.is_applicant_editable());
        assert!(ApplicationStatus::NeedInfo.is_applicant_editable());
        assert!(!ApplicationStatus::Issued.is_applicant_editable());
        assert!(ApplicationStatus::Revoked.is_terminal());
        assert!(!ApplicationStatus::UnderReview.is_terminal());
    }
}
