//! Field checks for applicant input. Every check collects into a list so the
//! wizard can highlight all offending fields at once.

use chrono::Months;

use crate::domain::application::{Application, ApplicationPatch, DraftRequest};
use crate::errors::{DomainError, FieldError};

const PASSPORT_VALIDITY_MONTHS_AFTER_ARRIVAL: u32 = 6;
const ACCEPTED_GENDERS: [&str; 5] = ["M", "F", "male", "female", "other"];

pub fn validate_draft(draft: &DraftRequest) -> Result<(), DomainError> {
    let mut errors = Vec::new();

    require_text(&mut errors, "firstName", &draft.first_name, 1);
    require_text(&mut errors, "lastName", &draft.last_name, 1);
    require_text(&mut errors, "nationality", &draft.nationality, 2);
    if !looks_like_email(&draft.email) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }

    finish(errors)
}

pub fn validate_patch(patch: &ApplicationPatch) -> Result<(), DomainError> {
    let mut errors = Vec::new();

    if let Some(first_name) = &patch.first_name {
        require_text(&mut errors, "firstName", first_name, 1);
    }
    if let Some(last_name) = &patch.last_name {
        require_text(&mut errors, "lastName", last_name, 1);
    }
    if let Some(nationality) = &patch.nationality {
        require_text(&mut errors, "nationality", nationality, 2);
    }
    if let Some(email) = &patch.email {
        if !looks_like_email(email) {
            errors.push(FieldError::new("email", "must be a valid email address"));
        }
    }
    if let Some(passport_number) = &patch.passport_number {
        if !is_passport_number(passport_number) {
            errors.push(FieldError::new(
                "passportNumber",
                "must be 6 to 15 letters or digits without spaces",
            ));
        }
    }
    if let Some(phone) = &patch.phone {
        if !is_phone(phone) {
            errors.push(FieldError::new(
                "phone",
                "must be at least 8 characters of digits, spaces, +, - or parentheses",
            ));
        }
    }
    if let Some(purpose) = &patch.purpose_of_visit {
        let length = purpose.trim().chars().count();
        if !(10..=500).contains(&length) {
            errors.push(FieldError::new("purposeOfVisit", "must be 10 to 500 characters"));
        }
    }
    if let Some(code) = &patch.institution_code {
        let valid = code.chars().count() <= 50
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            errors.push(FieldError::new(
                "institutionCode",
                "must be at most 50 letters, digits or dashes",
            ));
        }
    }
    if let Some(gender) = &patch.gender {
        if !ACCEPTED_GENDERS.contains(&gender.trim()) {
            errors.push(FieldError::new("gender", "must be one of M, F, male, female, other"));
        }
    }

    finish(errors)
}

/// Run on the merged file, so a patch moving only one date is still checked against the other.
pub fn check_stay_dates(application: &Application) -> Result<(), DomainError> {
    let mut errors = Vec::new();

    if let (Some(arrival), Some(departure)) = (application.arrival_date, application.departure_date)
    {
        if departure < arrival {
            errors.push(FieldError::new("departureDate", "must not be before the arrival date"));
        }
    }

    finish(errors)
}

/// Checks that a draft carries everything an officer needs before it can be submitted.
pub fn check_submission_ready(application: &Application) -> Result<(), DomainError> {
    let mut errors = Vec::new();

    if application.phone.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        errors.push(FieldError::new("phone", "is required before submission"));
    }
    if application.date_of_birth.is_none() {
        errors.push(FieldError::new("dateOfBirth", "is required before submission"));
    }
    if application.passport_number.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        errors.push(FieldError::new("passportNumber", "is required before submission"));
    }
    if application.passport_expiry_date.is_none() {
        errors.push(FieldError::new("passportExpiryDate", "is required before submission"));
    }
    if application.arrival_date.is_none() {
        errors.push(FieldError::new("arrivalDate", "is required before submission"));
    }

    if let (Some(expiry), Some(arrival)) =
        (application.passport_expiry_date, application.arrival_date)
    {
        let minimum = arrival.checked_add_months(Months::new(PASSPORT_VALIDITY_MONTHS_AFTER_ARRIVAL));
        if minimum.map_or(true, |minimum| expiry <= minimum) {
            errors.push(FieldError::new(
                "passportExpiryDate",
                "passport must remain valid more than 6 months after arrival",
            ));
        }
    }

    finish(errors)
}

fn finish(errors: Vec<FieldError>) -> Result<(), DomainError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}

fn require_text(errors: &mut Vec<FieldError>, field: &str, value: &str, min_chars: usize) {
    if value.trim().chars().count() < min_chars {
        let message = if min_chars <= 1 {
            "is required".to_string()
        } else {
            format!("must be at least {min_chars} characters")
        };
        errors.push(FieldError::new(field, message));
    }
}

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
        && !value.chars().any(char::is_whitespace)
}

fn is_passport_number(value: &str) -> bool {
    (6..=15).contains(&value.chars().count()) && value.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_phone(value: &str) -> bool {
    let body = value.strip_prefix('+').unwrap_or(value);
    value.chars().count() >= 8
        && !body.is_empty()
        && body.chars().all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
}
