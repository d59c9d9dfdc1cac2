use serde::{Deserialize, Serialize};

use crate::domain::application::ApplicationStatus;
use crate::errors::{DomainError, FieldError};

/// Statuses an officer may request from the review console.
pub const ADMIN_TARGETS: [ApplicationStatus; 5] = [
    ApplicationStatus::UnderReview,
    ApplicationStatus::NeedInfo,
    ApplicationStatus::Rejected,
    ApplicationStatus::Approved,
    ApplicationStatus::Issued,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    CheckSubmissionReadiness,
    RecordSubmission,
    CreatePayment,
    StoreAdminNotes,
    StoreRejectionReason,
    IssueVisa,
    NotifyApplicant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ApplicationStatus,
    /// Status the caller asked for. Differs from `to` when approval collapses into issuance.
    pub requested: ApplicationStatus,
    pub to: ApplicationStatus,
    pub actions: Vec<LifecycleAction>,
}

impl TransitionOutcome {
    pub fn requires(&self, action: LifecycleAction) -> bool {
        self.actions.contains(&action)
    }
}

pub fn plan_admin_transition(
    current: ApplicationStatus,
    requested: ApplicationStatus,
) -> Result<TransitionOutcome, DomainError> {
    use ApplicationStatus::{Approved, Issued, NeedInfo, Rejected, Submitted, UnderReview};
    use LifecycleAction::{IssueVisa, NotifyApplicant, StoreAdminNotes, StoreRejectionReason};

    if !matches!(current, Submitted | UnderReview | NeedInfo) {
        return Err(DomainError::InvalidStatusTransition { from: current, to: requested });
    }

    let (to, actions) = match requested {
        UnderReview => (UnderReview, vec![NotifyApplicant]),
        NeedInfo => (NeedInfo, vec![StoreAdminNotes, NotifyApplicant]),
        Rejected => (Rejected, vec![StoreRejectionReason, NotifyApplicant]),
        Approved | Issued => (Issued, vec![StoreAdminNotes, IssueVisa, NotifyApplicant]),
        _ => return Err(DomainError::InvalidStatusTransition { from: current, to: requested }),
    };

    Ok(TransitionOutcome { from: current, requested, to, actions })
}

/// The applicant can only ever ask to submit; what that means depends on where the file is.
pub fn plan_applicant_transition(
    current: ApplicationStatus,
    requested: ApplicationStatus,
) -> Result<TransitionOutcome, DomainError> {
    use ApplicationStatus::{Draft, NeedInfo, Submitted, UnderReview};
    use LifecycleAction::{CheckSubmissionReadiness, CreatePayment, NotifyApplicant, RecordSubmission};

    if requested != Submitted {
        return Err(DomainError::Validation(vec![FieldError::new(
            "status",
            format!("applicants may only set status to SUBMITTED, not {requested}"),
        )]));
    }

    let (to, actions) = match current {
        Draft => (
            Submitted,
            vec![CheckSubmissionReadiness, RecordSubmission, CreatePayment, NotifyApplicant],
        ),
        NeedInfo => (UnderReview, vec![CheckSubmissionReadiness]),
        _ => return Err(DomainError::InvalidStatusTransition { from: current, to: requested }),
    };

    Ok(TransitionOutcome { from: current, requested, to, actions })
}
