//! Status workflow of an application, from draft to issued visa.
//!
//! Planning is pure: it decides the persisted status and the side effects a
//! store must carry out in one transaction. Nothing here touches storage.

pub mod issuance;
pub mod transitions;

pub use issuance::{issue_visa, validity_window, ValidityWindow};
pub use transitions::{
    plan_admin_transition, plan_applicant_transition, LifecycleAction, TransitionOutcome,
    ADMIN_TARGETS,
};
