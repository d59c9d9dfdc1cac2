pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod numbering;
pub mod validation;

pub use audit::AuditEntry;
pub use domain::application::{
    Application, ApplicationId, ApplicationPatch, ApplicationStatus, DraftRequest,
};
pub use domain::payment::{Payment, PaymentId, PaymentStatus};
pub use domain::product::{VisaProduct, VisaType};
pub use domain::user::AdminUser;
pub use domain::visa::{Visa, VisaId};
pub use errors::{ApplicationError, DomainError, FieldError, InterfaceError};
pub use lifecycle::{LifecycleAction, TransitionOutcome};
