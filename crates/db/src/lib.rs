pub mod connection;
pub mod fixtures;
pub mod lifecycle;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, SeededApplication, VerificationResult};
pub use lifecycle::{PaymentConfirmation, ReviewDecision, SqlLifecycleStore, VisaIssue};
pub use repositories::RepositoryError;
