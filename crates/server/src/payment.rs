//! Simulated mobile-money settlement.
//!
//! A submitted application gets a PENDING payment. With simulation enabled a
//! detached task confirms it after a fixed delay, exactly as the provider
//! callback would.

use std::time::Duration;

use chrono::Utc;
use evisa_core::domain::application::ApplicationId;
use evisa_core::domain::payment::simulated_transaction_id;
use evisa_db::{PaymentConfirmation, SqlLifecycleStore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct PaymentSimulator {
    store: SqlLifecycleStore,
    enabled: bool,
    delay: Duration,
}

impl PaymentSimulator {
    pub fn new(store: SqlLifecycleStore, enabled: bool, delay: Duration) -> Self {
        Self { store, enabled, delay }
    }

    /// Schedules confirmation of the application's payment. Returns `None` when simulation is off.
    pub fn schedule(&self, application_id: ApplicationId) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }

        let store = self.store.clone();
        let delay = self.delay;
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let now = Utc::now();
            let transaction_id = simulated_transaction_id(now);
            match store.confirm_payment(&application_id, &transaction_id, now).await {
                Ok(PaymentConfirmation::Confirmed(payment)) => info!(
                    event_name = "payment.simulated.confirmed",
                    correlation_id = %transaction_id,
                    application_id = %application_id,
                    amount = %payment.amount,
                    "simulated payment confirmed"
                ),
                Ok(PaymentConfirmation::AlreadyPaid(_)) => info!(
                    event_name = "payment.simulated.already_paid",
                    application_id = %application_id,
                    "payment was confirmed before the simulation fired"
                ),
                Ok(PaymentConfirmation::NotFound) => warn!(
                    event_name = "payment.simulated.missing",
                    application_id = %application_id,
                    "no payment to confirm"
                ),
                Err(error) => error!(
                    event_name = "payment.simulated.failed",
                    application_id = %application_id,
                    error = %error,
                    "simulated payment confirmation failed"
                ),
            }
        }))
    }
}
