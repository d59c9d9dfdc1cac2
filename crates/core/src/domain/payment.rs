use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::application::ApplicationId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub String);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Initiated,
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INITIATED" => Ok(Self::Initiated),
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(DomainError::InvariantViolation(format!("unknown payment status `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub application_id: ApplicationId,
    pub provider: String,
    pub phone_number: String,
    pub transaction_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fee added on top of the product price for every submission.
pub const SERVICE_FEE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Amount charged when the visa type has no configured product.
pub const FALLBACK_AMOUNT: Decimal = Decimal::from_parts(255, 0, 0, false, 0);

pub fn amount_due(product_price: Option<Decimal>, service_fee: Decimal) -> Decimal {
    match product_price {
        Some(price) => price + service_fee,
        None => FALLBACK_AMOUNT,
    }
}

/// Synthetic transaction reference used by the payment simulation.
pub fn simulated_transaction_id(now: DateTime<Utc>) -> String {
    format!("TXN-{}", now.timestamp_millis())
}
