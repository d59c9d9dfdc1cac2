use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VISA_TYPE: &str = "VOLANT_ORDINAIRE";

/// Stay length applied when an application's visa type has no configured product.
pub const FALLBACK_DURATION_DAYS: i64 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisaType(pub String);

impl Default for VisaType {
    fn default() -> Self {
        Self(DEFAULT_VISA_TYPE.to_string())
    }
}

impl std::fmt::Display for VisaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisaProduct {
    #[serde(rename = "type")]
    pub visa_type: VisaType,
    pub label_fr: String,
    pub label_en: String,
    pub price: Decimal,
    pub currency: String,
    pub duration_days: i64,
    pub validity_months: i64,
    pub is_active: bool,
}

impl VisaProduct {
    /// Short label printed on the visa document, e.g. `ORDINAIRE`.
    pub fn document_label(&self) -> String {
        self.visa_type.0.strip_prefix("VOLANT_").unwrap_or(&self.visa_type.0).to_string()
    }
}

/// Looks up the product for a visa type among the active catalogue.
pub fn find_product<'a>(products: &'a [VisaProduct], visa_type: &VisaType) -> Option<&'a VisaProduct> {
    products.iter().find(|product| product.is_active && &product.visa_type == visa_type)
}
