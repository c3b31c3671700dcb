use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::enums::{ Network, PurchaseType };
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub phone_number: String,
    pub network: Network,
    pub purchase_type: PurchaseType,
    pub amount: Decimal,
    pub plan_id: Option<String>,
    /// Our ledger reference, sent so the provider can deduplicate.
    pub reference: String,
}

/// Proof that the provider accepted and delivered a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReceipt {
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// What the provider knows about an earlier purchase.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStatus {
    Delivered {
        transaction_id: Option<String>,
    },
    Failed {
        reason: String,
    },
    Unknown,
}

#[async_trait]
pub trait VtuProvider: Send + Sync {
    /// Buy airtime or data. Any error means the purchase did not go through.
    async fn purchase(&self, request: &PurchaseRequest) -> Result<ProviderReceipt>;

    /// Look up a purchase by the reference it was submitted with
    async fn query_status(&self, reference: &str) -> Result<ProviderStatus>;
}
