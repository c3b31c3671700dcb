use std::time::Duration;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::config::VtuSettings;
use crate::enums::PurchaseType;
use crate::error::{ AppError, Result };
use crate::providers::vtu_provider::{
    ProviderReceipt,
    ProviderStatus,
    PurchaseRequest,
    VtuProvider,
};

const MAX_STATUS_RETRIES: u32 = 3;

/// JSON client for the VTU aggregator's REST API.
pub struct HttpVtuProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct TopupBody<'a> {
    network: &'a str,
    phone: &'a str,
    amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan_id: Option<&'a str>,
    request_id: &'a str,
}

#[derive(Deserialize)]
struct TopupResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
}

impl HttpVtuProvider {
    pub fn new(settings: &VtuSettings) -> Result<Self> {
        let client = reqwest::Client
            ::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build VTU client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    /// Status lookups are safe to repeat, so rate limiting is retried with
    /// backoff. Purchases never go through here.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_err = None;
        for attempt in 0..MAX_STATUS_RETRIES {
            let response = self.client
                .get(url)
                .bearer_auth(&self.api_key)
                .send().await
                .map_err(map_transport_error)?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let wait_secs = 2u64.pow(attempt + 1);
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                last_err = Some(AppError::Provider("VTU provider rate limited".to_string()));
                continue;
            }

            if !response.status().is_success() {
                return Err(
                    AppError::Provider(format!("VTU provider returned status: {}", response.status()))
                );
            }

            return Ok(response);
        }
        Err(
            last_err.unwrap_or_else(||
                AppError::Provider("VTU status request failed after retries".to_string())
            )
        )
    }
}

#[async_trait]
impl VtuProvider for HttpVtuProvider {
    async fn purchase(&self, request: &PurchaseRequest) -> Result<ProviderReceipt> {
        let path = match request.purchase_type {
            PurchaseType::Airtime => "airtime",
            PurchaseType::Data => "data",
        };
        let url = format!("{}/topup/{}", self.base_url, path);

        let body = TopupBody {
            network: request.network.as_str(),
            phone: &request.phone_number,
            amount: request.amount.normalize().to_string(),
            plan_id: request.plan_id.as_deref(),
            request_id: &request.reference,
        };

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send().await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(
                AppError::Provider(format!("VTU provider returned status: {}", response.status()))
            );
        }

        let parsed: TopupResponse = response
            .json().await
            .map_err(|e| AppError::Provider(format!("Failed to parse VTU response: {}", e)))?;

        if parsed.status.eq_ignore_ascii_case("success") {
            Ok(ProviderReceipt {
                reference: request.reference.clone(),
                transaction_id: parsed.transaction_id,
            })
        } else {
            Err(
                AppError::Provider(
                    parsed.message.unwrap_or_else(|| format!("Purchase {}", parsed.status))
                )
            )
        }
    }

    async fn query_status(&self, reference: &str) -> Result<ProviderStatus> {
        let url = format!("{}/topup/status/{}", self.base_url, urlencoding::encode(reference));

        let response = self.get_with_retry(&url).await?;

        let parsed: TopupResponse = response
            .json().await
            .map_err(|e| AppError::Provider(format!("Failed to parse VTU response: {}", e)))?;

        Ok(status_from_response(parsed))
    }
}

fn status_from_response(response: TopupResponse) -> ProviderStatus {
    match response.status.to_lowercase().as_str() {
        "success" | "delivered" => ProviderStatus::Delivered {
            transaction_id: response.transaction_id,
        },
        "failed" | "reversed" => ProviderStatus::Failed {
            reason: response.message.unwrap_or_else(|| "Provider reported failure".to_string()),
        },
        _ => ProviderStatus::Unknown,
    }
}

fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::ProviderTimeout
    } else {
        AppError::Provider(format!("VTU request failed: {}", e))
    }
}
