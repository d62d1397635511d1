use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const PAID_STATUSES: [&str; 2] = ["active", "trialing"];

/// Plan and billing status as reported by the account backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub plan: String,
    pub status: String,
}

impl SubscriptionStatus {
    pub fn free() -> Self {
        Self {
            plan: "free".to_string(),
            status: "active".to_string(),
        }
    }

    /// Client-side gate only. The backend enforces entitlement itself.
    pub fn is_paid(&self) -> bool {
        let plan = self.plan.trim().to_lowercase();
        !plan.is_empty()
            && plan != "free"
            && PAID_STATUSES.contains(&self.status.trim().to_lowercase().as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionClient {
    client: Client,
    base_url: String,
}

impl SubscriptionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_status(&self, token: Option<&str>) -> Result<SubscriptionStatus> {
        let url = format!("{}/subscription/status", self.base_url);
        debug!("Fetching subscription status from {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("Subscription status request failed: {}", resp.status()));
        }

        let status: SubscriptionStatus = resp.json().await?;
        info!("Subscription: plan={}, status={}", status.plan, status.status);
        Ok(status)
    }
}
