use chrono::{DateTime, Duration, Utc};
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::credentials::FlipkartCredentials;
use crate::error::MarketError;

const PRODUCTION_URL: &str = "https://api.flipkart.net";
const SANDBOX_URL: &str = "https://sandbox-api.flipkart.net";

#[derive(Debug, Deserialize)]
struct OauthTokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Client for the Flipkart Marketplace Seller API.
pub struct FlipkartClient {
    http: HttpClient,
    base_url: String,
    credentials: FlipkartCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl FlipkartClient {
    pub fn new(credentials: FlipkartCredentials, sandbox: bool) -> Self {
        let base_url = if sandbox { SANDBOX_URL } else { PRODUCTION_URL };
        Self {
            http: HttpClient::new(),
            base_url: base_url.to_string(),
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, MarketError> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("refreshing Flipkart access token");
        let url = format!("{}/oauth-service/oauth/token", self.base_url);
        let response = self
            .http
            .get(&url)
            .basic_auth(
                &self.credentials.app_id,
                Some(self.credentials.app_secret.expose()),
            )
            .query(&[
                ("grant_type", "client_credentials"),
                ("scope", "Seller_Api"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "Flipkart token request failed");
            return Err(MarketError::Auth {
                marketplace: "flipkart".to_string(),
                message: format!("token request returned {}: {}", status, body),
            });
        }

        let token: OauthTokenResponse = response.json().await?;
        let expires_at = Utc::now() + Duration::seconds(token.expires_in - 60);
        let access = token.access_token.clone();

        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, MarketError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = self.http.request(method, &url).bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Api {
                marketplace: "flipkart".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Orders shipped or approved after the given date.
    pub async fn get_orders(&self, start_date: DateTime<Utc>) -> Result<Vec<Value>, MarketError> {
        let body = json!({
            "filter": {
                "orderDate": {
                    "fromDate": start_date.format("%Y-%m-%d").to_string(),
                }
            }
        });
        let response = self
            .request(
                reqwest::Method::POST,
                "/sellers/v3/shipments/filter",
                Some(&body),
            )
            .await?;
        Ok(response["shipments"].as_array().cloned().unwrap_or_default())
    }

    pub async fn get_listings(&self, sku: Option<&str>) -> Result<Vec<Value>, MarketError> {
        let endpoint = match sku {
            Some(sku) => format!("/sellers/listings/v3/{}", sku),
            None => "/sellers/listings/v3".to_string(),
        };
        let response = self.request(reqwest::Method::GET, &endpoint, None).await?;
        Ok(response["listings"].as_array().cloned().unwrap_or_default())
    }

    pub async fn get_returns(&self, start_date: DateTime<Utc>) -> Result<Vec<Value>, MarketError> {
        let endpoint = format!(
            "/sellers/v2/returns?source=customer_return&createdAfter={}",
            start_date.format("%Y-%m-%d")
        );
        let response = self.request(reqwest::Method::GET, &endpoint, None).await?;
        Ok(response["returns"].as_array().cloned().unwrap_or_default())
    }

    /// Update the selling price for one listing.
    pub async fn update_listing_price(
        &self,
        sku: &str,
        selling_price: Decimal,
        currency: &str,
    ) -> Result<(), MarketError> {
        let endpoint = format!("/sellers/listings/v3/update/price/{}", sku);
        let body = json!({
            "sku": sku,
            "price": {
                "sellingPrice": selling_price,
                "currency": currency,
            }
        });

        let response = self
            .request(reqwest::Method::POST, &endpoint, Some(&body))
            .await?;

        // Flipkart wraps per-SKU outcomes in a status map.
        let status = response["response"][sku]["status"]
            .as_str()
            .unwrap_or("SUCCESS");
        if status.eq_ignore_ascii_case("failure") {
            return Err(MarketError::Api {
                marketplace: "flipkart".to_string(),
                status: 200,
                body: response.to_string(),
            });
        }

        Ok(())
    }
}
