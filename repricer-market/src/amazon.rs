use chrono::{DateTime, Duration, Utc};
use reqwest::Client as HttpClient;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::credentials::AmazonCredentials;
use crate::error::MarketError;
use repricer_core::connector::CompetitorQuote;

const LWA_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";
const PRODUCTION_URL: &str = "https://sellingpartnerapi-na.amazon.com";
const SANDBOX_URL: &str = "https://sandbox.sellingpartnerapi-na.amazon.com";

/// Expire cached tokens a minute early so a request never rides an
/// about-to-expire token.
const TOKEN_EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct LwaTokenResponse {
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

/// Client for the Amazon Selling Partner API.
pub struct AmazonSpApiClient {
    http: HttpClient,
    base_url: String,
    credentials: AmazonCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl AmazonSpApiClient {
    pub fn new(credentials: AmazonCredentials, sandbox: bool) -> Self {
        let base_url = if sandbox { SANDBOX_URL } else { PRODUCTION_URL };
        Self {
            http: HttpClient::new(),
            base_url: base_url.to_string(),
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Get a cached access token, refreshing through LWA when stale.
    async fn access_token(&self) -> Result<String, MarketError> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("refreshing Amazon LWA access token");
        let response = self
            .http
            .post(LWA_TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.credentials.refresh_token.expose()),
                ("client_id", &self.credentials.client_id),
                ("client_secret", self.credentials.client_secret.expose()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "Amazon LWA token refresh failed");
            return Err(MarketError::Auth {
                marketplace: "amazon".to_string(),
                message: format!("token refresh returned {}: {}", status, body),
            });
        }

        let token: LwaTokenResponse = response.json().await?;
        let expires_at =
            Utc::now() + Duration::seconds(token.expires_in - TOKEN_EXPIRY_SLACK_SECS);
        let access = token.access_token.clone();

        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access)
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, MarketError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .header("x-amz-access-token", &token)
            .query(params)
            .send()
            .await?;

        Self::into_json(response).await
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, MarketError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http
            .request(method, &url)
            .bearer_auth(&token)
            .header("x-amz-access-token", &token)
            .json(body)
            .send()
            .await?;

        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> Result<Value, MarketError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Api {
                marketplace: "amazon".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Marketplaces this seller participates in.
    pub async fn get_marketplace_participations(&self) -> Result<Vec<Value>, MarketError> {
        let response = self
            .get("/sellers/v1/marketplaceParticipations", &[])
            .await?;
        Ok(response["payload"].as_array().cloned().unwrap_or_default())
    }

    /// Orders created after the given instant.
    pub async fn get_orders(
        &self,
        marketplace_ids: &[String],
        created_after: DateTime<Utc>,
    ) -> Result<Vec<Value>, MarketError> {
        let response = self
            .get(
                "/orders/v0/orders",
                &[
                    ("MarketplaceIds", marketplace_ids.join(",")),
                    ("CreatedAfter", created_after.to_rfc3339()),
                ],
            )
            .await?;
        Ok(response["payload"]["Orders"]
            .as_array()
            .cloned()
            .unwrap_or_default())
    }

    pub async fn get_listings(&self, marketplace_id: &str) -> Result<Vec<Value>, MarketError> {
        let endpoint = format!(
            "/listings/2021-08-01/items/{}",
            self.credentials.seller_id
        );
        let response = self
            .get(&endpoint, &[("marketplaceIds", marketplace_id.to_string())])
            .await?;
        Ok(response["items"].as_array().cloned().unwrap_or_default())
    }

    pub async fn get_inventory_summaries(
        &self,
        marketplace_ids: &[String],
    ) -> Result<Vec<Value>, MarketError> {
        let response = self
            .get(
                "/fba/inventory/v1/summaries",
                &[
                    ("marketplaceIds", marketplace_ids.join(",")),
                    ("granularityType", "Marketplace".to_string()),
                ],
            )
            .await?;
        Ok(response["payload"]["inventorySummaries"]
            .as_array()
            .cloned()
            .unwrap_or_default())
    }

    /// Competing offers for one SKU, mapped into quotes the engine can use.
    pub async fn get_competitive_pricing(
        &self,
        marketplace_id: &str,
        sku: &str,
    ) -> Result<Vec<CompetitorQuote>, MarketError> {
        let endpoint = format!("/products/pricing/v0/listings/{}/offers", sku);
        let response = self
            .get(
                &endpoint,
                &[
                    ("MarketplaceId", marketplace_id.to_string()),
                    ("ItemCondition", "New".to_string()),
                ],
            )
            .await?;

        let offers = response["payload"]["Offers"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        Ok(offers.iter().filter_map(quote_from_offer).collect())
    }

    /// Patch the listing price. The SP-API accepts a JSON-patch of the
    /// purchasable offer attribute.
    pub async fn submit_price(
        &self,
        marketplace_id: &str,
        sku: &str,
        price: Decimal,
        currency: &str,
    ) -> Result<(), MarketError> {
        let endpoint = format!(
            "/listings/2021-08-01/items/{}/{}?marketplaceIds={}",
            self.credentials.seller_id, sku, marketplace_id
        );

        let body = json!({
            "productType": "PRODUCT",
            "patches": [{
                "op": "replace",
                "path": "/attributes/purchasable_offer",
                "value": [{
                    "marketplace_id": marketplace_id,
                    "currency": currency,
                    "our_price": [{
                        "schedule": [{ "value_with_tax": price }]
                    }]
                }]
            }]
        });

        self.send_json(reqwest::Method::PATCH, &endpoint, &body)
            .await?;
        Ok(())
    }
}

fn quote_from_offer(offer: &Value) -> Option<CompetitorQuote> {
    let price = offer["ListingPrice"]["Amount"]
        .as_str()
        .and_then(|s| s.parse::<Decimal>().ok())
        .or_else(|| offer["ListingPrice"]["Amount"].as_f64().and_then(Decimal::from_f64))?;

    let shipping = offer["Shipping"]["Amount"]
        .as_f64()
        .and_then(Decimal::from_f64)
        .unwrap_or(Decimal::ZERO);

    Some(CompetitorQuote {
        seller_id: offer["SellerId"].as_str().unwrap_or_default().to_string(),
        seller_name: offer["SellerName"].as_str().unwrap_or_default().to_string(),
        price,
        shipping_price: shipping,
        condition: offer["SubCondition"].as_str().unwrap_or("new").to_string(),
        fulfillment: if offer["IsFulfilledByAmazon"].as_bool().unwrap_or(false) {
            "fba".to_string()
        } else {
            "fbm".to_string()
        },
        is_buy_box_winner: offer["IsBuyBoxWinner"].as_bool().unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_mapping_from_offer_payload() {
        let offer = json!({
            "SellerId": "A1XYZ",
            "SellerName": "Acme Deals",
            "ListingPrice": { "Amount": 24.99, "CurrencyCode": "USD" },
            "Shipping": { "Amount": 3.99, "CurrencyCode": "USD" },
            "IsFulfilledByAmazon": true,
            "IsBuyBoxWinner": true
        });

        let quote = quote_from_offer(&offer).unwrap();
        assert_eq!(quote.seller_id, "A1XYZ");
        assert_eq!(quote.price, dec!(24.99));
        assert_eq!(quote.shipping_price, dec!(3.99));
        assert_eq!(quote.fulfillment, "fba");
        assert!(quote.is_buy_box_winner);
    }

    #[test]
    fn test_quote_mapping_requires_price() {
        let offer = json!({ "SellerId": "A1XYZ" });
        assert!(quote_from_offer(&offer).is_none());
    }
}
