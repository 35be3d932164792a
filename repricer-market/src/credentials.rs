use serde::Deserialize;

use repricer_shared::Masked;

/// Amazon SP-API credentials (Login with Amazon refresh-token flow).
#[derive(Debug, Clone, Deserialize)]
pub struct AmazonCredentials {
    pub client_id: String,
    pub client_secret: Masked<String>,
    pub refresh_token: Masked<String>,
    pub seller_id: String,
}

/// Flipkart Marketplace API credentials (client-credentials flow).
#[derive(Debug, Clone, Deserialize)]
pub struct FlipkartCredentials {
    pub app_id: String,
    pub app_secret: Masked<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_never_leak_in_debug() {
        let creds = AmazonCredentials {
            client_id: "amzn1.application-oa2-client.abc".to_string(),
            client_secret: Masked::new("super-secret".to_string()),
            refresh_token: Masked::new("Atzr|token".to_string()),
            seller_id: "A2SELLER".to_string(),
        };

        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("Atzr|token"));
        assert!(rendered.contains("A2SELLER"));
    }
}
