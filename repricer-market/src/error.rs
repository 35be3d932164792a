#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication with {marketplace} failed: {message}")]
    Auth { marketplace: String, message: String },

    #[error("{marketplace} API returned {status}: {body}")]
    Api {
        marketplace: String,
        status: u16,
        body: String,
    },

    #[error("No client configured for marketplace: {0}")]
    UnsupportedMarketplace(String),

    #[error("Missing credentials for marketplace: {0}")]
    MissingCredentials(String),

    #[error("Unexpected response shape: {0}")]
    Malformed(String),
}
