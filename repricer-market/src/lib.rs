pub mod amazon;
pub mod credentials;
pub mod emitter;
pub mod error;
pub mod flipkart;
pub mod sync;

pub use amazon::AmazonSpApiClient;
pub use credentials::{AmazonCredentials, FlipkartCredentials};
pub use emitter::MarketplacePriceEmitter;
pub use error::MarketError;
pub use flipkart::FlipkartClient;
pub use sync::SyncService;
