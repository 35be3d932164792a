pub mod fees;
pub mod inventory;
pub mod product;

pub use fees::{FeeBreakdown, FeeSchedule};
pub use inventory::InventoryTracker;
pub use product::{
    eligible_landed_prices, CatalogError, CompetitorOffer, FulfillmentMethod, Listing,
    ListingStatus, Marketplace, Product,
};
