use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Inventory position for one listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryPosition {
    pub listing_id: Uuid,
    pub available_quantity: i32,
    pub total_quantity: i32,
    pub reserved_quantity: i32,
}

/// In-memory inventory reconciliation used during marketplace syncs: seeded
/// from the marketplace snapshot, reservations applied from observed orders,
/// then flushed back to the listings.
pub struct InventoryTracker {
    positions: HashMap<Uuid, InventoryPosition>,
}

impl InventoryTracker {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    /// Seed the position from a marketplace inventory snapshot.
    pub fn seed(&mut self, listing_id: Uuid, total_quantity: i32) {
        self.positions.insert(
            listing_id,
            InventoryPosition {
                listing_id,
                available_quantity: total_quantity,
                total_quantity,
                reserved_quantity: 0,
            },
        );
    }

    pub fn get(&self, listing_id: &Uuid) -> Option<&InventoryPosition> {
        self.positions.get(listing_id)
    }

    /// Reserve units against pending marketplace orders.
    pub fn reserve(&mut self, listing_id: &Uuid, quantity: i32) -> Result<(), InventoryError> {
        let position = self
            .positions
            .get_mut(listing_id)
            .ok_or_else(|| InventoryError::NotTracked(listing_id.to_string()))?;

        if position.available_quantity < quantity {
            return Err(InventoryError::InsufficientInventory {
                requested: quantity,
                available: position.available_quantity,
            });
        }

        position.available_quantity -= quantity;
        position.reserved_quantity += quantity;

        Ok(())
    }

    /// Release a reservation (order cancelled or returned).
    pub fn release(&mut self, listing_id: &Uuid, quantity: i32) -> Result<(), InventoryError> {
        let position = self
            .positions
            .get_mut(listing_id)
            .ok_or_else(|| InventoryError::NotTracked(listing_id.to_string()))?;

        position.available_quantity += quantity;
        position.reserved_quantity = position.reserved_quantity.saturating_sub(quantity);

        Ok(())
    }

    /// Commit a reservation (order shipped); units leave the position.
    pub fn commit(&mut self, listing_id: &Uuid, quantity: i32) -> Result<(), InventoryError> {
        let position = self
            .positions
            .get_mut(listing_id)
            .ok_or_else(|| InventoryError::NotTracked(listing_id.to_string()))?;

        if position.reserved_quantity < quantity {
            return Err(InventoryError::InsufficientReserved {
                requested: quantity,
                reserved: position.reserved_quantity,
            });
        }

        position.reserved_quantity -= quantity;
        position.total_quantity -= quantity;

        Ok(())
    }

    /// Fraction of the position that is no longer available.
    pub fn utilization(&self, listing_id: &Uuid) -> Option<f64> {
        self.positions.get(listing_id).map(|p| {
            if p.total_quantity == 0 {
                0.0
            } else {
                1.0 - (p.available_quantity as f64 / p.total_quantity as f64)
            }
        })
    }
}

impl Default for InventoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Listing not tracked: {0}")]
    NotTracked(String),

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i32, available: i32 },

    #[error("Insufficient reserved inventory: requested {requested}, reserved {reserved}")]
    InsufficientReserved { requested: i32, reserved: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_reconciliation_lifecycle() {
        let mut tracker = InventoryTracker::new();
        let listing_id = Uuid::new_v4();

        tracker.seed(listing_id, 40);
        assert_eq!(tracker.get(&listing_id).unwrap().available_quantity, 40);

        // Two pending orders observed during the sync
        tracker.reserve(&listing_id, 3).unwrap();
        tracker.reserve(&listing_id, 2).unwrap();
        assert_eq!(tracker.get(&listing_id).unwrap().available_quantity, 35);
        assert_eq!(tracker.get(&listing_id).unwrap().reserved_quantity, 5);

        // One shipped, one cancelled
        tracker.commit(&listing_id, 3).unwrap();
        tracker.release(&listing_id, 2).unwrap();

        let position = tracker.get(&listing_id).unwrap();
        assert_eq!(position.reserved_quantity, 0);
        assert_eq!(position.total_quantity, 37);
        assert_eq!(position.available_quantity, 37);
    }

    #[test]
    fn test_reserve_beyond_available_fails() {
        let mut tracker = InventoryTracker::new();
        let listing_id = Uuid::new_v4();

        tracker.seed(listing_id, 1);
        let err = tracker.reserve(&listing_id, 5).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientInventory {
                requested: 5,
                available: 1
            }
        ));
    }
}
