//! In-memory payout destinations
//!
//! Consumers may link several bank destinations over time. Transfers use the
//! most recently linked destination that is verified.

use crate::core::traits::{DestinationDirectory, DestinationStatus, PayoutDestination};
use crate::types::StoreError;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryDestinationDirectory {
    destinations: DashMap<String, Vec<PayoutDestination>>,
}

impl MemoryDestinationDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

// Relinking a funding source replaces its previous state and makes it the newest
fn upsert(linked: &mut Vec<PayoutDestination>, destination: PayoutDestination) {
    linked.retain(|existing| existing.funding_source != destination.funding_source);
    linked.push(destination);
}

impl DestinationDirectory for MemoryDestinationDirectory {
    fn verified_destination(&self, user_id: &str) -> Result<Option<PayoutDestination>, StoreError> {
        Ok(self.destinations.get(user_id).and_then(|linked| {
            linked
                .iter()
                .rev()
                .find(|destination| destination.status == DestinationStatus::Verified)
                .cloned()
        }))
    }

    fn link(&self, destination: PayoutDestination) -> Result<(), StoreError> {
        let mut linked = self
            .destinations
            .entry(destination.user_id.clone())
            .or_default();
        upsert(&mut linked, destination);
        Ok(())
    }
}
