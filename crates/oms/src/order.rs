//! Live order table.
//!
//! Holds the latest [`OrderUpdate`] for every order the engine has reported,
//! and the set of orders still in a non-terminal state. Terminal states are
//! final: once an order is filled, cancelled, or rejected, later updates that
//! try to move it elsewhere are refused.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use rg_core::types::*;

/// Order table errors.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Attempted to move an order out of a terminal state.
    #[error("invalid transition from {from:?} to {to:?} for order {order_id}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

/// Tracks every order's latest state.
///
/// Thread-safe: uses `DashMap` for concurrent order access so snapshot
/// queries from the submission path never wait on the event thread for long.
pub struct OrderManager {
    orders: DashMap<OrderId, OrderUpdate>,
    active: DashSet<OrderId>,
}

impl OrderManager {
    /// Create a new, empty order manager.
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            active: DashSet::new(),
        }
    }

    /// Apply an order update.
    ///
    /// Returns `Ok(true)` if the stored state changed and `Ok(false)` for a
    /// repeated terminal update.
    pub fn apply(&self, update: &OrderUpdate) -> Result<bool, OrderError> {
        match self.orders.entry(update.order_id.clone()) {
            Entry::Occupied(mut entry) => {
                let from = entry.get().status;
                if from.is_terminal() && from == update.status {
                    return Ok(false);
                }
                Self::validate_transition(&update.order_id, from, update.status)?;
                entry.insert(update.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(update.clone());
            }
        }

        if update.status.is_active() {
            self.active.insert(update.order_id.clone());
        } else {
            self.active.remove(&update.order_id);
        }
        Ok(true)
    }

    /// Get a clone of an order's latest state.
    pub fn get_order(&self, order_id: &OrderId) -> Option<OrderUpdate> {
        self.orders.get(order_id).map(|o| o.clone())
    }

    /// All non-terminal orders.
    pub fn get_active_orders(&self) -> Vec<OrderUpdate> {
        self.active
            .iter()
            .filter_map(|id| self.orders.get(id.key()).map(|o| o.clone()))
            .collect()
    }

    /// Number of non-terminal orders.
    pub fn active_order_count(&self) -> usize {
        self.active.len()
    }

    /// Total number of orders tracked.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn validate_transition(
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), OrderError> {
        if from.is_terminal() && from != to {
            tracing::warn!(
                order_id = %order_id,
                from = ?from,
                to = ?to,
                "update for order already in a terminal state"
            );
            return Err(OrderError::InvalidTransition {
                order_id: order_id.clone(),
                from,
                to,
            });
        }
        Ok(())
    }
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}
