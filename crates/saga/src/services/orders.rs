//! Order service trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ServiceError;

const SERVICE: &str = "order service";

/// An order held by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID assigned by the service.
    pub id: String,
    /// Customer placing the order.
    pub customer_id: String,
    /// Order total in cents.
    pub amount_cents: i64,
}

/// Trait for order management operations.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Creates an order and returns it with its generated ID.
    async fn create_order(
        &self,
        customer_id: &str,
        amount_cents: i64,
    ) -> Result<Order, ServiceError>;

    /// Cancels (deletes) an order. Cancelling an unknown order succeeds.
    async fn cancel_order(&self, order_id: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: BTreeMap<String, Order>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_cancel: bool,
}

/// In-memory order service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderService {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderService {
    /// Creates a new in-memory order service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on create calls.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail_on_create = fail;
    }

    /// Configures the service to fail on cancel calls.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.write().fail_on_cancel = fail;
    }

    /// Returns the number of live orders.
    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    /// Returns true if an order exists with the given ID.
    pub fn has_order(&self, order_id: &str) -> bool {
        self.read().orders.contains_key(order_id)
    }

    /// Returns all live orders ordered by ID.
    pub fn orders(&self) -> Vec<Order> {
        self.read().orders.values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryOrderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryOrderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn create_order(
        &self,
        customer_id: &str,
        amount_cents: i64,
    ) -> Result<Order, ServiceError> {
        let mut state = self.write();

        if state.fail_on_create {
            return Err(ServiceError::Unavailable { service: SERVICE });
        }
        if amount_cents <= 0 {
            return Err(ServiceError::Rejected {
                service: SERVICE,
                reason: format!("amount must be positive, got {amount_cents}"),
            });
        }

        state.next_id += 1;
        let order = Order {
            id: format!("ORD-{:04}", state.next_id),
            customer_id: customer_id.to_string(),
            amount_cents,
        };
        state.orders.insert(order.id.clone(), order.clone());
        tracing::info!(order_id = %order.id, customer_id, amount_cents, "order created");

        Ok(order)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ServiceError> {
        let mut state = self.write();

        if state.fail_on_cancel {
            return Err(ServiceError::Unavailable { service: SERVICE });
        }
        if state.orders.remove(order_id).is_some() {
            tracing::info!(order_id, "order cancelled");
        } else {
            tracing::debug!(order_id, "cancel of unknown order ignored");
        }
        Ok(())
    }
}
