//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::ServiceError;

const SERVICE: &str = "payment service";

/// Result of a successful payment charge.
#[derive(Debug, Clone)]
pub struct PaymentResult {
    /// The payment ID assigned by the payment service.
    pub payment_id: String,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges an order.
    async fn charge(&self, order_id: &str, amount_cents: i64)
    -> Result<PaymentResult, ServiceError>;

    /// Refunds a previously made payment. Refunding twice succeeds.
    async fn refund(&self, payment_id: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (String, i64)>,
    next_id: u32,
    fail_on_charge: bool,
    fail_on_refund: bool,
    decline_rate: f64,
}

/// In-memory payment service.
///
/// Besides the explicit failure toggles, a decline rate in `0.0..=1.0`
/// makes that fraction of charges fail at random, simulating a flaky
/// payment provider.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service that randomly declines the given fraction of charges.
    pub fn with_decline_rate(rate: f64) -> Self {
        let service = Self::new();
        service.set_decline_rate(rate);
        service
    }

    /// Sets the random decline rate, clamped to `0.0..=1.0`.
    pub fn set_decline_rate(&self, rate: f64) {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self.write().decline_rate = rate;
    }

    /// Returns the random decline rate.
    pub fn decline_rate(&self) -> f64 {
        self.read().decline_rate
    }

    /// Configures the service to fail on charge calls.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.write().fail_on_charge = fail;
    }

    /// Configures the service to fail on refund calls.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.write().fail_on_refund = fail;
    }

    /// Returns the number of active payments.
    pub fn payment_count(&self) -> usize {
        self.read().payments.len()
    }

    /// Returns true if a payment exists with the given ID.
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.read().payments.contains_key(payment_id)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPaymentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(
        &self,
        order_id: &str,
        amount_cents: i64,
    ) -> Result<PaymentResult, ServiceError> {
        let mut state = self.write();

        if state.fail_on_charge {
            return Err(ServiceError::Rejected {
                service: SERVICE,
                reason: "payment declined".to_string(),
            });
        }
        if state.decline_rate > 0.0 && fastrand::f64() < state.decline_rate {
            tracing::info!(order_id, "payment randomly declined");
            return Err(ServiceError::Rejected {
                service: SERVICE,
                reason: "payment declined".to_string(),
            });
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state
            .payments
            .insert(payment_id.clone(), (order_id.to_string(), amount_cents));
        tracing::info!(%payment_id, order_id, amount_cents, "payment captured");

        Ok(PaymentResult { payment_id })
    }

    async fn refund(&self, payment_id: &str) -> Result<(), ServiceError> {
        let mut state = self.write();

        if state.fail_on_refund {
            return Err(ServiceError::Unavailable { service: SERVICE });
        }
        if state.payments.remove(payment_id).is_some() {
            tracing::info!(payment_id, "payment refunded");
        }
        Ok(())
    }
}
