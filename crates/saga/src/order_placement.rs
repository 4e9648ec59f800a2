//! The `create-order` saga: create an order, then charge for it.
//!
//! If the charge fails the order is cancelled. If a later failure required
//! undoing the charge, the payment would be refunded first.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::definition::SagaDefinition;
use crate::error::{DefinitionError, StepError, StepResult};
use crate::services::{OrderService, PaymentService};
use crate::step::{CompensatingAction, ForwardAction, Step};

/// The saga type identifier for order placement.
pub const SAGA_ID: &str = "create-order";

/// Step name: create the order record.
pub const STEP_CREATE_ORDER: &str = "create_order";

/// Step name: charge the customer.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Transaction state threaded through the order placement saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Customer placing the order.
    pub customer_id: String,
    /// Order total in cents.
    pub amount_cents: i64,
    /// Set by `create_order`.
    #[serde(default)]
    pub order_id: Option<String>,
    /// Set by `process_payment`.
    #[serde(default)]
    pub payment_id: Option<String>,
}

impl OrderPayload {
    /// Creates a payload for a new order request.
    pub fn new(customer_id: impl Into<String>, amount_cents: i64) -> Self {
        Self {
            customer_id: customer_id.into(),
            amount_cents,
            order_id: None,
            payment_id: None,
        }
    }
}

/// Creates the order; compensation cancels it.
#[derive(Clone)]
pub struct CreateOrderStep {
    orders: Arc<dyn OrderService>,
}

impl CreateOrderStep {
    pub fn new(orders: Arc<dyn OrderService>) -> Self {
        Self { orders }
    }

    /// Wraps this action as a compensable step named `create_order`.
    pub fn into_step(self) -> Step<OrderPayload> {
        Step::new(STEP_CREATE_ORDER, self.clone()).with_compensation(self)
    }
}

#[async_trait]
impl ForwardAction<OrderPayload> for CreateOrderStep {
    async fn forward(&self, mut payload: OrderPayload) -> StepResult<OrderPayload> {
        let order = self
            .orders
            .create_order(&payload.customer_id, payload.amount_cents)
            .await?;
        payload.order_id = Some(order.id);
        Ok(payload)
    }
}

#[async_trait]
impl CompensatingAction<OrderPayload> for CreateOrderStep {
    async fn compensate(&self, payload: OrderPayload) -> StepResult<()> {
        match payload.order_id.as_deref() {
            Some(order_id) => Ok(self.orders.cancel_order(order_id).await?),
            None => Ok(()),
        }
    }
}

/// Charges the order; compensation refunds the payment.
#[derive(Clone)]
pub struct ProcessPaymentStep {
    payments: Arc<dyn PaymentService>,
}

impl ProcessPaymentStep {
    pub fn new(payments: Arc<dyn PaymentService>) -> Self {
        Self { payments }
    }

    /// Wraps this action as a compensable step named `process_payment`.
    pub fn into_step(self) -> Step<OrderPayload> {
        Step::new(STEP_PROCESS_PAYMENT, self.clone()).with_compensation(self)
    }
}

#[async_trait]
impl ForwardAction<OrderPayload> for ProcessPaymentStep {
    async fn forward(&self, mut payload: OrderPayload) -> StepResult<OrderPayload> {
        let order_id = payload
            .order_id
            .as_deref()
            .ok_or_else(|| StepError::new("payment requires an order id"))?;
        let result = self.payments.charge(order_id, payload.amount_cents).await?;
        payload.payment_id = Some(result.payment_id);
        Ok(payload)
    }
}

#[async_trait]
impl CompensatingAction<OrderPayload> for ProcessPaymentStep {
    async fn compensate(&self, payload: OrderPayload) -> StepResult<()> {
        match payload.payment_id.as_deref() {
            Some(payment_id) => Ok(self.payments.refund(payment_id).await?),
            None => Ok(()),
        }
    }
}

/// Builds the order placement saga over the given services.
///
/// # Errors
///
/// Only fails if the step list itself is invalid, which would be a bug.
pub fn definition(
    orders: Arc<dyn OrderService>,
    payments: Arc<dyn PaymentService>,
) -> Result<SagaDefinition<OrderPayload>, DefinitionError> {
    SagaDefinition::builder(SAGA_ID)
        .step(CreateOrderStep::new(orders).into_step())
        .step(ProcessPaymentStep::new(payments).into_step())
        .build()
}
