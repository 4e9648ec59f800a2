//! External service traits and in-memory implementations used by the
//! order placement saga.

pub mod orders;
pub mod payment;

use thiserror::Error;

use crate::error::StepError;

pub use orders::{InMemoryOrderService, Order, OrderService};
pub use payment::{InMemoryPaymentService, PaymentResult, PaymentService};

/// Errors reported by the demonstration services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service rejected the request for a business reason.
    #[error("{service} rejected the request: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },

    /// The referenced record does not exist.
    #[error("{service}: {id} not found")]
    NotFound { service: &'static str, id: String },

    /// The service could not be reached or failed internally.
    #[error("{service} unavailable")]
    Unavailable { service: &'static str },
}

impl From<ServiceError> for StepError {
    fn from(err: ServiceError) -> Self {
        StepError::with_source(err.to_string(), err)
    }
}
