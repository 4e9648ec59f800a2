//! Shared types for the saga orchestration engine.

mod types;

pub use types::InstanceId;
