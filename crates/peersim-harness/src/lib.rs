//! Model-based testing harness for the peersim broker.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the broker.
//! Operations are applied to both the model and a [`BrokerWorld`] wrapping
//! the real [`peersim_core::Broker`], and their observable states are
//! compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broker_world;
pub mod model;

pub use broker_world::BrokerWorld;
pub use model::{
    AuditRecord, ModelUpdate, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult, PeerEvent, PeerIndex, peer_name,
};
