//! Reference model for model-based testing.
//!
//! The model is a deliberately naive broker: a vector of payloads, a flag
//! per peer and a list of everything each peer has been told. It serves as
//! the oracle against which [`peersim_core::Broker`] is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Observable only: Peers are compared by what they were sent
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod peer;
mod world;

pub use operation::{Operation, OperationError, OperationResult, PeerIndex, peer_name};
pub use peer::{AuditRecord, ModelUpdate, PeerEvent};
pub use world::{ModelWorld, ObservableState};
