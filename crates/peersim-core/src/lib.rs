//! Update distribution and replay broker for simulated peers.
//!
//! The broker assigns a global order to updates produced by any peer, fans
//! them out to every registered peer subject to that peer's cursor, replays
//! history to peers that connect late, and performs full resets with at most
//! one clear notification per peer per epoch.
//!
//! ## Architecture
//!
//! ```text
//! peersim-core
//!   ├─ Broker        (registry + fan-out + replay + reset)
//!   ├─ UpdateLog     (serial assignment, append-only history)
//!   ├─ PeerHandle    (subscription, cursor, clear notice)
//!   └─ AuditEntry    (sent / received / clear diagnostics)
//! ```
//!
//! ## Design
//!
//! - Sans-IO: no sockets, no async, no clocks. Every method runs to
//!   completion and returns [`BrokerAction`]s for the driver to execute.
//! - Sequential: the broker is `&mut self` throughout. Whoever shares it
//!   must serialize access, which makes serial assignment race-free without
//!   any internal locking.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod broker;
mod error;
mod peer;
mod update;

pub use audit::AuditEntry;
pub use broker::{Broker, BrokerAction};
pub use error::BrokerError;
pub use peer::{ClearNotice, PeerHandle, PeerId};
pub use update::{Update, UpdateLog};
