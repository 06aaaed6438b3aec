//! Fuzz target for [`Broker`] operation sequences
//!
//! # Strategy
//!
//! - Arbitrary interleavings of sends, connects (any skip count, either
//!   clear listener kind), disconnects and resets
//! - Peer indices past the registered handles
//!
//! # Invariants
//!
//! - Real broker and reference model agree after every operation
//! - Serial always equals log length; serial `k` is at index `k - 1`
//! - `Record` actions mirror the audit trail since the last reset
//! - NEVER panic on any sequence

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use peersim_harness::{BrokerWorld, ModelWorld, Operation};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Registered peers (mapped to 1..=8)
    peers: u8,
    operations: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let num_peers = usize::from(input.peers % 8) + 1;
    let mut model = ModelWorld::new(num_peers);
    let Ok(mut real) = BrokerWorld::new(num_peers) else {
        return;
    };

    for op in &input.operations {
        let model_result = model.apply(op);
        let real_result = real.apply(op);
        assert_eq!(model_result, real_result, "result divergence on {op:?}");
        assert_eq!(model.observable_state(), real.observable_state(), "state divergence on {op:?}");

        let broker = real.broker();
        assert_eq!(broker.current_serial(), broker.log().len());
        for (index, update) in broker.log().entries().iter().enumerate() {
            assert_eq!(update.serial, index as u64 + 1);
        }
        assert_eq!(real.recorded(), broker.audit());
    }
});
