//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! broker behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    BrokerWorld      Compare
//!      (reference)   (Broker)         States
//! ```

use peersim_harness::{BrokerWorld, ModelWorld, Operation, PeerEvent, PeerIndex};
use proptest::prelude::*;

/// Strategy for generating operations.
///
/// Peer indices run one past the registered peers so unknown-peer errors are
/// exercised too.
fn operation_strategy(num_peers: u8) -> impl Strategy<Value = Operation> {
    let peer = 0..=num_peers;
    let seen = prop_oneof![3 => 0..4u8, 1 => any::<u8>()];

    prop_oneof![
        // Weight towards traffic
        6 => (peer.clone(), any::<u8>()).prop_map(|(peer, seed)| Operation::Send { peer, seed }),
        3 => (peer.clone(), seen, prop::bool::weighted(0.2))
            .prop_map(|(peer, seen, silent)| Operation::Connect { peer, seen, silent }),
        1 => peer.prop_map(|peer| Operation::Disconnect { peer }),
        1 => Just(Operation::Clear),
    ]
}

fn run(num_peers: u8, ops: &[Operation]) -> (ModelWorld, BrokerWorld) {
    let mut model = ModelWorld::new(usize::from(num_peers));
    let mut real = BrokerWorld::new(usize::from(num_peers)).unwrap();

    for op in ops {
        model.apply(op);
        real.apply(op);
    }

    (model, real)
}

proptest! {
    /// Core model-based test: results and observable state match after
    /// every operation.
    #[test]
    fn prop_model_matches_real(
        num_peers in 1..5u8,
        ops in prop::collection::vec(operation_strategy(4), 0..60)
    ) {
        let mut model = ModelWorld::new(usize::from(num_peers));
        let mut real = BrokerWorld::new(usize::from(num_peers)).unwrap();

        for (i, op) in ops.iter().enumerate() {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(
                &model_result,
                &real_result,
                "Divergence at operation {}: {:?}",
                i, op
            );

            let model_state = model.observable_state();
            let real_state = real.observable_state();
            prop_assert_eq!(model_state, real_state, "State divergence after operation {}: {:?}", i, op);
        }
    }

    /// `Record` actions are exactly the audit trail since the last reset.
    #[test]
    fn prop_record_actions_mirror_audit(
        ops in prop::collection::vec(operation_strategy(3), 0..60)
    ) {
        let (_, real) = run(3, &ops);

        prop_assert_eq!(real.recorded(), real.broker().audit());
    }

    /// The log is gapless: serial `k` sits at index `k - 1`.
    #[test]
    fn prop_log_is_gapless(
        ops in prop::collection::vec(operation_strategy(3), 0..60)
    ) {
        let (_, real) = run(3, &ops);
        let broker = real.broker();

        prop_assert_eq!(broker.current_serial(), broker.log().len());
        for (index, update) in broker.log().entries().iter().enumerate() {
            prop_assert_eq!(update.serial, index as u64 + 1);
        }
    }

    /// Replay batches cover everything past the skip count, re-stamped with
    /// the log length.
    #[test]
    fn prop_replay_covers_suffix(
        sends in 0..20u8,
        seen in 0..25u8,
    ) {
        let mut ops: Vec<Operation> =
            (0..sends).map(|seed| Operation::Send { peer: 0, seed }).collect();
        ops.push(Operation::Connect { peer: 1, seen, silent: false });

        let (model, real) = run(2, &ops);

        let Some(PeerEvent::Batch(replay)) = model.peer_events(1).last() else {
            return Err(TestCaseError::fail("connect produced no batch"));
        };
        let serials: Vec<u64> = replay.iter().map(|update| update.serial).collect();
        let expected: Vec<u64> = (u64::from(seen.min(sends)) + 1..=u64::from(sends)).collect();
        prop_assert_eq!(serials, expected);
        prop_assert!(replay.iter().all(|update| update.max_serial == u64::from(sends)));
        prop_assert_eq!(model.observable_state(), real.observable_state());
    }
}

#[test]
fn unknown_peer_matches() {
    let ops = [Operation::Send { peer: 3, seed: 1 }, Operation::Connect { peer: 3, seen: 0, silent: false }];
    let mut model = ModelWorld::new(3);
    let mut real = BrokerWorld::new(3).unwrap();

    for op in &ops {
        let model_result = model.apply(op);
        assert!(!model_result.is_ok());
        assert_eq!(model_result, real.apply(op));
    }
    assert_eq!(real.broker().current_serial(), 0);
}

#[test]
fn clear_notices_once_per_epoch() {
    let peer: PeerIndex = 0;
    let ops = [
        Operation::Connect { peer, seen: 0, silent: false },
        Operation::Connect { peer, seen: 0, silent: false },
        Operation::Disconnect { peer },
        Operation::Connect { peer, seen: 0, silent: false },
        Operation::Clear,
        Operation::Connect { peer, seen: 0, silent: false },
    ];

    let (model, real) = run(1, &ops);

    let clears = real.observable_state().peer_events[0]
        .iter()
        .filter(|event| matches!(event, PeerEvent::Clear))
        .count();
    assert_eq!(clears, 2);
    assert_eq!(model.epoch(), real.broker().epoch());
    assert_eq!(model.observable_state(), real.observable_state());
}
