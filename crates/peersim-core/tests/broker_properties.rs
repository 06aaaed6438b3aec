//! Property-based tests for broker ordering and delivery invariants.

use peersim_core::{Broker, BrokerAction, ClearNotice, PeerId};
use proptest::prelude::*;
use serde_json::json;

fn sent_serials(actions: &[BrokerAction]) -> Vec<u64> {
    actions
        .iter()
        .filter_map(|action| match action {
            BrokerAction::Record(peersim_core::AuditEntry::Sent { update, .. }) => {
                Some(update.serial)
            },
            _ => None,
        })
        .collect()
}

fn delivered_to(actions: &[BrokerAction], peer: &PeerId) -> Vec<Vec<u64>> {
    actions
        .iter()
        .filter_map(|action| match action {
            BrokerAction::Deliver { peer_id, updates } if peer_id == peer => {
                Some(updates.iter().map(|u| u.serial).collect())
            },
            _ => None,
        })
        .collect()
}

proptest! {
    /// Serials are 1..=n regardless of which peers send.
    #[test]
    fn prop_serials_monotonic_without_gaps(senders in prop::collection::vec(0..4usize, 1..60)) {
        let peers: Vec<PeerId> = (0..4).map(|i| PeerId::new(format!("p{i}"))).collect();
        let mut broker = Broker::new();
        for peer in &peers {
            broker.create_handle(peer.clone()).unwrap();
        }

        let mut serials = Vec::new();
        for sender in &senders {
            let actions = broker.send_update(&peers[*sender], json!(sender), "").unwrap();
            serials.extend(sent_serials(&actions));
        }

        let expected: Vec<u64> = (1..=senders.len() as u64).collect();
        prop_assert_eq!(serials, expected);
    }

    /// A handle with cursor C receives the push for serial S iff S > C.
    #[test]
    fn prop_cursor_filtering(cursor in 0u64..20, sends in 1usize..25) {
        let mut broker = Broker::new();
        broker.create_handle("sender").unwrap();
        broker.create_handle("watcher").unwrap();
        let sender = PeerId::from("sender");
        let watcher = PeerId::from("watcher");
        broker.connect(&watcher, cursor, ClearNotice::Notify).unwrap();

        for _ in 0..sends {
            let actions = broker.send_update(&sender, json!(null), "").unwrap();
            let serial = broker.current_serial();
            let delivered = delivered_to(&actions, &watcher);

            if serial > cursor {
                prop_assert_eq!(delivered, vec![vec![serial]]);
            } else {
                prop_assert!(delivered.is_empty(), "serial {} leaked past cursor {}", serial, cursor);
            }
        }
    }

    /// Connecting with `seen` replays exactly the entries at index >= seen,
    /// once, re-stamped with the log length.
    #[test]
    fn prop_replay_is_single_restamped_batch(len in 0u64..30, seen in 0u64..40) {
        let mut broker = Broker::new();
        broker.create_handle("sender").unwrap();
        broker.create_handle("late").unwrap();
        let sender = PeerId::from("sender");
        let late = PeerId::from("late");

        for i in 0..len {
            broker.send_update(&sender, json!(i), "").unwrap();
        }

        let actions = broker.connect(&late, seen, ClearNotice::Notify).unwrap();
        let batches: Vec<_> = actions
            .iter()
            .filter_map(|action| match action {
                BrokerAction::Deliver { updates, .. } => Some(updates.clone()),
                _ => None,
            })
            .collect();

        prop_assert_eq!(batches.len(), 1, "connect must deliver exactly once");
        let batch = &batches[0];
        let expected: Vec<u64> = (seen.min(len) + 1..=len).collect();
        prop_assert_eq!(batch.iter().map(|u| u.serial).collect::<Vec<_>>(), expected);
        prop_assert!(batch.iter().all(|u| u.max_serial == len));
    }

    /// Within an epoch, however many connects and resets interleave, each
    /// handle gets at most one notice per epoch.
    #[test]
    fn prop_clear_notice_at_most_once_per_epoch(ops in prop::collection::vec(any::<bool>(), 1..40)) {
        let mut broker = Broker::new();
        broker.create_handle("a").unwrap();
        let a = PeerId::from("a");

        let mut notices_this_epoch = 0;
        for reset in ops {
            let actions = if reset {
                notices_this_epoch = 0;
                broker.clear()
            } else {
                broker.connect(&a, 0, ClearNotice::Notify).unwrap()
            };
            notices_this_epoch += actions
                .iter()
                .filter(|action| matches!(action, BrokerAction::NotifyClear { .. }))
                .count();
            prop_assert!(notices_this_epoch <= 1);
        }
    }
}
