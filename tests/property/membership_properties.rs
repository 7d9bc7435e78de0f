//! Property-based tests for room membership.
//!
//! Applies random sequences of attach and detach events across a few rooms
//! and checks after every event that a room is present in the registry
//! exactly when it has at least one attached connection, with the same
//! sender and viewer counts as a simple model.

use std::collections::HashMap;

use proptest::prelude::*;
use locshare_proto::session::Role;
use locshare_relay::rooms::{Connection, RoomMembers, RoomRegistry};
use tokio::sync::mpsc;

const ROOMS: [&str; 3] = ["abc", "xyz", "0123456789abcdef"];

#[derive(Debug, Clone)]
enum Event {
    /// Attach a new connection to `ROOMS[room]`.
    Attach { room: usize, role: Role },
    /// Detach the live connection at this index (modulo the live count).
    Detach(usize),
    /// Detach a connection that was already detached.
    DetachStale(usize),
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Sender), Just(Role::Viewer)]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0..ROOMS.len(), arb_role()).prop_map(|(room, role)| Event::Attach { room, role }),
        any::<usize>().prop_map(Event::Detach),
        any::<usize>().prop_map(Event::DetachStale),
    ]
}

/// Expected membership counts keyed by room id.
fn model_counts(live: &[Connection]) -> HashMap<&str, RoomMembers> {
    let mut counts: HashMap<&str, RoomMembers> = HashMap::new();
    for conn in live {
        let entry = counts.entry(conn.room_id()).or_insert(RoomMembers {
            senders: 0,
            viewers: 0,
        });
        match conn.role() {
            Role::Sender => entry.senders += 1,
            Role::Viewer => entry.viewers += 1,
        }
    }
    counts
}

async fn run(events: Vec<Event>) -> Result<(), TestCaseError> {
    let registry = RoomRegistry::new();
    let mut live: Vec<Connection> = Vec::new();
    let mut gone: Vec<Connection> = Vec::new();
    // Receivers are kept so sinks stay open for the whole run.
    let mut receivers = Vec::new();

    for event in events {
        match event {
            Event::Attach { room, role } => {
                let (tx, rx) = mpsc::channel(1);
                receivers.push(rx);
                let conn = registry
                    .attach(ROOMS[room], role, tx)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                live.push(conn);
            }
            Event::Detach(i) => {
                if live.is_empty() {
                    continue;
                }
                let conn = live.swap_remove(i % live.len());
                prop_assert!(registry.on_close(&conn).await);
                gone.push(conn);
            }
            Event::DetachStale(i) => {
                if gone.is_empty() {
                    continue;
                }
                let conn = &gone[i % gone.len()];
                prop_assert!(!registry.detach(conn).await);
            }
        }

        let expected = model_counts(&live);
        for room in ROOMS {
            prop_assert_eq!(registry.members(room).await, expected.get(room).copied());
        }
        prop_assert_eq!(registry.room_count().await, expected.len());
    }

    Ok(())
}

proptest! {
    /// A room exists iff it has attached connections, after every event.
    #[test]
    fn room_present_iff_non_empty(events in prop::collection::vec(arb_event(), 0..64)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime should build");
        runtime.block_on(run(events))?;
    }
}
