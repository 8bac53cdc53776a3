//! Property-based tests for sessions.
//!
//! - Dispatch sees the same frames in the same order however the stream is chunked
//! - Type-specific callbacks always run before wildcard callbacks

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use sbprims_dispatch::{MessageRegistry, Session, Subscription};
use sbprims_frame::{encode, MAX_PAYLOAD};

fn frames_strategy() -> impl Strategy<Value = Vec<(u16, u16, Vec<u8>)>> {
    prop::collection::vec(
        (
            0u16..4,
            any::<u16>(),
            prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
        ),
        1..10,
    )
}

fn wire_for(frames: &[(u16, u16, Vec<u8>)]) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|(msg_type, sender_id, payload)| {
            encode(*msg_type, *sender_id, payload).unwrap().to_vec()
        })
        .collect()
}

fn recording_session(log: &Arc<Mutex<Vec<(String, u16, u16)>>>) -> Session<()> {
    let mut session = Session::new(Arc::new(MessageRegistry::new()));
    for (subscription, label) in [
        (Subscription::Wildcard, "wildcard"),
        (Subscription::Type(1), "type-1"),
        (Subscription::Type(2), "type-2"),
    ] {
        let log = Arc::clone(log);
        session.register(subscription, move |frame, _| {
            log.lock()
                .unwrap()
                .push((label.to_string(), frame.msg_type, frame.sender_id));
            Ok(())
        });
    }
    session
}

#[test]
fn prop_dispatch_is_chunking_invariant() {
    proptest!(|(frames in frames_strategy(), chunk in 1usize..64)| {
        let wire = wire_for(&frames);

        let whole_log = Arc::new(Mutex::new(Vec::new()));
        let mut whole = recording_session(&whole_log);
        let report = whole.feed(&wire);
        prop_assert_eq!(report.frames.len(), frames.len());
        prop_assert!(report.is_clean());

        let chunked_log = Arc::new(Mutex::new(Vec::new()));
        let mut chunked = recording_session(&chunked_log);
        let mut dispatched = 0;
        for piece in wire.chunks(chunk) {
            dispatched += chunked.feed(piece).frames.len();
        }
        prop_assert_eq!(dispatched, frames.len());

        prop_assert_eq!(&*whole_log.lock().unwrap(), &*chunked_log.lock().unwrap());
    });
}

#[test]
fn prop_typed_callbacks_precede_wildcard() {
    proptest!(|(frames in frames_strategy())| {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut session = recording_session(&log);
        session.feed(&wire_for(&frames));

        let mut expected = Vec::new();
        for (msg_type, sender_id, _) in &frames {
            match msg_type {
                1 => expected.push(("type-1".to_string(), *msg_type, *sender_id)),
                2 => expected.push(("type-2".to_string(), *msg_type, *sender_id)),
                _ => {}
            }
            expected.push(("wildcard".to_string(), *msg_type, *sender_id));
        }

        prop_assert_eq!(&*log.lock().unwrap(), &expected);
    });
}
