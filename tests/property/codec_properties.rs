//! Property-based tests for the location codec.
//!
//! Uses proptest to verify:
//! 1. Random bytes never cause a panic in `decode` (returns `Err` gracefully).
//! 2. A re-encoded update carries the same `lat`, `lng`, `accuracy`, `ts`.
//! 3. Extra fields on an inbound `loc` frame never change the decoded update.
//! 4. Well-formed objects with any other `type` decode as `Unknown`.

use proptest::prelude::*;
use locshare_proto::codec;
use locshare_proto::location::{Envelope, LocationUpdate};

// --- Strategies ---

/// Strategy for realistic position fixes.
///
/// Coordinates are generated with micro-degree resolution, which is what
/// browsers report and keeps the JSON text exactly representable.
fn arb_update() -> impl Strategy<Value = LocationUpdate> {
    (
        -90_000_000i32..=90_000_000,
        -180_000_000i32..=180_000_000,
        0u32..1_000_000,
        any::<i64>(),
    )
        .prop_map(|(lat, lng, accuracy, ts)| LocationUpdate {
            lat: f64::from(lat) / 1e6,
            lng: f64::from(lng) / 1e6,
            accuracy: f64::from(accuracy) / 10.0,
            ts,
        })
}

/// Strategy for extra JSON fields a client might attach.
fn arb_extras() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("x_[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}"), 0..4)
}

/// Strategy for `type` values other than `loc`.
fn arb_other_type() -> impl Strategy<Value = String> {
    "[a-z]{1,10}".prop_filter("must not be loc", |t| t != "loc")
}

// --- Property tests ---

proptest! {
    /// Random bytes never cause a panic when decoded.
    #[test]
    fn random_bytes_decode_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode(&bytes);
    }

    /// Random strings never cause a panic when decoded.
    #[test]
    fn random_text_decode_no_panic(text in ".{0,256}") {
        let _ = codec::decode(text.as_bytes());
    }

    /// Outbound frames decode to the same four fields.
    #[test]
    fn reencoded_update_is_field_equal(update in arb_update()) {
        let text = codec::encode(&update).expect("encode should succeed");
        let decoded = codec::decode(text.as_bytes()).expect("decode should succeed");
        prop_assert_eq!(decoded, Envelope::Loc(update));
    }

    /// Extra fields on an inbound frame are ignored and never re-emitted.
    #[test]
    fn extra_fields_are_stripped(update in arb_update(), extras in arb_extras()) {
        let mut value = serde_json::to_value(Envelope::Loc(update)).expect("to_value should succeed");
        let object = value.as_object_mut().expect("envelope is an object");
        for (key, val) in &extras {
            object.insert(key.clone(), serde_json::Value::String(val.clone()));
        }
        let inbound = serde_json::to_vec(&value).expect("to_vec should succeed");

        let decoded = codec::decode(&inbound).expect("decode should succeed");
        prop_assert_eq!(decoded, Envelope::Loc(update));

        let outbound = codec::encode(&update).expect("encode should succeed");
        for (key, _) in &extras {
            prop_assert!(!outbound.contains(key.as_str()));
        }
    }

    /// Objects with an unrecognised type are ignored rather than rejected.
    #[test]
    fn other_types_decode_as_unknown(kind in arb_other_type(), update in arb_update()) {
        let mut value = serde_json::to_value(Envelope::Loc(update)).expect("to_value should succeed");
        value["type"] = serde_json::Value::String(kind);
        let bytes = serde_json::to_vec(&value).expect("to_vec should succeed");
        prop_assert_eq!(codec::decode(&bytes).expect("decode should succeed"), Envelope::Unknown);
    }

    /// Dropping any one required field makes a `loc` frame malformed.
    #[test]
    fn missing_field_is_rejected(update in arb_update(), field in prop::sample::select(vec!["lat", "lng", "accuracy", "ts"])) {
        let mut value = serde_json::to_value(Envelope::Loc(update)).expect("to_value should succeed");
        value.as_object_mut().expect("envelope is an object").remove(field);
        let bytes = serde_json::to_vec(&value).expect("to_vec should succeed");
        prop_assert!(codec::decode(&bytes).is_err());
    }
}
