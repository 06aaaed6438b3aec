//! Fuzz target for the peer socket request parser
//!
//! # Strategy
//!
//! - Raw text straight off a socket, including invalid JSON and unknown
//!   message types
//! - Well-formed envelopes with fuzzed field values
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - Accepted `setUpdateListener` requests round-trip their serial

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use peersim_server::protocol::{ClientRequest, parse_request};

#[derive(Debug, Arbitrary)]
enum FuzzInput {
    Raw(String),
    Listener { serial: u64 },
    Send { update: String, descr: Option<String> },
}

fuzz_target!(|input: FuzzInput| {
    match input {
        FuzzInput::Raw(text) => {
            let _ = parse_request(&text);
        },
        FuzzInput::Listener { serial } => {
            let text = format!(r#"{{"type":"setUpdateListener","serial":{serial}}}"#);
            match parse_request(&text) {
                Ok(ClientRequest::SetUpdateListener { serial: parsed }) => assert_eq!(parsed, serial),
                other => panic!("listener request rejected: {other:?}"),
            }
        },
        FuzzInput::Send { update, descr } => {
            let mut text = String::from(r#"{"type":"sendUpdate","update":"#);
            text.push_str(&update);
            if let Some(descr) = descr {
                text.push_str(r#","descr":"#);
                text.push_str(&descr);
            }
            text.push('}');
            let _ = parse_request(&text);
        },
    }
});
