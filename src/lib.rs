//! # Camouflage Tunnel (camotun)
//!
//! A userspace TCP relay that ferries an opaque byte stream between two
//! endpoints while disguising each flight of bytes as a well-formed frame
//! of some other protocol (HTTP request, DNS query, synthesized TCP/IP
//! packet body, ...). The disguise is driven by a declarative protocol
//! pattern catalogue loaded at startup, so new cover protocols can be
//! added without code changes.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Tunnel Relay                         │
//! │   accept loop + per-direction copy tasks + rotation      │
//! ├─────────────────────────────────────────────────────────┤
//! │  Fabrication Engine (wrap)   │   Unwrap Engine (recv)    │
//! ├─────────────────────────────────────────────────────────┤
//! │  Field Writer │ Checksums │ Templates │ Sequences        │
//! ├─────────────────────────────────────────────────────────┤
//! │        Protocol Catalogue (declarative, immutable)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flow on the client side: inbound TCP read → selector picks a
//! catalogue entry → fabrication engine emits a disguised frame → write
//! to the peer. The server side unwraps each received frame and forwards
//! the recovered payload upstream.
//!
//! The engine prioritises liveness over cover-protocol correctness:
//! catalogue interpretation problems degrade to zeroed fields or
//! pass-through bytes, never to a dropped connection.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod catalogue;
pub mod engine;
pub mod error;
pub mod obfuscate;
pub mod rotation;
pub mod tunnel;

pub use error::{Error, Result};

/// Read buffer size for each relay direction. One socket read of up to
/// this many bytes becomes exactly one cover frame on the wire.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default rotation interval in seconds for the `time_based` policy.
pub const DEFAULT_ROTATION_INTERVAL_SECS: u64 = 60;

/// Key bytes used when the supplied obfuscation key fails to decode.
pub const FALLBACK_OBFUSCATION_KEY: &[u8] = b"defaultkey123456";
