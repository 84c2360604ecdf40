//! Unwrap Engine: recover the embedded payload from a received frame.
//!
//! The receive side carries no in-band protocol tag, so extraction is
//! heuristic: catalogue entries are tried in order and the first
//! non-empty extraction wins. When nothing matches, the raw bytes are
//! forwarded verbatim; the relay prioritises liveness over cover
//! correctness.

use crate::catalogue::{Catalogue, EntryBody, LayerStack};
use crate::obfuscate::Obfuscate;

/// End-of-headers marker for text frames.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Recover the payload embedded in `buffer`, trying each catalogue
/// entry in order. Returns the buffer unchanged when no entry yields a
/// non-empty extraction.
pub fn unwrap(buffer: &[u8], catalogue: &Catalogue, obfuscator: &dyn Obfuscate) -> Vec<u8> {
    for entry in &catalogue.entries {
        let extracted = match &entry.body {
            EntryBody::Frame(_) => extract_after_headers(buffer, obfuscator),
            EntryBody::Layers(stack) => extract_after_layers(buffer, stack, obfuscator),
            EntryBody::Passthrough => continue,
        };
        if !extracted.is_empty() {
            return extracted;
        }
    }
    buffer.to_vec()
}

/// Text frames: everything after the first blank line is the payload.
/// Frames with no terminator (or nothing after it) pass through whole.
fn extract_after_headers(buffer: &[u8], obfuscator: &dyn Obfuscate) -> Vec<u8> {
    if let Some(idx) = find_subsequence(buffer, HEADER_TERMINATOR) {
        let body = &buffer[idx + HEADER_TERMINATOR.len()..];
        if !body.is_empty() {
            return obfuscator.deobfuscate(body);
        }
    }
    buffer.to_vec()
}

/// Layered frames: strip the transport and application header sizes,
/// then invert the payload transform on the remainder.
fn extract_after_layers(
    buffer: &[u8],
    stack: &LayerStack,
    obfuscator: &dyn Obfuscate,
) -> Vec<u8> {
    let header_size = stack.unwrap_header_size();
    if buffer.len() > header_size {
        obfuscator.deobfuscate(&buffer[header_size..])
    } else {
        buffer.to_vec()
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Catalogue;
    use crate::engine::{Fabricator, SequenceState};
    use crate::obfuscate::{Identity, XorPad};
    use std::sync::Arc;

    const HTTP_FIRST: &str = r#"{"protocols": [
        {"identifier": "http", "frame_structure": {
            "line_ending": "",
            "request_format": [
                "POST /upload HTTP/1.1\r\n",
                {"Host": "cdn.example.net"},
                "\r\n",
                "<<VPN_DATA>>"
            ]
        }},
        {"identifier": "raw", "layer_stack": {
            "layer4": {"header_size": 8, "fields": []}
        }}
    ]}"#;

    fn load(json: &str) -> Catalogue {
        Catalogue::from_json_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_frame_round_trip() {
        let cat = load(HTTP_FIRST);
        let fab = Fabricator::new(Arc::new(Identity));
        let mut seq = SequenceState::new();
        let payload = b"tunnel control bytes";

        let wire = fab.build(&cat.entries[0], "c", payload, &mut seq);
        let recovered = unwrap(&wire, &cat, &Identity);
        assert_eq!(recovered, payload);
    }

    #[test]
    fn test_frame_extraction_from_known_bytes() {
        let cat = load(HTTP_FIRST);
        let wire = b"GET / HTTP/1.1\r\nHost: example.com\r\nContent-Length: 2\r\n\r\nhi";
        assert_eq!(unwrap(wire, &cat, &Identity), b"hi");
    }

    #[test]
    fn test_layered_round_trip() {
        // The payload rides in a chunk after the L4 header; unwrap
        // strips exactly that header. Lossless when the payload fills
        // the declared slot.
        let cat = load(
            r#"{"protocols": [{"identifier": "bin", "layer_stack": {
                "layer4": {
                    "header_size": 4,
                    "fields": [{"name": "magic", "offset": 0, "size": 4,
                                "type": "uint32_be", "value": 1}],
                    "chunks": [{"name": "body", "fields": [
                        {"name": "data", "offset": 0, "size": 6,
                         "type": "bytes", "value": "<<VPN_DATA>>"}]}]
                }
            }}]}"#,
        );
        let fab = Fabricator::new(Arc::new(Identity));
        let mut seq = SequenceState::new();
        let wire = fab.build(&cat.entries[0], "c", b"secret", &mut seq);
        assert_eq!(wire.as_ref(), b"\x00\x00\x00\x01secret".as_ref());
        assert_eq!(unwrap(&wire, &cat, &Identity), b"secret");
    }

    #[test]
    fn test_layered_round_trip_with_xor() {
        let cat = load(
            r#"{"protocols": [{"identifier": "bin", "layer_stack": {
                "layer4": {"header_size": 3, "fields": []}
            }}]}"#,
        );
        let pad = XorPad::new(b"key-material".to_vec());
        let mut wire = vec![9, 9, 9];
        wire.extend_from_slice(&pad.obfuscate(b"secret"));
        assert_eq!(unwrap(&wire, &cat, &pad), b"secret");
    }

    #[test]
    fn test_short_layered_buffer_passes_through() {
        let cat = load(
            r#"{"protocols": [{"identifier": "bin", "layer_stack": {
                "layer4": {"header_size": 16, "fields": []}
            }}]}"#,
        );
        let wire = [1u8, 2, 3];
        assert_eq!(unwrap(&wire, &cat, &Identity), &wire);
    }

    #[test]
    fn test_no_match_forwards_verbatim() {
        let cat = load(
            r#"{"protocols": [{"identifier": "bin", "layer_stack": {
                "layer4": {"header_size": 64, "fields": []}
            }}]}"#,
        );
        let wire = b"way too short";
        assert_eq!(unwrap(wire, &cat, &Identity), wire);
    }

    #[test]
    fn test_frame_without_terminator_passes_through() {
        let cat = load(HTTP_FIRST);
        let wire = b"no http structure here";
        assert_eq!(unwrap(wire, &cat, &Identity), wire);
    }

    #[test]
    fn test_empty_buffer() {
        let cat = load(HTTP_FIRST);
        assert_eq!(unwrap(b"", &cat, &Identity), b"");
    }

    #[test]
    fn test_first_entry_wins() {
        // A buffer both entries could claim goes to the catalogue-order
        // winner (the frame entry).
        let cat = load(HTTP_FIRST);
        let wire = b"0123456789\r\n\r\ntail";
        assert_eq!(unwrap(wire, &cat, &Identity), b"tail");
    }
}
