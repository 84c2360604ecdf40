//! Packet Fabrication Engine.
//!
//! Interprets one catalogue entry against a chunk of payload bytes and
//! emits the disguised cover frame: layered binary headers with
//! computed checksums, counters and bitfields, or a templated text
//! frame. The companion [`unwrap`] module recovers the embedded payload
//! on the receive side.
//!
//! Checksum fields are written in a second pass after every other
//! field of their region is in place, so their value never depends on
//! catalogue field order.

pub mod checksum;
pub mod sequence;
pub mod template;
pub mod unwrap;
pub mod writer;

pub use sequence::SequenceState;
pub use unwrap::unwrap;

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::catalogue::{
    EntryBody, Field, FieldSource, FrameItem, FrameStructure, LayerStack, ProtocolEntry, Value,
};
use crate::obfuscate::Obfuscate;

/// The fabrication engine. Stateless apart from the payload transform;
/// sequence counters are owned by each wrap task and passed in per
/// call.
pub struct Fabricator {
    obfuscator: Arc<dyn Obfuscate>,
}

impl Fabricator {
    /// Create an engine using the given payload transform.
    pub fn new(obfuscator: Arc<dyn Obfuscate>) -> Self {
        Self { obfuscator }
    }

    /// Materialise the cover frame for one payload chunk.
    pub fn build(
        &self,
        entry: &ProtocolEntry,
        conn_id: &str,
        payload: &[u8],
        sequences: &mut SequenceState,
    ) -> Bytes {
        match &entry.body {
            EntryBody::Layers(stack) => self.build_layers(stack, conn_id, payload, sequences),
            EntryBody::Frame(frame) => self.build_frame(frame, conn_id, payload),
            EntryBody::Passthrough => Bytes::copy_from_slice(payload),
        }
    }

    fn build_layers(
        &self,
        stack: &LayerStack,
        conn_id: &str,
        payload: &[u8],
        sequences: &mut SequenceState,
    ) -> Bytes {
        let mut out = BytesMut::new();
        for layer in &stack.layers {
            out.extend_from_slice(&self.build_region(
                layer.buffer_size,
                &layer.fields,
                conn_id,
                payload,
                sequences,
            ));
            for chunk in &layer.chunks {
                out.extend_from_slice(&self.build_region(
                    chunk.buffer_size,
                    &chunk.fields,
                    conn_id,
                    payload,
                    sequences,
                ));
            }
        }
        out.freeze()
    }

    /// Build one layer header or chunk buffer. Non-computed fields land
    /// first in catalogue order; computation fields then overwrite
    /// their slots with checksums over the finished region.
    fn build_region(
        &self,
        size: usize,
        fields: &[Field],
        conn_id: &str,
        payload: &[u8],
        sequences: &mut SequenceState,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; size];

        for field in fields {
            if matches!(field.source, FieldSource::Computed(_)) {
                continue;
            }
            let value = self.field_value(field, conn_id, payload, sequences);
            writer::write_field(&mut buf, field, &value);
        }

        for field in fields {
            if let FieldSource::Computed(comp) = &field.source {
                let sum = checksum::compute(comp, &buf, payload);
                writer::write_field(&mut buf, field, &Value::Int(sum as i64));
            }
        }

        buf
    }

    fn field_value(
        &self,
        field: &Field,
        conn_id: &str,
        payload: &[u8],
        sequences: &mut SequenceState,
    ) -> Value {
        match &field.source {
            FieldSource::Payload => Value::Bytes(self.obfuscator.obfuscate(payload)),
            FieldSource::Sequence(spec) => {
                sequences.next(format!("{}:{}", conn_id, field.name), spec)
            }
            FieldSource::Random => sequence::random_value(field.kind),
            FieldSource::Literal(Some(value)) => template::resolve_value(value, conn_id),
            FieldSource::Literal(None) => Value::Null,
            // handled in the second pass of build_region
            FieldSource::Computed(_) => Value::Null,
        }
    }

    fn build_frame(&self, frame: &FrameStructure, conn_id: &str, payload: &[u8]) -> Bytes {
        let mut out = BytesMut::new();
        for item in &frame.items {
            match item {
                FrameItem::Payload => {
                    out.extend_from_slice(&self.obfuscator.obfuscate(payload));
                }
                FrameItem::Text(text) => {
                    let rendered = render_text(text, conn_id, payload.len());
                    out.extend_from_slice(rendered.as_bytes());
                }
                FrameItem::Headers(pairs) => {
                    for (name, raw) in pairs {
                        let rendered = render_text(raw, conn_id, payload.len());
                        out.extend_from_slice(format!("{}: {}\r\n", name, rendered).as_bytes());
                    }
                }
            }
        }
        if !frame.line_ending.is_empty() {
            out.extend_from_slice(frame.line_ending.as_bytes());
        }
        out.freeze()
    }
}

fn render_text(text: &str, conn_id: &str, payload_len: usize) -> String {
    template::substitute_data_len(&template::resolve_str(text, conn_id), payload_len)
}
