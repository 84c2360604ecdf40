//! Pre-resolved protocol model.
//!
//! The loader converts the raw schema into these types exactly once:
//! numeric constants are parsed, checksum parameters are resolved
//! against their defaults, scopes are pre-compiled and layer buffer
//! sizes are pre-computed. The fabrication engine interprets this model
//! on the hot path without any string dispatch.

use std::collections::BTreeMap;
use std::net::IpAddr;

use super::schema;
use super::value::{parse_u64_any, Value};

/// Sentinel marking a field or frame item as the payload slot.
pub const VPN_DATA_SENTINEL: &str = "<<VPN_DATA>>";

/// Engine metadata from the catalogue header.
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    /// Engine name
    pub name: String,
    /// Engine version
    pub version: String,
}

/// One cover-protocol description.
#[derive(Debug, Clone)]
pub struct ProtocolEntry {
    /// Unique identifier
    pub identifier: String,
    /// Transport tag, informational
    pub transport: String,
    /// Frame shape
    pub body: EntryBody,
}

impl ProtocolEntry {
    /// Sentinel entry used when the catalogue is empty: the build path
    /// emits the payload unchanged.
    pub fn fallback() -> Self {
        Self {
            identifier: "fallback".to_string(),
            transport: String::new(),
            body: EntryBody::Passthrough,
        }
    }
}

/// The two frame shapes, plus the fallback pass-through.
#[derive(Debug, Clone)]
pub enum EntryBody {
    /// Ordered stack of binary layers
    Layers(LayerStack),
    /// Text-oriented frame
    Frame(FrameStructure),
    /// Payload emitted unchanged (fallback sentinel only)
    Passthrough,
}

/// Layer roles in fixed emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    /// Ethernet
    L2Ethernet,
    /// IPv4
    L3Ipv4,
    /// IPv6
    L3Ipv6,
    /// Transport
    L4,
    /// Session
    L5,
    /// Presentation
    L6,
    /// Application
    L7,
}

/// Ordered slice of layer definitions (only present roles, L2→L7).
#[derive(Debug, Clone)]
pub struct LayerStack {
    /// Layers in emission order
    pub layers: Vec<Layer>,
}

impl LayerStack {
    /// Combined header size of the transport and application layers,
    /// which is what the unwrap heuristic strips.
    pub fn unwrap_header_size(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l.role, LayerRole::L4 | LayerRole::L7))
            .map(|l| l.header_size)
            .sum()
    }
}

/// One layer definition.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Role within the stack
    pub role: LayerRole,
    /// Declared header size in bytes
    pub header_size: usize,
    /// Emitted buffer size: `max(header_size, max(offset + size))`
    pub buffer_size: usize,
    /// Fields in catalogue order
    pub fields: Vec<Field>,
    /// Appendices after the header
    pub chunks: Vec<Chunk>,
}

/// A named contiguous appendix, sized by its field extent.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name
    pub name: String,
    /// Emitted buffer size: `max(offset + size)` over the fields
    pub buffer_size: usize,
    /// Fields in catalogue order
    pub fields: Vec<Field>,
}

/// A typed slot at a fixed offset within a layer or chunk.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name (keys sequence state)
    pub name: String,
    /// Byte offset from the start of the containing buffer
    pub offset: usize,
    /// Declared size in bytes (0 = to end of buffer for text/bytes)
    pub size: usize,
    /// Wire representation
    pub kind: FieldKind,
    /// Bitfield sub-layout (empty unless `kind` is `Bitfield`)
    pub bits: Vec<BitSpec>,
    /// Where the runtime value comes from
    pub source: FieldSource,
}

/// Wire representation of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single byte
    U8,
    /// Big-endian u16
    U16Be,
    /// Little-endian u16
    U16Le,
    /// Big-endian u32
    U32Be,
    /// Little-endian u32
    U32Le,
    /// Packed sub-fields
    Bitfield,
    /// Dotted-quad address, 4 bytes
    Ipv4,
    /// Colon-hex address, 16 bytes
    Ipv6,
    /// Raw bytes
    Bytes,
    /// UTF-8 text
    Str,
    /// Unknown type tag: occupies space, never written
    Opaque,
}

impl FieldKind {
    fn parse(tag: &str) -> FieldKind {
        match tag {
            "uint8" => FieldKind::U8,
            "uint16_be" => FieldKind::U16Be,
            "uint16_le" => FieldKind::U16Le,
            "uint32_be" => FieldKind::U32Be,
            "uint32_le" => FieldKind::U32Le,
            "bitfield" => FieldKind::Bitfield,
            "ipv4_address" => FieldKind::Ipv4,
            "ipv6_address" => FieldKind::Ipv6,
            "bytes" => FieldKind::Bytes,
            "string" => FieldKind::Str,
            other => {
                tracing::debug!(field_type = other, "unknown field type, leaving zeroed");
                FieldKind::Opaque
            }
        }
    }
}

/// How a field's runtime value is produced, first match wins.
#[derive(Debug, Clone)]
pub enum FieldSource {
    /// `<<VPN_DATA>>`: the (obfuscated) payload
    Payload,
    /// Monotonic per-connection counter
    Sequence(SequenceSpec),
    /// Checksum over a byte window, written in a second pass
    Computed(Computation),
    /// Fresh uniform random of the field width
    Random,
    /// Literal or templated catalogue value
    Literal(Option<Value>),
}

/// One bitfield sub-field.
#[derive(Debug, Clone)]
pub struct BitSpec {
    /// Sub-field name
    pub name: String,
    /// Bit position relative to the field offset
    pub position: usize,
    /// Width in bits
    pub size: usize,
    /// Default when the field value carries no override map
    pub default: Option<Value>,
}

/// Sequence counter specification.
#[derive(Debug, Clone)]
pub struct SequenceSpec {
    /// Initial value
    pub start: Option<Value>,
    /// Step; when absent the counter never advances
    pub increment: Option<Value>,
    /// Update rule
    pub algorithm: SeqAlgorithm,
}

/// Sequence update rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqAlgorithm {
    /// `current += increment`
    Linear,
    /// `current += 1` (the catalogue spelling `"fibonacci"` maps here)
    IncrementOne,
}

/// A pre-compiled checksum computation.
#[derive(Debug, Clone)]
pub struct Computation {
    /// Resolved algorithm
    pub kind: ChecksumKind,
    /// Byte window over `header || payload`
    pub scope: Scope,
}

/// Resolved checksum algorithm with parameters folded in.
#[derive(Debug, Clone)]
pub enum ChecksumKind {
    /// RFC 1071 Internet checksum; the constant pseudo-header
    /// contribution is pre-folded at load time.
    Internet {
        /// Sum of the pseudo-header 16-bit words
        pseudo_sum: u64,
    },
    /// Bit-reversed (LSB-first) CRC
    Crc {
        /// Result width in bits (0 for unrecognised variants)
        width: u32,
        /// Polynomial in reflected form
        poly: u64,
        /// Initial register value
        init: u64,
        /// Final XOR
        xor_out: u64,
    },
    /// XOR of n-bit big-endian words
    Xor {
        /// Word width in bits
        width: u32,
    },
    /// Running sum of n-bit big-endian words
    Sum {
        /// Word width in bits
        width: u32,
    },
    /// Polynomial rolling hash (`h = h*31 + b`, 32-bit)
    Rolling,
    /// Formula selected by `params["formula"]`
    Custom(CustomFormula),
}

/// Custom checksum formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomFormula {
    /// `~sum16 + 1`
    TwoComplement,
    /// `sum32 % 255`
    Modulo255,
    /// Fletcher-16
    Fletcher16,
    /// Adler-32
    Adler32,
    /// Unrecognised formula name: falls back to sum16
    SumFallback,
    /// No formula parameter: yields zero
    Zero,
}

/// Pre-compiled computation scope over `header || payload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `[0, header_len)`
    Header,
    /// `[header_len, header_len + payload_len)`
    Payload,
    /// `[0, header_len + payload_len)`
    All,
    /// Explicit `A:B` window; `end == None` defaults to the header
    /// length, negative ends count back from the total length.
    Range {
        /// Window start
        start: i64,
        /// Window end, `None` when unparseable
        end: Option<i64>,
    },
}

impl Scope {
    /// Parse the catalogue scope grammar. Unparseable forms default to
    /// the header window.
    pub fn parse(scope: &str) -> Scope {
        match scope {
            "" | "header" => Scope::Header,
            "payload" | "data" => Scope::Payload,
            "all" => Scope::All,
            other => {
                let parts: Vec<&str> = other.split(':').collect();
                if parts.len() == 2 {
                    Scope::Range {
                        start: parts[0].parse().unwrap_or(0),
                        end: parts[1].parse().ok(),
                    }
                } else {
                    Scope::Header
                }
            }
        }
    }

    /// Resolve to a concrete `[start, end)` window over the
    /// concatenation. Degenerate windows resolve to `None` and the
    /// computation yields numeric zero.
    pub fn resolve(&self, header_len: usize, payload_len: usize) -> Option<(usize, usize)> {
        let total = header_len + payload_len;
        let (start, end) = match self {
            Scope::Header => (0i64, header_len as i64),
            Scope::Payload => (header_len as i64, total as i64),
            Scope::All => (0, total as i64),
            Scope::Range { start, end } => {
                let mut e = end.unwrap_or(header_len as i64);
                if e < 0 {
                    e += total as i64;
                }
                (*start, e)
            }
        };
        if start < 0 || start >= end || end > total as i64 {
            return None;
        }
        Some((start as usize, end as usize))
    }
}

/// Text-oriented frame: items rendered in order, then `line_ending`.
#[derive(Debug, Clone)]
pub struct FrameStructure {
    /// Terminator appended once when non-empty
    pub line_ending: String,
    /// Items in render order
    pub items: Vec<FrameItem>,
}

/// One frame item.
#[derive(Debug, Clone)]
pub enum FrameItem {
    /// The (obfuscated) payload
    Payload,
    /// Templated text
    Text(String),
    /// Header map rendered as `Name: Value\r\n` lines
    Headers(Vec<(String, String)>),
}

/// Protocol rotation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    /// Uniform pick per chunk
    #[default]
    Random,
    /// Shared atomic counter, increment-then-modulo
    RoundRobin,
    /// Unix-seconds bucket
    TimeBased,
}

impl RotationPolicy {
    fn parse(tag: &str) -> RotationPolicy {
        match tag {
            "round_robin" => RotationPolicy::RoundRobin,
            "time_based" => RotationPolicy::TimeBased,
            _ => RotationPolicy::Random,
        }
    }
}

/// Payload obfuscation transforms selectable from the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObfuscationMode {
    /// Pass-through (default)
    #[default]
    None,
    /// Repeating-key XOR with the configured key
    Xor,
}

/// Runtime options from the catalogue's `tunnel` table.
#[derive(Debug, Clone)]
pub struct TunnelOptions {
    /// Entry selection policy
    pub rotation: RotationPolicy,
    /// Bucket width in seconds for `time_based`
    pub rotation_interval: u64,
    /// Payload transform
    pub obfuscation: ObfuscationMode,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            rotation: RotationPolicy::Random,
            rotation_interval: crate::DEFAULT_ROTATION_INTERVAL_SECS,
            obfuscation: ObfuscationMode::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Schema → model conversion
// ---------------------------------------------------------------------------

impl ProtocolEntry {
    pub(super) fn from_schema(schema: schema::ProtocolSchema) -> Result<Self, String> {
        let body = if let Some(stack) = schema.layer_stack {
            EntryBody::Layers(LayerStack::from_schema(stack))
        } else if let Some(frame) = schema.frame_structure {
            match frame.request_format {
                Some(format) => EntryBody::Frame(FrameStructure::from_schema(
                    frame.line_ending,
                    &format,
                )),
                None => {
                    return Err(format!(
                        "protocol '{}' has neither layer_stack nor request_format",
                        schema.identifier
                    ))
                }
            }
        } else {
            return Err(format!(
                "protocol '{}' has neither layer_stack nor frame_structure",
                schema.identifier
            ));
        };

        Ok(ProtocolEntry {
            identifier: schema.identifier,
            transport: schema.transport,
            body,
        })
    }
}

impl LayerStack {
    fn from_schema(schema: schema::LayerStackSchema) -> Self {
        let roles = [
            (LayerRole::L2Ethernet, schema.layer2_ethernet),
            (LayerRole::L3Ipv4, schema.layer3_ipv4),
            (LayerRole::L3Ipv6, schema.layer3_ipv6),
            (LayerRole::L4, schema.layer4),
            (LayerRole::L5, schema.layer5),
            (LayerRole::L6, schema.layer6),
            (LayerRole::L7, schema.layer7),
        ];

        let layers = roles
            .into_iter()
            .filter_map(|(role, def)| def.map(|d| Layer::from_schema(role, d)))
            .collect();

        LayerStack { layers }
    }
}

impl Layer {
    fn from_schema(role: LayerRole, schema: schema::LayerSchema) -> Self {
        let fields: Vec<Field> = schema.fields.into_iter().map(Field::from_schema).collect();
        let buffer_size = fields
            .iter()
            .map(|f| f.offset + f.size)
            .max()
            .unwrap_or(0)
            .max(schema.header_size);

        Layer {
            role,
            header_size: schema.header_size,
            buffer_size,
            fields,
            chunks: schema.chunks.into_iter().map(Chunk::from_schema).collect(),
        }
    }
}

impl Chunk {
    fn from_schema(schema: schema::ChunkSchema) -> Self {
        let fields: Vec<Field> = schema.fields.into_iter().map(Field::from_schema).collect();
        let buffer_size = fields.iter().map(|f| f.offset + f.size).max().unwrap_or(0);

        Chunk {
            name: schema.name,
            buffer_size,
            fields,
        }
    }
}

impl Field {
    fn from_schema(schema: schema::FieldSchema) -> Self {
        let value = schema.value.as_ref().map(Value::from_json);

        let is_payload = matches!(&value, Some(Value::Str(s)) if s == VPN_DATA_SENTINEL);

        let source = if is_payload {
            FieldSource::Payload
        } else if let Some(seq) = schema.sequence {
            FieldSource::Sequence(SequenceSpec::from_schema(seq))
        } else if let Some(comp) = schema.computation {
            FieldSource::Computed(Computation::from_schema(comp))
        } else if schema.randomize {
            FieldSource::Random
        } else {
            FieldSource::Literal(value)
        };

        let bits = schema
            .bits
            .map(|map| {
                map.into_iter()
                    .filter_map(|(name, raw)| {
                        let spec: schema::BitSchema = serde_json::from_value(raw).ok()?;
                        Some(BitSpec {
                            name,
                            position: spec.position,
                            size: spec.size,
                            default: spec.value.as_ref().map(Value::from_json),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Field {
            name: schema.name,
            offset: schema.offset,
            size: schema.size,
            kind: FieldKind::parse(&schema.field_type),
            bits,
            source,
        }
    }
}

impl SequenceSpec {
    fn from_schema(schema: schema::SequenceSchema) -> Self {
        let algorithm = match schema.algorithm.as_deref() {
            Some("fibonacci") => SeqAlgorithm::IncrementOne,
            _ => SeqAlgorithm::Linear,
        };
        SequenceSpec {
            start: schema.start.as_ref().map(Value::from_json),
            increment: schema.increment.as_ref().map(Value::from_json),
            algorithm,
        }
    }
}

impl Computation {
    fn from_schema(schema: schema::ComputationSchema) -> Self {
        let params: BTreeMap<String, Value> = schema
            .pseudo_header
            .map(|m| {
                m.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect()
            })
            .unwrap_or_default();

        Computation {
            kind: ChecksumKind::resolve(&schema.algorithm, &params),
            scope: Scope::parse(&schema.scope),
        }
    }
}

impl ChecksumKind {
    /// Resolve an algorithm name plus parameter map into a concrete
    /// algorithm. Names outside the known set dispatch by substring;
    /// anything unrecognisable becomes the Internet checksum.
    pub fn resolve(algorithm: &str, params: &BTreeMap<String, Value>) -> ChecksumKind {
        match algorithm {
            "checksum" | "checksum_ip" | "checksum_tcp" | "checksum_udp" | "checksum_icmp" => {
                ChecksumKind::internet(params)
            }
            "crc8" => ChecksumKind::crc(8, 0x07, 0, 0, params),
            // Reflected form of the nominal 0x8005 polynomial, so the
            // LSB-first engine yields CRC-16/ARC.
            "crc16" => ChecksumKind::crc(16, 0xA001, 0, 0, params),
            "crc32" => ChecksumKind::crc(32, 0xEDB8_8320, 0xFFFF_FFFF, 0xFFFF_FFFF, params),
            "crc64" => ChecksumKind::crc(64, 0x42F0_E1EB_A9EA_3693, 0, 0, params),
            "xor" | "xor8" => ChecksumKind::Xor { width: 8 },
            "xor16" => ChecksumKind::Xor { width: 16 },
            "xor32" => ChecksumKind::Xor { width: 32 },
            "sum" | "sum8" => ChecksumKind::Sum { width: 8 },
            "sum16" => ChecksumKind::Sum { width: 16 },
            "sum32" => ChecksumKind::Sum { width: 32 },
            "hash" | "md5" | "sha1" | "sha256" => ChecksumKind::Rolling,
            "custom" => ChecksumKind::Custom(CustomFormula::from_params(params)),
            other => {
                if other.contains("crc") {
                    ChecksumKind::crc(0, 0, 0, 0, params)
                } else if other.contains("checksum") || other.contains("sum") {
                    ChecksumKind::internet(params)
                } else if other.contains("xor") {
                    ChecksumKind::Xor { width: 0 }
                } else if other.contains("hash") {
                    ChecksumKind::Rolling
                } else {
                    ChecksumKind::internet(params)
                }
            }
        }
    }

    fn internet(params: &BTreeMap<String, Value>) -> ChecksumKind {
        ChecksumKind::Internet {
            pseudo_sum: pseudo_header_sum(params),
        }
    }

    fn crc(
        width: u32,
        poly: u64,
        init: u64,
        xor_out: u64,
        params: &BTreeMap<String, Value>,
    ) -> ChecksumKind {
        let over = |key: &str, default: u64| {
            params
                .get(key)
                .and_then(parse_u64_any)
                .unwrap_or(default)
        };
        ChecksumKind::Crc {
            width,
            poly: over("polynomial", poly),
            init: over("init", init),
            xor_out: over("xor_out", xor_out),
        }
    }
}

impl CustomFormula {
    fn from_params(params: &BTreeMap<String, Value>) -> CustomFormula {
        match params.get("formula").and_then(Value::as_str) {
            Some("two_complement") => CustomFormula::TwoComplement,
            Some("modulo_255") => CustomFormula::Modulo255,
            Some("fletcher16") => CustomFormula::Fletcher16,
            Some("adler32") => CustomFormula::Adler32,
            Some(_) => CustomFormula::SumFallback,
            None => CustomFormula::Zero,
        }
    }
}

/// Fold the constant pseudo-header entries into a partial Internet
/// checksum sum: IPs 16 bits at a time, everything else coerced to u16
/// and skipped when zero or uncoercible.
fn pseudo_header_sum(params: &BTreeMap<String, Value>) -> u64 {
    let mut sum: u64 = 0;
    for (key, value) in params {
        match key.as_str() {
            "source_ip" | "dest_ip" => {
                let Some(text) = value.as_str() else { continue };
                let Ok(addr) = text.parse::<IpAddr>() else {
                    continue;
                };
                let octets: Vec<u8> = match addr {
                    IpAddr::V4(a) => a.octets().to_vec(),
                    IpAddr::V6(a) => a.octets().to_vec(),
                };
                for pair in octets.chunks(2) {
                    sum += (pair[0] as u64) << 8;
                    if let Some(lo) = pair.get(1) {
                        sum += *lo as u64;
                    }
                }
            }
            _ => {
                // protocol, length, next_header and any other numeric key
                if let Some(word) = value.to_u16() {
                    if word != 0 {
                        sum += word as u64;
                    }
                }
            }
        }
    }
    sum
}

impl FrameStructure {
    fn from_schema(line_ending: String, format: &serde_json::Value) -> Self {
        let mut items = Vec::new();
        match format {
            serde_json::Value::Array(list) => {
                for item in list {
                    if let Some(parsed) = FrameItem::from_json(item) {
                        items.push(parsed);
                    }
                }
            }
            serde_json::Value::Object(map) => {
                // Legacy map form: iteration order is not part of the
                // contract; catalogues that need stable order use the
                // list form.
                for item in map.values() {
                    if let Some(parsed) = FrameItem::from_json(item) {
                        items.push(parsed);
                    }
                }
            }
            _ => {}
        }
        FrameStructure { line_ending, items }
    }
}

impl FrameItem {
    fn from_json(item: &serde_json::Value) -> Option<FrameItem> {
        match item {
            serde_json::Value::String(s) if s == VPN_DATA_SENTINEL => Some(FrameItem::Payload),
            serde_json::Value::String(s) => Some(FrameItem::Text(s.clone())),
            serde_json::Value::Object(map) => {
                let headers: Vec<(String, String)> = map
                    .iter()
                    .filter_map(|(name, v)| {
                        v.as_str().map(|s| (name.clone(), s.to_string()))
                    })
                    .collect();
                Some(FrameItem::Headers(headers))
            }
            _ => None,
        }
    }
}

impl TunnelOptions {
    pub(super) fn from_schema(schema: schema::TunnelSchema) -> Self {
        let rotation = schema
            .protocol_rotation
            .as_deref()
            .map(RotationPolicy::parse)
            .unwrap_or_default();
        let rotation_interval = schema
            .rotation_interval
            .filter(|i| *i > 0)
            .map(|i| i as u64)
            .unwrap_or(crate::DEFAULT_ROTATION_INTERVAL_SECS);
        let obfuscation = match schema.payload_obfuscation.as_deref() {
            Some("xor") => ObfuscationMode::Xor,
            _ => ObfuscationMode::None,
        };
        TunnelOptions {
            rotation,
            rotation_interval,
            obfuscation,
        }
    }
}
