//! Raw serde types mirroring the catalogue JSON file.
//!
//! These structs stay as close to the on-disk shape as possible; the
//! conversion into the pre-resolved runtime model lives in
//! [`super::model`]. Unknown keys (state machines, timing analysis,
//! FPE samples) are tolerated so real-world catalogue files load
//! without modification.

use serde::Deserialize;

/// Top-level catalogue file.
#[derive(Debug, Deserialize)]
pub struct CatalogueFile {
    /// Engine metadata, informational
    #[serde(default)]
    pub protocol_engine: EngineInfoSchema,
    /// Protocol entries
    #[serde(default)]
    pub protocols: Vec<ProtocolSchema>,
    /// Tunnel runtime options
    #[serde(default)]
    pub tunnel: TunnelSchema,
}

/// `protocol_engine` block.
#[derive(Debug, Default, Deserialize)]
pub struct EngineInfoSchema {
    /// Engine name
    #[serde(default)]
    pub name: String,
    /// Engine version
    #[serde(default)]
    pub version: String,
}

/// One protocol entry as it appears on disk.
#[derive(Debug, Deserialize)]
pub struct ProtocolSchema {
    /// Unique identifier, e.g. `"http_get"`
    pub identifier: String,
    /// Transport tag, informational
    #[serde(default)]
    pub transport: String,
    /// Well-known ports, informational
    #[serde(default)]
    pub ports: Vec<String>,
    /// Layered (binary) frame description
    #[serde(default)]
    pub layer_stack: Option<LayerStackSchema>,
    /// Text-oriented frame description
    #[serde(default)]
    pub frame_structure: Option<FrameStructureSchema>,
}

/// Role-keyed layer stack.
#[derive(Debug, Default, Deserialize)]
pub struct LayerStackSchema {
    /// Ethernet layer
    #[serde(default)]
    pub layer2_ethernet: Option<LayerSchema>,
    /// IPv4 layer
    #[serde(default)]
    pub layer3_ipv4: Option<LayerSchema>,
    /// IPv6 layer
    #[serde(default)]
    pub layer3_ipv6: Option<LayerSchema>,
    /// Transport layer
    #[serde(default)]
    pub layer4: Option<LayerSchema>,
    /// Session layer
    #[serde(default)]
    pub layer5: Option<LayerSchema>,
    /// Presentation layer
    #[serde(default)]
    pub layer6: Option<LayerSchema>,
    /// Application layer
    #[serde(default)]
    pub layer7: Option<LayerSchema>,
}

/// One layer definition.
#[derive(Debug, Default, Deserialize)]
pub struct LayerSchema {
    /// Fixed header size in bytes
    #[serde(default)]
    pub header_size: usize,
    /// Fields written into the header
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    /// Named appendices after the header
    #[serde(default)]
    pub chunks: Vec<ChunkSchema>,
}

/// A named contiguous appendix.
#[derive(Debug, Deserialize)]
pub struct ChunkSchema {
    /// Chunk name
    #[serde(default)]
    pub name: String,
    /// Fields within the chunk
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// A typed slot at a fixed offset.
#[derive(Debug, Deserialize)]
pub struct FieldSchema {
    /// Field name (keys sequence state)
    #[serde(default)]
    pub name: String,
    /// Byte offset from the start of the layer/chunk
    #[serde(default)]
    pub offset: usize,
    /// Declared size in bytes
    #[serde(default)]
    pub size: usize,
    /// Type tag, e.g. `"uint16_be"`
    #[serde(default, rename = "type")]
    pub field_type: String,
    /// Literal or templated value
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Bitfield sub-field layout
    #[serde(default)]
    pub bits: Option<serde_json::Map<String, serde_json::Value>>,
    /// Checksum/hash computation request
    #[serde(default)]
    pub computation: Option<ComputationSchema>,
    /// Monotonic counter request
    #[serde(default)]
    pub sequence: Option<SequenceSchema>,
    /// Fresh random value per emission
    #[serde(default)]
    pub randomize: bool,
}

/// One bitfield sub-field.
#[derive(Debug, Deserialize)]
pub struct BitSchema {
    /// Bit position relative to the field offset
    #[serde(default)]
    pub position: usize,
    /// Width in bits
    #[serde(default)]
    pub size: usize,
    /// Default value when the field carries no override map
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// Checksum computation request.
#[derive(Debug, Deserialize)]
pub struct ComputationSchema {
    /// Algorithm name
    #[serde(default)]
    pub algorithm: String,
    /// Byte window over `header || payload`
    #[serde(default)]
    pub scope: String,
    /// Pseudo-header entries / algorithm parameters
    #[serde(default)]
    pub pseudo_header: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Sequence counter request.
#[derive(Debug, Deserialize)]
pub struct SequenceSchema {
    /// Initial value
    #[serde(default)]
    pub start: Option<serde_json::Value>,
    /// Step applied after each emission
    #[serde(default)]
    pub increment: Option<serde_json::Value>,
    /// `"linear"` (default) or `"fibonacci"` (alias of increment-one)
    #[serde(default)]
    pub algorithm: Option<String>,
}

/// Text-oriented frame description.
#[derive(Debug, Default, Deserialize)]
pub struct FrameStructureSchema {
    /// Terminator appended once after all items
    #[serde(default)]
    pub line_ending: String,
    /// Ordered list or unordered map of frame items
    #[serde(default)]
    pub request_format: Option<serde_json::Value>,
}

/// Tunnel options; everything except rotation and obfuscation settings
/// is an informational echo of the runtime flags.
#[derive(Debug, Default, Deserialize)]
pub struct TunnelSchema {
    /// `"random"`, `"round_robin"` or `"time_based"`
    #[serde(default)]
    pub protocol_rotation: Option<String>,
    /// Bucket width in seconds for `time_based`
    #[serde(default)]
    pub rotation_interval: Option<i64>,
    /// `"none"` (default) or `"xor"`
    #[serde(default)]
    pub payload_obfuscation: Option<String>,
}
