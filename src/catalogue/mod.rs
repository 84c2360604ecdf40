//! Protocol pattern catalogue.
//!
//! The catalogue is the declarative program driving the fabrication
//! engine: a sequence of protocol entries, each describing one cover
//! frame either as a stack of binary layers or as a text frame. It is
//! loaded once at startup, validated into a pre-resolved model, and
//! shared read-only by every connection.

mod model;
mod schema;
mod value;

pub use model::{
    BitSpec, ChecksumKind, Chunk, Computation, CustomFormula, EngineInfo, EntryBody, Field,
    FieldKind, FieldSource, FrameItem, FrameStructure, Layer, LayerRole, LayerStack,
    ObfuscationMode, ProtocolEntry, RotationPolicy, Scope, SeqAlgorithm, SequenceSpec,
    TunnelOptions, VPN_DATA_SENTINEL,
};
pub use value::{parse_u64_any, Value};

use crate::error::{Error, Result};

/// The validated, immutable protocol catalogue.
#[derive(Debug, Clone)]
pub struct Catalogue {
    /// Engine metadata, informational
    pub engine: EngineInfo,
    /// Protocol entries in file order
    pub entries: Vec<ProtocolEntry>,
    /// Tunnel runtime options
    pub options: TunnelOptions,
}

impl Catalogue {
    /// Load a catalogue from raw JSON bytes.
    ///
    /// Fails on malformed JSON, on entries with neither frame shape and
    /// on an empty protocol list; all of these are startup-fatal.
    pub fn from_json_slice(data: &[u8]) -> Result<Catalogue> {
        let file: schema::CatalogueFile = serde_json::from_slice(data)?;
        Self::from_schema(file)
    }

    fn from_schema(file: schema::CatalogueFile) -> Result<Catalogue> {
        if file.protocols.is_empty() {
            return Err(Error::CatalogueEmpty);
        }

        let entries = file
            .protocols
            .into_iter()
            .map(ProtocolEntry::from_schema)
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(Error::CatalogueInvalid)?;

        Ok(Catalogue {
            engine: EngineInfo {
                name: file.protocol_engine.name,
                version: file.protocol_engine.version,
            },
            entries,
            options: TunnelOptions::from_schema(file.tunnel),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "protocol_engine": {"name": "llm", "version": "3.2"},
        "protocols": [
            {
                "identifier": "http_get",
                "transport": "tcp",
                "frame_structure": {
                    "line_ending": "",
                    "request_format": [
                        "GET / HTTP/1.1\r\n",
                        {"Host": "example.com"},
                        "\r\n",
                        "<<VPN_DATA>>"
                    ]
                }
            },
            {
                "identifier": "dns_query",
                "transport": "udp",
                "layer_stack": {
                    "layer4": {
                        "header_size": 8,
                        "fields": [
                            {"name": "src_port", "offset": 0, "size": 2,
                             "type": "uint16_be", "randomize": true},
                            {"name": "dst_port", "offset": 2, "size": 2,
                             "type": "uint16_be", "value": 53}
                        ]
                    },
                    "layer7": {
                        "header_size": 12,
                        "fields": [
                            {"name": "txid", "offset": 0, "size": 2,
                             "type": "uint16_be",
                             "sequence": {"start": 1, "increment": 1}}
                        ]
                    }
                }
            }
        ],
        "tunnel": {
            "protocol_rotation": "round_robin",
            "rotation_interval": 30
        }
    }"#;

    #[test]
    fn test_load_sample() {
        let cat = Catalogue::from_json_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(cat.engine.name, "llm");
        assert_eq!(cat.entries.len(), 2);
        assert_eq!(cat.options.rotation, RotationPolicy::RoundRobin);
        assert_eq!(cat.options.rotation_interval, 30);
        assert_eq!(cat.options.obfuscation, ObfuscationMode::None);

        assert!(matches!(cat.entries[0].body, EntryBody::Frame(_)));
        match &cat.entries[1].body {
            EntryBody::Layers(stack) => {
                assert_eq!(stack.layers.len(), 2);
                assert_eq!(stack.unwrap_header_size(), 20);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_empty_catalogue_rejected() {
        let err = Catalogue::from_json_slice(br#"{"protocols": []}"#).unwrap_err();
        assert!(matches!(err, Error::CatalogueEmpty));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = Catalogue::from_json_slice(b"{not json").unwrap_err();
        assert!(matches!(err, Error::CatalogueParse(_)));
    }

    #[test]
    fn test_shapeless_entry_rejected() {
        let err = Catalogue::from_json_slice(
            br#"{"protocols": [{"identifier": "nothing"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CatalogueInvalid(_)));
    }
}
