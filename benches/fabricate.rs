//! Fabrication engine benchmarks: cost of disguising one chunk.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use camotun::catalogue::Catalogue;
use camotun::engine::{unwrap, Fabricator, SequenceState};
use camotun::obfuscate::Identity;

const CATALOGUE: &str = r#"{
    "protocols": [
        {
            "identifier": "http_post",
            "transport": "tcp",
            "frame_structure": {
                "line_ending": "",
                "request_format": [
                    "POST /api/v2/sync HTTP/1.1\r\n",
                    {"Host": "cdn.example.net"},
                    {"Content-Length": "${DATA_SIZE}"},
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
                         "type": "uint16_be", "value": 53},
                        {"name": "length", "offset": 4, "size": 2,
                         "type": "uint16_be", "value": 512},
                        {"name": "checksum", "offset": 6, "size": 2,
                         "type": "uint16_be",
                         "computation": {"algorithm": "checksum_udp", "scope": "all"}}
                    ]
                },
                "layer7": {
                    "header_size": 12,
                    "fields": [
                        {"name": "txid", "offset": 0, "size": 2, "type": "uint16_be",
                         "sequence": {"start": 1, "increment": 1}},
                        {"name": "flags", "offset": 2, "size": 2,
                         "type": "uint16_be", "value": 256},
                        {"name": "qdcount", "offset": 4, "size": 2,
                         "type": "uint16_be", "value": 1}
                    ]
                }
            }
        }
    ]
}"#;

fn bench_fabricate(c: &mut Criterion) {
    let catalogue = Catalogue::from_json_slice(CATALOGUE.as_bytes()).unwrap();
    let fabricator = Fabricator::new(Arc::new(Identity));
    let payload = vec![0x42u8; 1024];

    let mut group = c.benchmark_group("fabricate_1k_payload");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("frame_http", |b| {
        let mut seq = SequenceState::new();
        b.iter(|| {
            fabricator.build(
                black_box(&catalogue.entries[0]),
                "bench_conn",
                black_box(&payload),
                &mut seq,
            )
        })
    });

    group.bench_function("layered_dns", |b| {
        let mut seq = SequenceState::new();
        b.iter(|| {
            fabricator.build(
                black_box(&catalogue.entries[1]),
                "bench_conn",
                black_box(&payload),
                &mut seq,
            )
        })
    });

    let mut seq = SequenceState::new();
    let wire = fabricator.build(&catalogue.entries[0], "bench_conn", &payload, &mut seq);
    group.bench_function("unwrap_frame", |b| {
        b.iter(|| unwrap(black_box(&wire), &catalogue, &Identity))
    });

    group.finish();
}

criterion_group!(benches, bench_fabricate);
criterion_main!(benches);
