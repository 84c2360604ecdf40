//! Per-direction copy loops.
//!
//! Each connection runs two of these, one per direction. A loop reads
//! up to [`READ_BUFFER_SIZE`] bytes, transforms the chunk (wrap or
//! unwrap) and writes the result in a single write: one read is one
//! cover frame, no reassembly across reads.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::engine::{unwrap, SequenceState};
use crate::READ_BUFFER_SIZE;

use super::TunnelNode;

/// Wrap direction: every chunk read is disguised as one cover frame of
/// the protocol the selector picks for it. Returns (bytes read, bytes
/// written) at EOF or error.
pub(super) async fn copy_wrap(
    node: Arc<TunnelNode>,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    conn_id: String,
) -> io::Result<(u64, u64)> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut sequences = SequenceState::new();
    let (mut bytes_in, mut bytes_out) = (0u64, 0u64);

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok((bytes_in, bytes_out));
        }

        let entry = node.selector.pick(&node.catalogue.entries);
        // The protocol identifier joins the connection id so sequence
        // counters and ${CONN_ID} expansions stay per-protocol.
        let scoped_id = format!("{}_{}", conn_id, entry.identifier);
        let frame = node
            .fabricator
            .build(&entry, &scoped_id, &buf[..n], &mut sequences);

        writer.write_all(&frame).await?;
        bytes_in += n as u64;
        bytes_out += frame.len() as u64;

        tracing::debug!(
            conn = %conn_id,
            protocol = %entry.identifier,
            read = n,
            wrote = frame.len(),
            "wrapped chunk"
        );
        tracing::trace!(
            head = %hex::encode(&frame[..frame.len().min(48)]),
            "frame head"
        );
    }
}

/// Unwrap direction: recover the payload from each received frame and
/// forward it. Frames no catalogue entry claims pass through verbatim.
pub(super) async fn copy_unwrap(
    node: Arc<TunnelNode>,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    conn_id: String,
) -> io::Result<(u64, u64)> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let (mut bytes_in, mut bytes_out) = (0u64, 0u64);

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok((bytes_in, bytes_out));
        }

        let payload = unwrap(&buf[..n], &node.catalogue, &*node.obfuscator);
        bytes_in += n as u64;

        if !payload.is_empty() {
            writer.write_all(&payload).await?;
            bytes_out += payload.len() as u64;
        }

        tracing::debug!(
            conn = %conn_id,
            read = n,
            recovered = payload.len(),
            "unwrapped chunk"
        );
    }
}
