//! Protocol rotation: which cover protocol disguises the next chunk.
//!
//! The policy comes from the catalogue's tunnel options. Random is the
//! default; round-robin shares one atomic counter across every wrap
//! task; time-based buckets the wall clock so both tunnel ends drift
//! through the catalogue together without coordination.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::catalogue::{ProtocolEntry, RotationPolicy, TunnelOptions};

/// Picks one catalogue entry per outgoing chunk.
pub struct ProtocolSelector {
    policy: RotationPolicy,
    interval_secs: u64,
    counter: AtomicU64,
}

impl ProtocolSelector {
    /// Create a selector from the catalogue's tunnel options.
    pub fn new(options: &TunnelOptions) -> Self {
        Self {
            policy: options.rotation,
            interval_secs: options.rotation_interval.max(1),
            counter: AtomicU64::new(0),
        }
    }

    /// Select the entry for the next chunk. An empty entry list yields
    /// the pass-through fallback sentinel.
    pub fn pick<'a>(&self, entries: &'a [ProtocolEntry]) -> Cow<'a, ProtocolEntry> {
        if entries.is_empty() {
            return Cow::Owned(ProtocolEntry::fallback());
        }
        let n = entries.len() as u64;
        let index = match self.policy {
            RotationPolicy::Random => rand::thread_rng().gen_range(0..entries.len()),
            // Increment-then-modulo: the very first pick lands on
            // entry 1 mod N.
            RotationPolicy::RoundRobin => {
                ((self.counter.fetch_add(1, Ordering::Relaxed) + 1) % n) as usize
            }
            RotationPolicy::TimeBased => {
                let bucket = chrono::Utc::now().timestamp() as u64 / self.interval_secs;
                (bucket % n) as usize
            }
        };
        Cow::Borrowed(&entries[index])
    }
}
