//! Pluggable payload obfuscation.
//!
//! The fabrication engine passes every payload through [`Obfuscate`]
//! before embedding it in a cover frame, and the unwrap engine inverts
//! the transform on extraction. Both built-in transforms are their own
//! inverse, so wrap and unwrap stay symmetric for any configuration.
//!
//! This is byte shuffling against casual inspection, not cryptography;
//! confidentiality of the tunnelled stream is out of scope here.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::Zeroizing;

use crate::catalogue::ObfuscationMode;
use crate::FALLBACK_OBFUSCATION_KEY;

/// A reversible bytewise payload transform.
pub trait Obfuscate: Send + Sync {
    /// Forward transform applied before embedding.
    fn obfuscate(&self, data: &[u8]) -> Vec<u8>;

    /// Inverse transform applied after extraction.
    fn deobfuscate(&self, data: &[u8]) -> Vec<u8>;
}

/// Pass-through transform: wrap and unwrap both leave the payload
/// untouched.
pub struct Identity;

impl Obfuscate for Identity {
    fn obfuscate(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn deobfuscate(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }
}

/// Repeating-key XOR. Self-inverse, so the same operation serves both
/// directions. Key bytes are wiped from memory on drop.
pub struct XorPad {
    key: Zeroizing<Vec<u8>>,
}

impl XorPad {
    /// Create a pad from raw key bytes. An empty key falls back to the
    /// built-in default so the transform never degenerates to identity
    /// by accident.
    pub fn new(key: Vec<u8>) -> Self {
        let key = if key.is_empty() {
            FALLBACK_OBFUSCATION_KEY.to_vec()
        } else {
            key
        };
        Self {
            key: Zeroizing::new(key),
        }
    }

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ self.key[i % self.key.len()])
            .collect()
    }
}

impl Obfuscate for XorPad {
    fn obfuscate(&self, data: &[u8]) -> Vec<u8> {
        self.apply(data)
    }

    fn deobfuscate(&self, data: &[u8]) -> Vec<u8> {
        self.apply(data)
    }
}

/// Decode the `-fpe-key` flag value. Invalid base64 falls back to the
/// literal default key bytes.
pub fn decode_key(encoded: &str) -> Zeroizing<Vec<u8>> {
    match STANDARD.decode(encoded) {
        Ok(bytes) if !bytes.is_empty() => Zeroizing::new(bytes),
        _ => Zeroizing::new(FALLBACK_OBFUSCATION_KEY.to_vec()),
    }
}

/// Build the transform selected by the catalogue.
pub fn for_mode(mode: ObfuscationMode, key: Zeroizing<Vec<u8>>) -> Arc<dyn Obfuscate> {
    match mode {
        ObfuscationMode::None => Arc::new(Identity),
        ObfuscationMode::Xor => Arc::new(XorPad::new(key.to_vec())),
    }
}
