//! SHA-256 with the two output encodings the layer needs: lowercase hex
//! for DID derivation, base64 for content digests. Input is bytes; UTF-8
//! strings hash as their byte representation.

use sha2::{Digest, Sha256};

use super::encoding::to_base64;

/// SHA-256 digest as a fixed 32-byte array.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 digest as 64 lowercase hex characters.
///
/// The first 32 of these form a DID's method-specific identifier.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_bytes(data))
}

/// SHA-256 digest as base64 text.
pub fn sha256_base64(data: &[u8]) -> String {
    to_base64(&sha256_bytes(data))
}
