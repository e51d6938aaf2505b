//! Base64 round-trips for key and envelope material.
//!
//! All asymmetric keys, wrapped blobs, nonces, and ciphertext cross the
//! wire as standard (padded) base64 text. Both directions tolerate empty
//! input: `to_base64(&[])` is `""` and `from_base64("")` is an empty
//! vector, not an error.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::CryptoError;

/// Encode bytes as standard base64.
pub fn to_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard base64 into bytes.
///
/// Malformed input collapses to the opaque [`CryptoError`].
pub fn from_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD.decode(text).map_err(|_| CryptoError)
}

/// Decode base64 into a fixed 32-byte array.
///
/// Used for key material, where length is part of validity.
pub(crate) fn from_base64_key(text: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = from_base64(text)?;
    bytes.try_into().map_err(|_| CryptoError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = b"agent privacy layer";
        let encoded = to_base64(data);
        assert_eq!(from_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn empty_input_tolerated() {
        assert_eq!(to_base64(&[]), "");
        assert_eq!(from_base64("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn malformed_input_is_opaque_error() {
        assert_eq!(from_base64("not base64!!!").unwrap_err(), CryptoError);
    }

    #[test]
    fn key_decode_enforces_length() {
        let short = to_base64(&[0u8; 16]);
        assert!(from_base64_key(&short).is_err());
        let exact = to_base64(&[7u8; 32]);
        assert_eq!(from_base64_key(&exact).unwrap(), [7u8; 32]);
    }
}
