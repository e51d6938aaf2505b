//! # AES-256-GCM Authenticated Encryption
//!
//! The single symmetric primitive of the privacy layer. Used client-side
//! for message payloads and on both sides of the invitation flow for
//! channel-key wrapping.
//!
//! ## Wire format
//!
//! The nonce travels *detached* from the ciphertext: message envelopes and
//! wrapped-key blobs carry `nonce` and `ciphertext` as separate fields, so
//! [`encrypt`] returns `(nonce, ciphertext)` and [`decrypt`] takes them
//! separately. The 16-byte GCM tag is embedded at the end of the
//! ciphertext, per the AEAD standard.
//!
//! ## Nonce management
//!
//! GCM is unforgiving about nonce reuse, so nonces are always 96 random
//! bits from the OS CSPRNG, fresh per call. The birthday bound at 96 bits
//! is ~2^48 messages per key; channels with coarse key rotation configured
//! stay far under it.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use super::CryptoError;
use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Encrypt plaintext under a 256-bit key with a fresh random nonce.
///
/// Returns `(nonce, ciphertext)`. The ciphertext includes the 16-byte
/// authentication tag.
pub fn encrypt(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
) -> Result<([u8; AES_NONCE_LENGTH], Vec<u8>), CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| CryptoError)?;
    Ok((nonce_bytes, ciphertext))
}

/// Decrypt a detached `(nonce, ciphertext)` pair.
///
/// Fails on a wrong key, a modified ciphertext, a truncated tag, or a
/// nonce of the wrong width. All of those are the same [`CryptoError`];
/// which one happened is none of the caller's business.
pub fn decrypt(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != AES_NONCE_LENGTH {
        return Err(CryptoError);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AES_TAG_LENGTH;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"the quick brown fox jumps over the lazy dog";
        let (nonce, ciphertext) = encrypt(&key, plaintext).unwrap();
        let recovered = decrypt(&key, &nonce, &ciphertext).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn empty_plaintext_is_valid() {
        // Encrypting nothing yields just the auth tag.
        let key = test_key();
        let (nonce, ciphertext) = encrypt(&key, b"").unwrap();
        assert_eq!(ciphertext.len(), AES_TAG_LENGTH);
        assert!(decrypt(&key, &nonce, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn wrong_key_fails() {
        let key = test_key();
        let (nonce, ciphertext) = encrypt(&key, b"secret").unwrap();
        let mut wrong = test_key();
        wrong[0] ^= 0xFF;
        assert!(decrypt(&wrong, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn modified_ciphertext_fails() {
        let key = test_key();
        let (nonce, mut ciphertext) = encrypt(&key, b"secret").unwrap();
        ciphertext[0] ^= 0xFF;
        assert!(decrypt(&key, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn wrong_nonce_fails() {
        let key = test_key();
        let (mut nonce, ciphertext) = encrypt(&key, b"secret").unwrap();
        nonce[0] ^= 0xFF;
        assert!(decrypt(&key, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn malformed_nonce_width_fails() {
        let key = test_key();
        let (_, ciphertext) = encrypt(&key, b"secret").unwrap();
        assert!(decrypt(&key, &[0u8; 8], &ciphertext).is_err());
    }

    #[test]
    fn nonces_are_unique_per_call() {
        let key = test_key();
        let (n1, _) = encrypt(&key, b"message").unwrap();
        let (n2, _) = encrypt(&key, b"message").unwrap();
        assert_ne!(n1, n2);
    }

    #[test]
    fn ciphertext_length_is_plaintext_plus_tag() {
        let key = test_key();
        let plaintext = b"exactly 26 bytes of input!";
        let (_, ciphertext) = encrypt(&key, plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + AES_TAG_LENGTH);
    }
}
