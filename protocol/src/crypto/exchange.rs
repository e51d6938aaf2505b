//! # Channel Keys and Key Wrapping
//!
//! A channel has one symmetric key shared by every participant. The key is
//! generated client-side by the channel creator and delivered to each
//! invitee *wrapped*: encrypted under the pairwise X25519 shared secret
//! between creator and invitee. The server stores the wrapped blob inside
//! the invitation and can never open it.
//!
//! ## Flow
//!
//! 1. Creator generates a fresh 256-bit channel key.
//! 2. For each invitee: `shared = DH(creator_secret, invitee_public)`,
//!    then `wrap_channel_key(shared, channel_key)`.
//! 3. The invitee later computes the same shared secret from their side,
//!    `DH(invitee_secret, creator_public)`, and unwraps.
//!
//! Both the wrapped bytes and the nonce travel as base64 text inside the
//! invitation record, opaque to everything server-side.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::encoding::{from_base64, to_base64};
use super::{encryption, CryptoError};
use crate::config::AES_KEY_LENGTH;

/// A channel key encrypted under a pairwise shared secret.
///
/// Exactly one recipient holds the other half of the Diffie-Hellman
/// exchange and can unwrap it. Serialized into invitation records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedChannelKey {
    /// Base64 ciphertext of the channel key, GCM tag embedded.
    pub wrapped: String,
    /// Base64 96-bit nonce used for the wrap.
    pub nonce: String,
}

/// Generate a fresh 256-bit channel key from the OS CSPRNG.
pub fn generate_channel_key() -> [u8; AES_KEY_LENGTH] {
    let mut key = [0u8; AES_KEY_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// Wrap a channel key under a recipient-specific shared secret.
pub fn wrap_channel_key(
    shared_secret: &[u8; AES_KEY_LENGTH],
    channel_key: &[u8; AES_KEY_LENGTH],
) -> Result<WrappedChannelKey, CryptoError> {
    let (nonce, wrapped) = encryption::encrypt(shared_secret, channel_key)?;
    Ok(WrappedChannelKey {
        wrapped: to_base64(&wrapped),
        nonce: to_base64(&nonce),
    })
}

/// Unwrap a channel key with the same pairwise shared secret.
///
/// The inverse of [`wrap_channel_key`]. A wrong secret, a tampered blob,
/// or a wrapped payload that isn't exactly 32 bytes all collapse to the
/// opaque [`CryptoError`].
pub fn unwrap_channel_key(
    shared_secret: &[u8; AES_KEY_LENGTH],
    wrapped: &WrappedChannelKey,
) -> Result<[u8; AES_KEY_LENGTH], CryptoError> {
    let nonce = from_base64(&wrapped.nonce)?;
    let ciphertext = from_base64(&wrapped.wrapped)?;
    let plaintext = encryption::decrypt(shared_secret, &nonce, &ciphertext)?;
    plaintext.try_into().map_err(|_| CryptoError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::AgentKeypair;

    #[test]
    fn channel_keys_are_fresh() {
        assert_ne!(generate_channel_key(), generate_channel_key());
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let shared = [0x42u8; 32];
        let channel_key = generate_channel_key();
        let wrapped = wrap_channel_key(&shared, &channel_key).unwrap();
        let recovered = unwrap_channel_key(&shared, &wrapped).unwrap();
        assert_eq!(recovered, channel_key);
    }

    #[test]
    fn wrap_unwrap_across_pairwise_exchange() {
        // The real flow: creator wraps with DH(creator, invitee), invitee
        // unwraps with DH(invitee, creator).
        let creator = AgentKeypair::generate();
        let invitee = AgentKeypair::generate();
        let channel_key = generate_channel_key();

        let creator_side = creator.shared_secret(&invitee.public_key()).unwrap();
        let wrapped = wrap_channel_key(&creator_side, &channel_key).unwrap();

        let invitee_side = invitee.shared_secret(&creator.public_key()).unwrap();
        let recovered = unwrap_channel_key(&invitee_side, &wrapped).unwrap();
        assert_eq!(recovered, channel_key);
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() {
        let creator = AgentKeypair::generate();
        let invitee = AgentKeypair::generate();
        let outsider = AgentKeypair::generate();
        let channel_key = generate_channel_key();

        let shared = creator.shared_secret(&invitee.public_key()).unwrap();
        let wrapped = wrap_channel_key(&shared, &channel_key).unwrap();

        let outsider_guess = outsider.shared_secret(&creator.public_key()).unwrap();
        assert!(unwrap_channel_key(&outsider_guess, &wrapped).is_err());
    }

    #[test]
    fn tampered_blob_fails_opaquely() {
        let shared = [0x42u8; 32];
        let mut wrapped = wrap_channel_key(&shared, &generate_channel_key()).unwrap();
        wrapped.wrapped = to_base64(b"definitely not the original blob!");
        assert_eq!(unwrap_channel_key(&shared, &wrapped).unwrap_err(), CryptoError);
    }

    #[test]
    fn wrapped_key_serde_uses_camel_case() {
        let shared = [1u8; 32];
        let wrapped = wrap_channel_key(&shared, &generate_channel_key()).unwrap();
        let json = serde_json::to_value(&wrapped).unwrap();
        assert!(json.get("wrapped").is_some());
        assert!(json.get("nonce").is_some());
    }
}
