//! # Agent Key Material
//!
//! Every agent holds two long-term keypairs:
//!
//! 1. An **X25519** keypair for pairwise key agreement. Its public half is
//!    what the DID is derived from and what peers use to wrap channel keys.
//! 2. An **Ed25519** keypair for signing registration requests. Kept
//!    separate from the agreement keypair; the two roles never share key
//!    material.
//!
//! Public halves travel as base64 text. Secret halves never leave the
//! client process: [`AgentKeypair`] deliberately does NOT implement
//! `Serialize`/`Deserialize`. Exporting secrets is an explicit act via
//! `to_bytes()`, not something that happens because a keypair ended up in
//! a JSON response.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use super::encoding::{from_base64, from_base64_key, to_base64};
use super::CryptoError;

/// An agent's long-term key material: X25519 agreement + Ed25519 signing.
///
/// This is the atomic unit of identity in the privacy layer. The DID,
/// every wrapped channel key, and every registration signature trace back
/// to one of these.
pub struct AgentKeypair {
    /// X25519 static secret for pairwise Diffie-Hellman.
    agreement: StaticSecret,
    /// Ed25519 signing key for registration authentication.
    signing: SigningKey,
}

impl AgentKeypair {
    /// Generate a fresh keypair pair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            agreement: StaticSecret::random_from_rng(OsRng),
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstruct from raw secret material (32 bytes each).
    ///
    /// Used by the client credential store to restore an identity across
    /// restarts. The public halves are re-derived for consistency.
    pub fn from_bytes(agreement_secret: &[u8; 32], signing_secret: &[u8; 32]) -> Self {
        Self {
            agreement: StaticSecret::from(*agreement_secret),
            signing: SigningKey::from_bytes(signing_secret),
        }
    }

    /// The X25519 key-agreement public key, base64-encoded.
    ///
    /// This is the key the DID is derived from and the key peers use to
    /// wrap channel keys for this agent.
    pub fn public_key(&self) -> String {
        to_base64(X25519PublicKey::from(&self.agreement).as_bytes())
    }

    /// The Ed25519 signing public key, base64-encoded.
    pub fn signing_key(&self) -> String {
        to_base64(self.signing.verifying_key().as_bytes())
    }

    /// Sign a message; returns the 64-byte Ed25519 signature as base64.
    ///
    /// Ed25519 signatures are deterministic for a given (key, message)
    /// pair, so no RNG is involved at signing time.
    pub fn sign(&self, message: &[u8]) -> String {
        to_base64(&self.signing.sign(message).to_bytes())
    }

    /// Derive the pairwise shared secret with another agent.
    ///
    /// X25519 static-static Diffie-Hellman between this keypair's
    /// agreement secret and the peer's base64 agreement public key. Both
    /// sides derive the same 32 bytes, which are used directly as the
    /// AES-256-GCM key for channel-key wrapping.
    pub fn shared_secret(&self, their_public: &str) -> Result<[u8; 32], CryptoError> {
        let peer = X25519PublicKey::from(from_base64_key(their_public)?);
        Ok(self.agreement.diffie_hellman(&peer).to_bytes())
    }

    /// Export the raw secret material as `(agreement, signing)` bytes.
    ///
    /// **Handle with extreme care.** Don't log it, don't send it over the
    /// network, don't store it unencrypted outside the credential store.
    pub fn to_bytes(&self) -> ([u8; 32], [u8; 32]) {
        (self.agreement.to_bytes(), self.signing.to_bytes())
    }
}

impl Clone for AgentKeypair {
    fn clone(&self) -> Self {
        let (agreement, signing) = self.to_bytes();
        Self::from_bytes(&agreement, &signing)
    }
}

impl fmt::Debug for AgentKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secret material never appears in debug output. Not even partially.
        write!(f, "AgentKeypair(pub={})", self.public_key())
    }
}

impl PartialEq for AgentKeypair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key() && self.signing_key() == other.signing_key()
    }
}

impl Eq for AgentKeypair {}

/// Verify an Ed25519 signature, all inputs base64 text as they arrive
/// off the wire.
///
/// Returns `true` only when the key parses, the signature parses, and the
/// signature verifies over the message. Every failure mode is just `false`.
pub fn verify_signature(signing_key: &str, message: &[u8], signature: &str) -> bool {
    let Ok(key_bytes) = from_base64_key(signing_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = from_base64(signature) else {
        return false;
    };
    let sig_arr: [u8; 64] = match sig_bytes.as_slice().try_into() {
        Ok(arr) => arr,
        Err(_) => return false,
    };
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_arr))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_key_roles() {
        let kp = AgentKeypair::generate();
        // Agreement and signing public keys must never coincide.
        assert_ne!(kp.public_key(), kp.signing_key());
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let kp = AgentKeypair::generate();
        let msg = b"register me";
        let sig = kp.sign(msg);
        assert!(verify_signature(&kp.signing_key(), msg, &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = AgentKeypair::generate();
        let sig = kp.sign(b"correct");
        assert!(!verify_signature(&kp.signing_key(), b"tampered", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = AgentKeypair::generate();
        let kp2 = AgentKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!verify_signature(&kp2.signing_key(), b"message", &sig));
    }

    #[test]
    fn malformed_inputs_verify_false_without_panicking() {
        let kp = AgentKeypair::generate();
        let sig = kp.sign(b"x");
        assert!(!verify_signature("not base64", b"x", &sig));
        assert!(!verify_signature(&kp.signing_key(), b"x", "also not base64"));
        assert!(!verify_signature(&kp.signing_key(), b"x", ""));
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let alice = AgentKeypair::generate();
        let bob = AgentKeypair::generate();
        let a = alice.shared_secret(&bob.public_key()).unwrap();
        let b = bob.shared_secret(&alice.public_key()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shared_secret_differs_per_peer() {
        let alice = AgentKeypair::generate();
        let bob = AgentKeypair::generate();
        let carol = AgentKeypair::generate();
        let ab = alice.shared_secret(&bob.public_key()).unwrap();
        let ac = alice.shared_secret(&carol.public_key()).unwrap();
        assert_ne!(ab, ac);
    }

    #[test]
    fn shared_secret_rejects_malformed_public_key() {
        let alice = AgentKeypair::generate();
        assert_eq!(alice.shared_secret("short").unwrap_err(), CryptoError);
    }

    #[test]
    fn roundtrip_bytes() {
        let kp = AgentKeypair::generate();
        let (agreement, signing) = kp.to_bytes();
        let restored = AgentKeypair::from_bytes(&agreement, &signing);
        assert_eq!(kp, restored);
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let kp = AgentKeypair::generate();
        let debug = format!("{:?}", kp);
        let (agreement, signing) = kp.to_bytes();
        assert!(!debug.contains(&to_base64(&agreement)));
        assert!(!debug.contains(&to_base64(&signing)));
        assert!(debug.starts_with("AgentKeypair(pub="));
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = AgentKeypair::generate();
        assert_eq!(kp.sign(b"same input"), kp.sign(b"same input"));
    }
}
