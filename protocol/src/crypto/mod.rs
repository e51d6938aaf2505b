//! # Cryptographic Primitives for the Privacy Layer
//!
//! Every signing operation, every hash, every wrapped key flows through
//! here. The choices are boring and well-audited:
//!
//! - **X25519** for pairwise key agreement.
//! - **Ed25519** for registration signatures, on a dedicated keypair.
//! - **AES-256-GCM** for symmetric encryption and channel-key wrapping.
//! - **SHA-256** for DID derivation and content hashing.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, go
//! read about timing attacks first and come back when the urge has passed.
//!
//! ## Error opacity
//!
//! Every failure in this module is [`CryptoError`], a unit type with no
//! cause attached. Callers never learn whether a tag mismatched, a key was
//! malformed, or base64 didn't parse. That asymmetry of information is the
//! contract.

use thiserror::Error;

pub mod encoding;
pub mod encryption;
pub mod exchange;
pub mod hash;
pub mod ids;
pub mod keys;

pub use encoding::{from_base64, to_base64};
pub use encryption::{decrypt, encrypt};
pub use exchange::{generate_channel_key, unwrap_channel_key, wrap_channel_key, WrappedChannelKey};
pub use hash::{sha256_base64, sha256_hex};
pub use ids::generate_id;
pub use keys::{verify_signature, AgentKeypair};

/// The single opaque failure signal for all cryptographic operations.
///
/// Carries no detail on purpose. Side-channel information about *which*
/// part of a cryptographic operation failed is a gift to attackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cryptographic failure")]
pub struct CryptoError;
