//! # DID Issuance, Parsing, and Resolution
//!
//! Maps agent identities to the W3C DID specification (DID Core v1.0)
//! under the `did:moltbook:` method. The method-specific identifier is the
//! first 32 lowercase hex characters of SHA-256 over the agent's
//! key-agreement public key text, so the DID is computable by anyone who
//! holds the public key and is immutable for the life of the key.
//!
//! ## DID Format
//!
//! ```text
//! did:moltbook:<32 lowercase hex>
//! ```
//!
//! ## DID Document
//!
//! The generated document follows DID Core and includes:
//!
//! - `id` — the DID string
//! - `verificationMethod` — the X25519 agreement key
//!   (`X25519KeyAgreementKey2020`) and the Ed25519 signing key
//!   (`Ed25519VerificationKey2020`), both multibase base58btc
//! - `keyAgreement` — references the X25519 method
//! - `authentication` — references the Ed25519 method

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{DID_IDENTIFIER_LENGTH, DID_METHOD};
use crate::crypto::hash::sha256_hex;

/// Context URI for the W3C DID Core specification.
const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Context URI for the X25519 key-agreement suite.
const X25519_CONTEXT: &str = "https://w3id.org/security/suites/x25519-2020/v1";

/// Context URI for the Ed25519 verification suite.
const ED25519_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";

/// Verification method type for the key-agreement key.
const KEY_AGREEMENT_KEY_TYPE: &str = "X25519KeyAgreementKey2020";

/// Verification method type for the signing key.
const AUTHENTICATION_KEY_TYPE: &str = "Ed25519VerificationKey2020";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during DID operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DidError {
    /// The DID string does not match `did:<method>:<identifier>`.
    #[error("invalid DID format: {0}")]
    InvalidFormat(String),

    /// The DID method is not "moltbook".
    #[error("unsupported DID method: expected 'moltbook', got '{0}'")]
    UnsupportedMethod(String),

    /// The identifier is not exactly 32 lowercase hex characters.
    #[error("invalid DID identifier: must be 32 lowercase hex characters")]
    InvalidIdentifier,

    /// A public key in the agent record could not be decoded for
    /// document generation.
    #[error("invalid key material in agent record")]
    InvalidKey,
}

// ---------------------------------------------------------------------------
// AgentDid
// ---------------------------------------------------------------------------

/// A validated `did:moltbook:` identifier.
///
/// The inner string is guaranteed well-formed: constructing an `AgentDid`
/// goes through either deterministic derivation ([`from_public_key`]) or
/// full validation ([`parse`]), including on serde deserialization. Code
/// holding an `AgentDid` never needs to re-validate.
///
/// [`from_public_key`]: AgentDid::from_public_key
/// [`parse`]: AgentDid::parse
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentDid(String);

impl AgentDid {
    /// Derive the DID for a key-agreement public key.
    ///
    /// `did:moltbook:` + the first 32 lowercase hex characters of
    /// SHA-256 over the public key text. Deterministic: the same key
    /// always yields the same DID.
    pub fn from_public_key(public_key: &str) -> Self {
        let digest = sha256_hex(public_key.as_bytes());
        Self(format!(
            "did:{}:{}",
            DID_METHOD,
            &digest[..DID_IDENTIFIER_LENGTH]
        ))
    }

    /// Parse and validate a DID string.
    ///
    /// Splitting on `:` must yield exactly three parts with the literal
    /// `did` prefix, the `moltbook` method, and a 32-character lowercase
    /// hex identifier. Anything else is rejected.
    pub fn parse(s: &str) -> Result<Self, DidError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "did" {
            return Err(DidError::InvalidFormat(
                "DID must have format 'did:<method>:<identifier>'".into(),
            ));
        }
        if parts[1] != DID_METHOD {
            return Err(DidError::UnsupportedMethod(parts[1].to_string()));
        }
        let identifier = parts[2];
        if identifier.len() != DID_IDENTIFIER_LENGTH
            || !identifier
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(DidError::InvalidIdentifier);
        }
        Ok(Self(s.to_string()))
    }

    /// The full DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The method-specific identifier (the 32 hex characters).
    pub fn identifier(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }
}

impl fmt::Display for AgentDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentDid {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AgentDid {
    type Error = DidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AgentDid> for String {
    fn from(did: AgentDid) -> Self {
        did.0
    }
}

impl AsRef<str> for AgentDid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// DID Document Types
// ---------------------------------------------------------------------------

/// A W3C DID Document describing an agent identity.
///
/// Purely derived from the agent record; generating it has no side
/// effects and requires no storage access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDocument {
    /// JSON-LD context URIs.
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    /// The DID string this document describes.
    pub id: String,

    /// Cryptographic keys associated with this DID.
    #[serde(rename = "verificationMethod")]
    pub verification_method: Vec<VerificationMethod>,

    /// References to verification methods usable for key agreement.
    #[serde(rename = "keyAgreement")]
    pub key_agreement: Vec<String>,

    /// References to verification methods usable for authentication.
    pub authentication: Vec<String>,

    /// When this document was generated.
    pub created: DateTime<Utc>,
}

/// A verification method entry in a DID Document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// Unique identifier for this method (DID URL fragment).
    pub id: String,

    /// The key suite type.
    #[serde(rename = "type")]
    pub type_: String,

    /// The DID that controls this verification method.
    pub controller: String,

    /// Public key material in multibase encoding (base58btc, 'z' prefix).
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

/// Multibase-encode raw key bytes with a two-byte multicodec prefix.
fn multibase(codec: [u8; 2], raw: &[u8]) -> String {
    let mut bytes = codec.to_vec();
    bytes.extend_from_slice(raw);
    format!("z{}", bs58::encode(bytes).into_string())
}

/// Build the DID Document for an agent's DID and public keys.
///
/// `public_key` and `signing_key` are the base64 texts stored in the
/// agent record. Multicodec prefixes: `0xEC 0x01` for X25519, `0xED 0x01`
/// for Ed25519.
pub fn did_document(
    did: &AgentDid,
    public_key: &str,
    signing_key: &str,
) -> Result<DidDocument, DidError> {
    let agreement_raw =
        crate::crypto::from_base64(public_key).map_err(|_| DidError::InvalidKey)?;
    let signing_raw = crate::crypto::from_base64(signing_key).map_err(|_| DidError::InvalidKey)?;

    let did_string = did.as_str().to_string();
    let agreement_id = format!("{}#key-1", did_string);
    let authentication_id = format!("{}#key-2", did_string);

    Ok(DidDocument {
        context: vec![
            DID_CONTEXT.to_string(),
            X25519_CONTEXT.to_string(),
            ED25519_CONTEXT.to_string(),
        ],
        id: did_string.clone(),
        verification_method: vec![
            VerificationMethod {
                id: agreement_id.clone(),
                type_: KEY_AGREEMENT_KEY_TYPE.to_string(),
                controller: did_string.clone(),
                public_key_multibase: multibase([0xEC, 0x01], &agreement_raw),
            },
            VerificationMethod {
                id: authentication_id.clone(),
                type_: AUTHENTICATION_KEY_TYPE.to_string(),
                controller: did_string,
                public_key_multibase: multibase([0xED, 0x01], &signing_raw),
            },
        ],
        key_agreement: vec![agreement_id],
        authentication: vec![authentication_id],
        created: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AgentKeypair;

    #[test]
    fn derivation_is_deterministic() {
        let did1 = AgentDid::from_public_key("test-public-key-base64");
        let did2 = AgentDid::from_public_key("test-public-key-base64");
        assert_eq!(did1, did2);
    }

    #[test]
    fn derived_did_matches_grammar() {
        let did = AgentDid::from_public_key("test-public-key-base64");
        let s = did.as_str();
        assert!(s.starts_with("did:moltbook:"));
        assert_eq!(did.identifier().len(), 32);
        assert!(did
            .identifier()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        // And it parses back.
        assert_eq!(AgentDid::parse(s).unwrap(), did);
    }

    #[test]
    fn identifier_is_prefix_of_sha256() {
        let key = "some-agreement-key";
        let did = AgentDid::from_public_key(key);
        let full = crate::crypto::sha256_hex(key.as_bytes());
        assert_eq!(did.identifier(), &full[..32]);
    }

    #[test]
    fn parse_rejects_wrong_part_count() {
        assert!(matches!(
            AgentDid::parse("did:moltbook"),
            Err(DidError::InvalidFormat(_))
        ));
        assert!(matches!(
            AgentDid::parse("did:moltbook:abc:extra"),
            Err(DidError::InvalidFormat(_))
        ));
    }

    #[test]
    fn parse_rejects_wrong_prefix() {
        assert!(matches!(
            AgentDid::parse("nid:moltbook:0123456789abcdef0123456789abcdef"),
            Err(DidError::InvalidFormat(_))
        ));
    }

    #[test]
    fn parse_rejects_other_methods() {
        assert!(matches!(
            AgentDid::parse("did:ethr:0123456789abcdef0123456789abcdef"),
            Err(DidError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_identifiers() {
        // Too short.
        assert!(matches!(
            AgentDid::parse("did:moltbook:abc123"),
            Err(DidError::InvalidIdentifier)
        ));
        // Uppercase hex.
        assert!(matches!(
            AgentDid::parse("did:moltbook:0123456789ABCDEF0123456789ABCDEF"),
            Err(DidError::InvalidIdentifier)
        ));
        // Non-hex characters of the right length.
        assert!(matches!(
            AgentDid::parse("did:moltbook:0123456789abcdeg0123456789abcdef"),
            Err(DidError::InvalidIdentifier)
        ));
    }

    #[test]
    fn serde_validates_on_deserialization() {
        let good = "\"did:moltbook:0123456789abcdef0123456789abcdef\"";
        let did: AgentDid = serde_json::from_str(good).unwrap();
        assert_eq!(did.identifier(), "0123456789abcdef0123456789abcdef");

        let bad = "\"did:other:0123456789abcdef0123456789abcdef\"";
        assert!(serde_json::from_str::<AgentDid>(bad).is_err());
    }

    #[test]
    fn serde_roundtrips_as_plain_string() {
        let did = AgentDid::from_public_key("key");
        let json = serde_json::to_string(&did).unwrap();
        assert_eq!(json, format!("\"{}\"", did.as_str()));
    }

    #[test]
    fn document_has_both_key_suites() {
        let kp = AgentKeypair::generate();
        let did = AgentDid::from_public_key(&kp.public_key());
        let doc = did_document(&did, &kp.public_key(), &kp.signing_key()).unwrap();

        assert_eq!(doc.id, did.as_str());
        assert_eq!(doc.verification_method.len(), 2);
        assert_eq!(doc.verification_method[0].type_, "X25519KeyAgreementKey2020");
        assert_eq!(doc.verification_method[1].type_, "Ed25519VerificationKey2020");
        assert_eq!(doc.key_agreement, vec![doc.verification_method[0].id.clone()]);
        assert_eq!(doc.authentication, vec![doc.verification_method[1].id.clone()]);
        assert!(doc.context.contains(&DID_CONTEXT.to_string()));
    }

    #[test]
    fn multibase_keys_carry_multicodec_prefixes() {
        let kp = AgentKeypair::generate();
        let did = AgentDid::from_public_key(&kp.public_key());
        let doc = did_document(&did, &kp.public_key(), &kp.signing_key()).unwrap();

        let agreement = &doc.verification_method[0].public_key_multibase;
        assert!(agreement.starts_with('z'));
        let decoded = bs58::decode(&agreement[1..]).into_vec().unwrap();
        assert_eq!(&decoded[..2], &[0xEC, 0x01]);
        assert_eq!(decoded.len(), 2 + 32);

        let signing = &doc.verification_method[1].public_key_multibase;
        let decoded = bs58::decode(&signing[1..]).into_vec().unwrap();
        assert_eq!(&decoded[..2], &[0xED, 0x01]);
    }

    #[test]
    fn document_rejects_undecodable_keys() {
        let did = AgentDid::from_public_key("whatever");
        assert!(matches!(
            did_document(&did, "!!!", "also invalid"),
            Err(DidError::InvalidKey)
        ));
    }
}
