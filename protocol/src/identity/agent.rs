//! # Agent Records
//!
//! The server-held representation of a registered agent: its DID, both
//! long-term public keys, and a profile (display name, capabilities,
//! reputation, verified credentials). Private keys never appear here.
//!
//! ## Registration authentication
//!
//! A registration request is accepted only when its Ed25519 signature
//! verifies over the canonical JSON of `{profile, publicKey, signingKey}`.
//! Canonical means the exact output of [`registration_payload`]: object
//! keys sorted, no whitespace. Client and server both call the same
//! function, so there is exactly one byte sequence to sign.
//!
//! ## Reputation
//!
//! Initialized to 50 at registration no matter what the request claims.
//! The profile-update path preserves it unconditionally; only
//! [`AgentRecord::adjust_reputation`] can move it, and always clamps to
//! `[0, 100]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::did::{did_document, AgentDid, DidDocument, DidError};
use crate::config::INITIAL_REPUTATION;
use crate::crypto::verify_signature;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors constructing or mutating agent records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// A required registration field is empty or absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The registration signature did not verify over the canonical payload.
    #[error("Invalid registration signature")]
    InvalidSignature,

    /// The DID embedded in a request is malformed.
    #[error(transparent)]
    Did(#[from] DidError),
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// An external credential attached to an agent, keyed by
/// `(contract, assetId)`.
///
/// Entries start unverified; an external verifier flips them to verified.
/// Within this layer the transition is one-way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCredential {
    /// Issuer contract, e.g. `atomicassets`.
    pub contract: String,
    /// Asset identifier within the contract.
    pub asset_id: String,
    /// Optional schema name, e.g. `moltbook.agent`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Whether the external verifier has confirmed ownership.
    pub verified: bool,
    /// Verification timestamp (ms). Set iff `verified` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<i64>,
}

impl VerifiedCredential {
    fn matches(&self, contract: &str, schema: Option<&str>) -> bool {
        self.contract == contract
            && match schema {
                Some(s) => self.schema.as_deref() == Some(s),
                None => true,
            }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The mutable profile attached to an agent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Always in `[0, 100]`.
    pub reputation: u8,
    /// Opaque agent-supplied metadata. Stored, never interpreted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub verified_credentials: Vec<VerifiedCredential>,
}

/// Profile fields a registration request may supply. Reputation is
/// deliberately absent: it is assigned, never requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A partial profile update. Only present fields change; anything else in
/// the incoming JSON (including an attempted `reputation`) is discarded
/// during deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// The body of `POST /agents/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgentRequest {
    /// Base64 X25519 key-agreement public key. The DID derives from this.
    pub public_key: String,
    /// Base64 Ed25519 signing public key.
    pub signing_key: String,
    #[serde(default)]
    pub profile: ProfileInput,
    /// Base64 Ed25519 signature over [`registration_payload`].
    pub signature: String,
}

/// The canonical byte sequence a registration signature covers.
///
/// `serde_json` object keys sort lexicographically here, so the output is
/// stable across callers: `{"profile":…,"publicKey":…,"signingKey":…}`.
pub fn registration_payload(public_key: &str, signing_key: &str, profile: &ProfileInput) -> String {
    serde_json::json!({
        "publicKey": public_key,
        "signingKey": signing_key,
        "profile": profile,
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// AgentRecord
// ---------------------------------------------------------------------------

/// The authoritative server-side record of a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub did: AgentDid,
    /// Base64 X25519 key-agreement public key.
    pub public_key: String,
    /// Base64 Ed25519 signing public key.
    pub signing_key: String,
    /// Registration timestamp (ms).
    pub created_at: i64,
    pub profile: AgentProfile,
}

impl AgentRecord {
    /// Build an agent record from a registration request.
    ///
    /// Validates required fields, verifies the signature over the
    /// canonical payload, derives the DID, and initializes reputation
    /// to 50.
    pub fn from_registration(
        req: &RegisterAgentRequest,
        now: i64,
    ) -> Result<Self, IdentityError> {
        if req.public_key.is_empty() {
            return Err(IdentityError::MissingField("publicKey"));
        }
        if req.signing_key.is_empty() {
            return Err(IdentityError::MissingField("signingKey"));
        }
        if req.signature.is_empty() {
            return Err(IdentityError::MissingField("signature"));
        }

        let payload = registration_payload(&req.public_key, &req.signing_key, &req.profile);
        if !verify_signature(&req.signing_key, payload.as_bytes(), &req.signature) {
            return Err(IdentityError::InvalidSignature);
        }

        Ok(Self {
            did: AgentDid::from_public_key(&req.public_key),
            public_key: req.public_key.clone(),
            signing_key: req.signing_key.clone(),
            created_at: now,
            profile: AgentProfile {
                display_name: req.profile.display_name.clone(),
                capabilities: req.profile.capabilities.clone(),
                reputation: INITIAL_REPUTATION,
                metadata: req.profile.metadata.clone(),
                verified_credentials: Vec::new(),
            },
        })
    }

    /// Apply a partial profile update. Reputation and credentials are
    /// untouched regardless of what the caller sent.
    pub fn apply_profile_update(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.display_name {
            self.profile.display_name = Some(name.clone());
        }
        if let Some(capabilities) = &update.capabilities {
            self.profile.capabilities = capabilities.clone();
        }
        if let Some(metadata) = &update.metadata {
            self.profile.metadata = Some(metadata.clone());
        }
    }

    /// Adjust reputation by a signed delta, clamped to `[0, 100]`.
    /// Returns the new value.
    pub fn adjust_reputation(&mut self, delta: i32) -> u8 {
        let adjusted = (self.profile.reputation as i32 + delta).clamp(0, 100);
        self.profile.reputation = adjusted as u8;
        self.profile.reputation
    }

    /// Add a credential, idempotent on `(contract, assetId)`.
    ///
    /// New entries start unverified. Returns `false` when the pair is
    /// already present (and leaves the existing entry untouched).
    pub fn add_credential(
        &mut self,
        contract: &str,
        asset_id: &str,
        schema: Option<&str>,
    ) -> bool {
        let exists = self
            .profile
            .verified_credentials
            .iter()
            .any(|c| c.contract == contract && c.asset_id == asset_id);
        if exists {
            return false;
        }
        self.profile.verified_credentials.push(VerifiedCredential {
            contract: contract.to_string(),
            asset_id: asset_id.to_string(),
            schema: schema.map(str::to_string),
            verified: false,
            verified_at: None,
        });
        true
    }

    /// Mark a credential verified. Monotonic: an already-verified entry
    /// keeps its original timestamp. Returns `false` when no entry
    /// matches the `(contract, assetId)` pair.
    pub fn mark_credential_verified(&mut self, contract: &str, asset_id: &str, now: i64) -> bool {
        match self
            .profile
            .verified_credentials
            .iter_mut()
            .find(|c| c.contract == contract && c.asset_id == asset_id)
        {
            Some(cred) => {
                if !cred.verified {
                    cred.verified = true;
                    cred.verified_at = Some(now);
                }
                true
            }
            None => false,
        }
    }

    /// Whether any *verified* credential matches the contract and,
    /// when given, the schema.
    pub fn has_verified_credential(&self, contract: &str, schema: Option<&str>) -> bool {
        self.verified_credential_count(contract, schema) > 0
    }

    /// Count of verified credentials matching the contract and optional
    /// schema. Used by credential-gated access with a minimum count.
    pub fn verified_credential_count(&self, contract: &str, schema: Option<&str>) -> usize {
        self.profile
            .verified_credentials
            .iter()
            .filter(|c| c.verified && c.matches(contract, schema))
            .count()
    }

    /// Emit the W3C DID Document for this agent.
    pub fn to_did_document(&self) -> Result<DidDocument, DidError> {
        did_document(&self.did, &self.public_key, &self.signing_key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AgentKeypair;

    fn signed_registration(kp: &AgentKeypair, profile: ProfileInput) -> RegisterAgentRequest {
        let payload = registration_payload(&kp.public_key(), &kp.signing_key(), &profile);
        RegisterAgentRequest {
            public_key: kp.public_key(),
            signing_key: kp.signing_key(),
            profile,
            signature: kp.sign(payload.as_bytes()),
        }
    }

    #[test]
    fn registration_produces_record_with_initial_reputation() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(
            &kp,
            ProfileInput {
                display_name: Some("scout".into()),
                capabilities: vec!["search".into(), "summarize".into()],
                metadata: None,
            },
        );
        let agent = AgentRecord::from_registration(&req, 1_000).unwrap();

        assert_eq!(agent.did, AgentDid::from_public_key(&kp.public_key()));
        assert_eq!(agent.profile.reputation, 50);
        assert_eq!(agent.created_at, 1_000);
        assert!(agent.profile.verified_credentials.is_empty());
        assert_eq!(agent.profile.capabilities.len(), 2);
    }

    #[test]
    fn registration_rejects_missing_fields() {
        let kp = AgentKeypair::generate();
        let mut req = signed_registration(&kp, ProfileInput::default());
        req.public_key = String::new();
        assert_eq!(
            AgentRecord::from_registration(&req, 0).unwrap_err(),
            IdentityError::MissingField("publicKey")
        );

        let mut req = signed_registration(&kp, ProfileInput::default());
        req.signature = String::new();
        assert_eq!(
            AgentRecord::from_registration(&req, 0).unwrap_err(),
            IdentityError::MissingField("signature")
        );
    }

    #[test]
    fn registration_rejects_bad_signature() {
        let kp = AgentKeypair::generate();
        let other = AgentKeypair::generate();
        let profile = ProfileInput::default();
        let payload = registration_payload(&kp.public_key(), &kp.signing_key(), &profile);
        let req = RegisterAgentRequest {
            public_key: kp.public_key(),
            signing_key: kp.signing_key(),
            profile,
            // Signed by someone else's key.
            signature: other.sign(payload.as_bytes()),
        };
        assert_eq!(
            AgentRecord::from_registration(&req, 0).unwrap_err(),
            IdentityError::InvalidSignature
        );
    }

    #[test]
    fn registration_rejects_tampered_profile() {
        let kp = AgentKeypair::generate();
        let mut req = signed_registration(
            &kp,
            ProfileInput {
                display_name: Some("honest".into()),
                ..Default::default()
            },
        );
        req.profile.display_name = Some("imposter".into());
        assert_eq!(
            AgentRecord::from_registration(&req, 0).unwrap_err(),
            IdentityError::InvalidSignature
        );
    }

    #[test]
    fn canonical_payload_sorts_keys() {
        let payload = registration_payload("PK", "SK", &ProfileInput::default());
        let profile_pos = payload.find("\"profile\"").unwrap();
        let public_pos = payload.find("\"publicKey\"").unwrap();
        let signing_pos = payload.find("\"signingKey\"").unwrap();
        assert!(profile_pos < public_pos && public_pos < signing_pos);
    }

    #[test]
    fn profile_update_preserves_reputation() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();
        agent.adjust_reputation(25);

        // A caller trying to smuggle reputation through the update JSON
        // loses it at deserialization.
        let update: ProfileUpdate = serde_json::from_str(
            r#"{"displayName":"renamed","reputation":100,"capabilities":["relay"]}"#,
        )
        .unwrap();
        agent.apply_profile_update(&update);

        assert_eq!(agent.profile.reputation, 75);
        assert_eq!(agent.profile.display_name.as_deref(), Some("renamed"));
        assert_eq!(agent.profile.capabilities, vec!["relay".to_string()]);
    }

    #[test]
    fn partial_update_leaves_absent_fields_alone() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(
            &kp,
            ProfileInput {
                display_name: Some("original".into()),
                capabilities: vec!["a".into()],
                metadata: None,
            },
        );
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();

        agent.apply_profile_update(&ProfileUpdate {
            metadata: Some(serde_json::json!({"note": "hello"})),
            ..Default::default()
        });

        assert_eq!(agent.profile.display_name.as_deref(), Some("original"));
        assert_eq!(agent.profile.capabilities, vec!["a".to_string()]);
        assert!(agent.profile.metadata.is_some());
    }

    #[test]
    fn reputation_clamps_at_both_bounds() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();

        assert_eq!(agent.adjust_reputation(1_000), 100);
        assert_eq!(agent.adjust_reputation(-1_000_000), 0);
        assert_eq!(agent.adjust_reputation(30), 30);
        assert_eq!(agent.adjust_reputation(-10), 20);
    }

    #[test]
    fn add_credential_is_idempotent_by_contract_and_asset() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();

        assert!(agent.add_credential("atomicassets", "1099", Some("moltbook.agent")));
        assert!(!agent.add_credential("atomicassets", "1099", Some("moltbook.agent")));
        assert_eq!(agent.profile.verified_credentials.len(), 1);

        // A different asset on the same contract is a new entry.
        assert!(agent.add_credential("atomicassets", "2000", None));
        assert_eq!(agent.profile.verified_credentials.len(), 2);
    }

    #[test]
    fn new_credentials_start_unverified() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();

        agent.add_credential("atomicassets", "1", None);
        assert!(!agent.has_verified_credential("atomicassets", None));
        assert!(agent.profile.verified_credentials[0].verified_at.is_none());
    }

    #[test]
    fn verification_is_monotonic() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();
        agent.add_credential("atomicassets", "1", Some("moltbook.agent"));

        assert!(agent.mark_credential_verified("atomicassets", "1", 5_000));
        assert_eq!(agent.profile.verified_credentials[0].verified_at, Some(5_000));

        // Re-marking keeps the original timestamp.
        assert!(agent.mark_credential_verified("atomicassets", "1", 9_000));
        assert_eq!(agent.profile.verified_credentials[0].verified_at, Some(5_000));

        // Unknown pair is a miss, not a panic.
        assert!(!agent.mark_credential_verified("atomicassets", "404", 9_000));
    }

    #[test]
    fn verified_check_respects_schema_filter() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();
        agent.add_credential("atomicassets", "1", Some("moltbook.agent"));
        agent.mark_credential_verified("atomicassets", "1", 1);

        assert!(agent.has_verified_credential("atomicassets", None));
        assert!(agent.has_verified_credential("atomicassets", Some("moltbook.agent")));
        assert!(!agent.has_verified_credential("atomicassets", Some("other.schema")));
        assert!(!agent.has_verified_credential("othercontract", None));
    }

    #[test]
    fn credential_count_only_counts_verified() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 0).unwrap();
        agent.add_credential("atomicassets", "1", None);
        agent.add_credential("atomicassets", "2", None);
        agent.add_credential("atomicassets", "3", None);
        agent.mark_credential_verified("atomicassets", "1", 1);
        agent.mark_credential_verified("atomicassets", "2", 1);

        assert_eq!(agent.verified_credential_count("atomicassets", None), 2);
    }

    #[test]
    fn record_serializes_camel_case() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let agent = AgentRecord::from_registration(&req, 42).unwrap();
        let json = serde_json::to_value(&agent).unwrap();
        assert!(json.get("publicKey").is_some());
        assert!(json.get("signingKey").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json["profile"].get("reputation").is_some());
    }

    #[test]
    fn record_roundtrips_through_json() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let mut agent = AgentRecord::from_registration(&req, 42).unwrap();
        agent.add_credential("atomicassets", "7", Some("moltbook.agent"));
        agent.mark_credential_verified("atomicassets", "7", 99);

        let json = serde_json::to_string(&agent).unwrap();
        let back: AgentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(agent, back);
    }

    #[test]
    fn did_document_derives_from_record() {
        let kp = AgentKeypair::generate();
        let req = signed_registration(&kp, ProfileInput::default());
        let agent = AgentRecord::from_registration(&req, 0).unwrap();
        let doc = agent.to_did_document().unwrap();
        assert_eq!(doc.id, agent.did.as_str());
    }
}
