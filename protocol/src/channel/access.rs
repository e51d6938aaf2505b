//! # Access-Control Policy
//!
//! Who may see, join, and read a channel. The policy is a tagged variant
//! stored in the channel record; unknown tags fail at deserialization,
//! never at decision time.
//!
//! ## Decision table
//!
//! | Membership      | Policy                                 | Outcome |
//! |-----------------|----------------------------------------|---------|
//! | participant     | any                                    | allowed |
//! | non-participant | open                                   | allowed |
//! | non-participant | invite-only, DID on allow list         | allowed |
//! | non-participant | invite-only otherwise                  | denied  |
//! | non-participant | credential-gated, verified match ≥ min | allowed |
//! | non-participant | credential-gated otherwise             | denied  |
//! | non-participant | no policy set                          | denied  |

use serde::{Deserialize, Serialize};

use super::channel::ChannelRecord;
use crate::identity::AgentRecord;

/// A channel's admission policy.
///
/// Serialized with a `type` tag (`open`, `invite-only`,
/// `credential-gated`). Records carrying any other tag refuse to
/// deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AccessPolicy {
    /// Anyone may join and read.
    #[serde(rename = "open")]
    Open,

    /// Admission by invitation, plus an optional explicit allow list.
    #[serde(rename = "invite-only")]
    InviteOnly {
        #[serde(default, rename = "allowedDids")]
        allowed_dids: Vec<String>,
    },

    /// Admission gated on a verified external credential.
    #[serde(rename = "credential-gated")]
    CredentialGated {
        /// Required issuer contract, e.g. `atomicassets`.
        contract: String,
        /// Optional required schema, e.g. `moltbook.agent`.
        #[serde(skip_serializing_if = "Option::is_none")]
        schema: Option<String>,
        /// Optional minimum number of matching verified credentials.
        #[serde(rename = "minCount", skip_serializing_if = "Option::is_none")]
        min_count: Option<u32>,
    },
}

/// The outcome of an access-control evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decide whether `agent` may access `channel`.
///
/// Participants are always allowed. Non-participants fall through to the
/// channel's policy; a channel without a policy admits nobody new.
pub fn evaluate_access(channel: &ChannelRecord, agent: &AgentRecord) -> AccessDecision {
    if channel.is_participant(&agent.did) {
        return AccessDecision::allow();
    }

    match &channel.access {
        Some(AccessPolicy::Open) => AccessDecision::allow(),
        Some(AccessPolicy::InviteOnly { allowed_dids }) => {
            if allowed_dids.iter().any(|d| d == agent.did.as_str()) {
                AccessDecision::allow()
            } else {
                AccessDecision::deny("Invite required")
            }
        }
        Some(AccessPolicy::CredentialGated {
            contract,
            schema,
            min_count,
        }) => {
            let count = agent.verified_credential_count(contract, schema.as_deref());
            if count == 0 {
                return AccessDecision::deny("Required NFT not found");
            }
            match min_count {
                Some(min) if count < *min as usize => AccessDecision::deny(format!(
                    "Requires at least {} verified credential(s), found {}",
                    min, count
                )),
                _ => AccessDecision::allow(),
            }
        }
        None => AccessDecision::deny("Not a participant"),
    }
}
