//! # Channel Records
//!
//! Construction and mutation of channel records: the participant set, the
//! encryption configuration, metadata, and the creator's moderation
//! rights.
//!
//! Channel creation is a pure function over already-resolved inputs. The
//! creator generates and wraps the channel key on their own machine; the
//! server receives one pre-wrapped blob per invitee and never any private
//! key. Persistence ordering (channel first, then invitations) is the
//! storage adapter's concern.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::access::AccessPolicy;
use super::invitation::Invitation;
use crate::crypto::ids::channel_id;
use crate::crypto::WrappedChannelKey;
use crate::identity::AgentDid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors constructing or mutating channels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Channel creation with no invitees.
    #[error("At least one invitee is required")]
    EmptyInvitees,

    /// An invitee has no wrapped channel key in the request.
    #[error("Missing wrapped key for invitee: {0}")]
    MissingWrappedKey(String),

    /// Adding a participant would exceed the configured maximum.
    #[error("Channel is full: maximum {0} participants")]
    MaxParticipants(usize),

    /// The caller is neither the target of a removal nor the creator.
    #[error("Not authorized")]
    NotAuthorized,

    /// The creator cannot be removed from their own channel.
    #[error("Cannot remove channel creator")]
    CannotRemoveCreator,
}

// ---------------------------------------------------------------------------
// Encryption Configuration
// ---------------------------------------------------------------------------

/// Key-distribution scheme tag. One scheme exists today: a single shared
/// channel key delivered via wrapped invitations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EncryptionScheme {
    #[serde(rename = "channel-key")]
    #[default]
    ChannelKey,
}

/// Symmetric algorithm tag. Records carrying an unrecognized algorithm
/// string refuse to deserialize; there is no fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "aes-256-gcm")]
    #[default]
    Aes256Gcm,
}

/// A channel's encryption configuration. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfig {
    pub scheme: EncryptionScheme,
    pub algorithm: EncryptionAlgorithm,
    /// Optional coarse key-rotation interval, seconds. Advisory for
    /// clients; the server never rotates keys itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_interval_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Optional operator-supplied channel metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hard cap on the participant set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<usize>,
    /// Message time-to-live in seconds. Messages older than this are
    /// invisible to reads and statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ttl_seconds: Option<u64>,
}

// ---------------------------------------------------------------------------
// ChannelRecord
// ---------------------------------------------------------------------------

/// The authoritative server-side record of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub id: String,
    /// The participant set. The creator is always a member.
    pub participants: Vec<AgentDid>,
    pub creator: AgentDid,
    /// Creation timestamp (ms).
    pub created_at: i64,
    pub encryption: EncryptionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChannelMetadata>,
}

impl ChannelRecord {
    /// Whether the DID is currently in the participant set.
    pub fn is_participant(&self, did: &AgentDid) -> bool {
        self.participants.contains(did)
    }

    /// The configured message TTL, if any.
    pub fn message_ttl_seconds(&self) -> Option<u64> {
        self.metadata.as_ref().and_then(|m| m.message_ttl_seconds)
    }

    /// Add a participant.
    ///
    /// Idempotent on already-present DIDs (returns `Ok(false)`). Fails
    /// when the addition would exceed `maxParticipants`.
    pub fn add_participant(&mut self, did: &AgentDid) -> Result<bool, ChannelError> {
        if self.is_participant(did) {
            return Ok(false);
        }
        if let Some(max) = self.metadata.as_ref().and_then(|m| m.max_participants) {
            if self.participants.len() >= max {
                return Err(ChannelError::MaxParticipants(max));
            }
        }
        self.participants.push(did.clone());
        Ok(true)
    }

    /// Remove a participant.
    ///
    /// Authorized when the remover is the target (self-leave) or the
    /// channel creator (moderation). The creator is never removable
    /// through this path, not even by themselves.
    pub fn remove_participant(
        &mut self,
        remover: &AgentDid,
        target: &AgentDid,
    ) -> Result<(), ChannelError> {
        if target == &self.creator {
            return Err(ChannelError::CannotRemoveCreator);
        }
        if remover != target && remover != &self.creator {
            return Err(ChannelError::NotAuthorized);
        }
        self.participants.retain(|p| p != target);
        Ok(())
    }

    /// Replace the access-control policy. Creator only; the new policy
    /// replaces the old atomically.
    pub fn set_access_policy(
        &mut self,
        caller: &AgentDid,
        policy: AccessPolicy,
    ) -> Result<(), ChannelError> {
        if caller != &self.creator {
            return Err(ChannelError::NotAuthorized);
        }
        self.access = Some(policy);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// The body of `POST /channels`.
///
/// `wrappedKeys` maps each invitee DID to the channel key wrapped under
/// the creator↔invitee pairwise shared secret. Wrapping happened on the
/// creator's machine; the blobs are opaque here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelRequest {
    pub invitee_dids: Vec<String>,
    #[serde(default)]
    pub wrapped_keys: BTreeMap<String, WrappedChannelKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<AccessPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChannelMetadata>,
}

/// Build a channel and its invitation set as one logical unit.
///
/// `invitees` must already be resolved to existing agents by the caller.
/// The participant set is `{creator} ∪ invitees`, deduplicated, creator
/// first. The policy defaults to invite-only and the encryption config to
/// AES-256-GCM. One pending invitation is emitted per non-creator
/// participant, expiring 7 days out, carrying that invitee's wrapped key
/// from the request.
pub fn build_channel_with_invitations(
    creator: &AgentDid,
    invitees: &[AgentDid],
    request: &CreateChannelRequest,
    now: i64,
) -> Result<(ChannelRecord, Vec<Invitation>), ChannelError> {
    if invitees.is_empty() {
        return Err(ChannelError::EmptyInvitees);
    }

    let mut participants = vec![creator.clone()];
    for did in invitees {
        if !participants.contains(did) {
            participants.push(did.clone());
        }
    }

    if let Some(max) = request.metadata.as_ref().and_then(|m| m.max_participants) {
        if participants.len() > max {
            return Err(ChannelError::MaxParticipants(max));
        }
    }

    // Every non-creator participant needs a wrapped key before anything
    // is constructed; a partial invitation set is not a valid channel.
    for did in participants.iter().filter(|d| *d != creator) {
        if !request.wrapped_keys.contains_key(did.as_str()) {
            return Err(ChannelError::MissingWrappedKey(did.as_str().to_string()));
        }
    }

    let channel = ChannelRecord {
        id: channel_id(),
        participants: participants.clone(),
        creator: creator.clone(),
        created_at: now,
        encryption: EncryptionConfig::default(),
        access: Some(request.access_policy.clone().unwrap_or(
            AccessPolicy::InviteOnly {
                allowed_dids: Vec::new(),
            },
        )),
        metadata: request.metadata.clone(),
    };

    let invitations = participants
        .iter()
        .filter(|did| *did != creator)
        .map(|did| {
            Invitation::new(
                &channel.id,
                creator,
                did,
                request.wrapped_keys[did.as_str()].clone(),
                now,
            )
        })
        .collect();

    Ok((channel, invitations))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
