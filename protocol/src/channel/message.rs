//! # Encrypted Message Envelopes
//!
//! Validation, construction, TTL judgment, and channel statistics for
//! message envelopes. The server never inspects `nonce` or `ciphertext`
//! beyond their presence; everything inside the ciphertext belongs to the
//! channel's participants.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::access::AccessPolicy;
use super::channel::ChannelRecord;
use crate::crypto::ids::message_id;
use crate::identity::AgentDid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Send-request validation failures, in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("Not a channel participant")]
    NotParticipant,

    #[error("Missing required fields")]
    MissingFields,

    #[error("Channel ID mismatch")]
    ChannelMismatch,
}

// ---------------------------------------------------------------------------
// Requests and Envelopes
// ---------------------------------------------------------------------------

/// The body of `POST /channels/:id/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub channel_id: String,
    /// Base64 AEAD nonce chosen by the sender.
    pub nonce: String,
    /// Base64 ciphertext, tag embedded.
    pub ciphertext: String,
    /// Optional base64 ephemeral public key for sender-side schemes.
    #[serde(rename = "ephemeralPubKey", skip_serializing_if = "Option::is_none")]
    pub ephemeral_public_key: Option<String>,
}

/// A stored message envelope. Written once, read many, gone (logically)
/// once the channel TTL elapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessage {
    /// `msg-<32 hex>`, stamped at write time.
    pub id: String,
    pub channel_id: String,
    pub sender: AgentDid,
    /// Server wall-clock at write time (ms).
    pub timestamp: i64,
    pub nonce: String,
    pub ciphertext: String,
    #[serde(rename = "ephemeralPubKey", skip_serializing_if = "Option::is_none")]
    pub ephemeral_public_key: Option<String>,
}

impl EncryptedMessage {
    /// TTL judgment: expired when `now − timestamp > ttl × 1000`.
    /// A channel without a TTL never expires messages.
    pub fn is_expired(&self, ttl_seconds: Option<u64>, now: i64) -> bool {
        match ttl_seconds {
            Some(ttl) => now - self.timestamp > (ttl as i64) * 1000,
            None => false,
        }
    }
}

/// Validate a send request against its target channel.
///
/// Rules in order: sender must be a participant; channel id, nonce, and
/// ciphertext must be present and non-empty; the request's channel id
/// must equal the target channel's.
pub fn validate_send(
    channel: &ChannelRecord,
    sender: &AgentDid,
    request: &SendMessageRequest,
) -> Result<(), MessageError> {
    if !channel.is_participant(sender) {
        return Err(MessageError::NotParticipant);
    }
    if request.channel_id.is_empty() || request.nonce.is_empty() || request.ciphertext.is_empty() {
        return Err(MessageError::MissingFields);
    }
    if request.channel_id != channel.id {
        return Err(MessageError::ChannelMismatch);
    }
    Ok(())
}

/// Validate and stamp an envelope: fresh `msg-` id, the sender DID, and
/// the current wall-clock in ms.
pub fn build_envelope(
    channel: &ChannelRecord,
    sender: &AgentDid,
    request: &SendMessageRequest,
    now: i64,
) -> Result<EncryptedMessage, MessageError> {
    validate_send(channel, sender, request)?;
    Ok(EncryptedMessage {
        id: message_id(),
        channel_id: request.channel_id.clone(),
        sender: sender.clone(),
        timestamp: now,
        nonce: request.nonce.clone(),
        ciphertext: request.ciphertext.clone(),
        ephemeral_public_key: request.ephemeral_public_key.clone(),
    })
}

// ---------------------------------------------------------------------------
// Listing and Statistics
// ---------------------------------------------------------------------------

/// Pagination parameters for message listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageQuery {
    /// Page size; capped at 100 by the service.
    pub limit: Option<usize>,
    /// Only messages with `timestamp < before`.
    pub before: Option<i64>,
    /// Only messages with `timestamp > after`.
    pub after: Option<i64>,
}

/// Channel statistics over the live (non-expired) message set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub participant_count: usize,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<i64>,
    pub credential_gated: bool,
}

/// Compute statistics for a channel given its current messages.
///
/// Expired messages contribute to neither the count nor the latest
/// activity timestamp.
pub fn channel_stats(
    channel: &ChannelRecord,
    messages: &[EncryptedMessage],
    now: i64,
) -> ChannelStats {
    let ttl = channel.message_ttl_seconds();
    let live: Vec<&EncryptedMessage> = messages
        .iter()
        .filter(|m| !m.is_expired(ttl, now))
        .collect();

    ChannelStats {
        participant_count: channel.participants.len(),
        message_count: live.len(),
        last_activity: live.iter().map(|m| m.timestamp).max(),
        credential_gated: matches!(
            channel.access,
            Some(AccessPolicy::CredentialGated { .. })
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
