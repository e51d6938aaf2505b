//! # Privacy Namespace Adapter
//!
//! Maps core entities onto the flat blob namespace and owns everything
//! that is more than a single get/put:
//!
//! - appending channel and invitation ids to the per-agent indices
//! - cascade deletion of a channel (indices, then messages, then
//!   referencing invitations)
//! - lazy expiry of pending invitations on index walks
//! - agent search over the `privacy/agents/` prefix
//! - message pagination and the TTL sweeper
//!
//! ## Key layout
//!
//! | Record                | Key                                              |
//! |-----------------------|--------------------------------------------------|
//! | Agent                 | `privacy/agents/<did>.json`                      |
//! | Agent channel index   | `privacy/agents/<did>/channels.json`             |
//! | Agent invite index    | `privacy/agents/<did>/invitations.json`          |
//! | Channel               | `privacy/channels/<channel id>/metadata.json`    |
//! | Message               | `privacy/channels/<channel id>/messages/<id>.json` |
//! | Invitation            | `privacy/invitations/<invitation id>.json`       |
//!
//! DIDs are URL-encoded in keys (`:` becomes `%3A`). All records are
//! canonical JSON.
//!
//! ## Concurrency
//!
//! The per-agent indices are read-modify-write blobs. Every index
//! mutation takes a per-DID async lock, so two requests touching the same
//! agent's index serialize instead of losing an update. Mutations on
//! different DIDs proceed concurrently.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::{ChannelRecord, EncryptedMessage, Invitation, MessageQuery};
use crate::config::{
    AGENTS_PREFIX, CHANNELS_PREFIX, DEFAULT_MESSAGE_LIMIT, INVITATIONS_PREFIX,
};
use crate::identity::AgentRecord;
use crate::storage::blob::{BlobError, BlobStore};

/// Errors from the adapter: backend failures or corrupt records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Filters for agent search. All present filters must match.
#[derive(Debug, Clone, Default)]
pub struct AgentSearchQuery {
    /// Every listed capability must be present on the agent.
    pub capabilities: Vec<String>,
    /// Minimum reputation, inclusive.
    pub min_reputation: Option<u8>,
    /// Require a verified credential on this contract.
    pub credential_contract: Option<String>,
    /// Additionally require the credential schema to match.
    pub credential_schema: Option<String>,
}

// ---------------------------------------------------------------------------
// Key construction
// ---------------------------------------------------------------------------

/// `privacy/agents/<url-encoded DID>.json`
pub fn agent_key(did: &str) -> String {
    format!("{AGENTS_PREFIX}{}.json", urlencoding::encode(did))
}

/// `privacy/agents/<url-encoded DID>/channels.json`
pub fn agent_channels_key(did: &str) -> String {
    format!("{AGENTS_PREFIX}{}/channels.json", urlencoding::encode(did))
}

/// `privacy/agents/<url-encoded DID>/invitations.json`
pub fn agent_invitations_key(did: &str) -> String {
    format!("{AGENTS_PREFIX}{}/invitations.json", urlencoding::encode(did))
}

/// `privacy/channels/<channel id>/metadata.json`
pub fn channel_key(channel_id: &str) -> String {
    format!("{CHANNELS_PREFIX}{channel_id}/metadata.json")
}

/// `privacy/channels/<channel id>/messages/<message id>.json`
pub fn message_key(channel_id: &str, message_id: &str) -> String {
    format!("{CHANNELS_PREFIX}{channel_id}/messages/{message_id}.json")
}

/// Prefix under which a channel's messages live.
pub fn messages_prefix(channel_id: &str) -> String {
    format!("{CHANNELS_PREFIX}{channel_id}/messages/")
}

/// `privacy/invitations/<invitation id>.json`
pub fn invitation_key(invitation_id: &str) -> String {
    format!("{INVITATIONS_PREFIX}{invitation_id}.json")
}

// ---------------------------------------------------------------------------
// PrivacyStore
// ---------------------------------------------------------------------------

/// The storage adapter for the privacy layer.
pub struct PrivacyStore {
    blobs: Arc<dyn BlobStore>,
    /// One async lock per DID, created on first touch. Serializes
    /// read-modify-write cycles on that agent's index blobs.
    index_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PrivacyStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            index_locks: Mutex::new(HashMap::new()),
        }
    }

    fn index_lock(&self, did: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.index_locks.lock();
        Arc::clone(locks.entry(did.to_string()).or_default())
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn get_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.blobs.get(key).await? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read an id index, treating an absent blob as the empty list.
    async fn read_index(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.get_record(key).await?.unwrap_or_default())
    }

    /// Append an id to an index blob, idempotently, under the DID's lock.
    async fn append_to_index(&self, did: &str, key: &str, id: &str) -> Result<(), StoreError> {
        let lock = self.index_lock(did);
        let _guard = lock.lock().await;
        let mut ids = self.read_index(key).await?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
            self.blobs.put(key, Self::encode(&ids)?).await?;
        }
        Ok(())
    }

    /// Remove an id from an index blob under the DID's lock.
    async fn remove_from_index(&self, did: &str, key: &str, id: &str) -> Result<(), StoreError> {
        let lock = self.index_lock(did);
        let _guard = lock.lock().await;
        let mut ids = self.read_index(key).await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before {
            self.blobs.put(key, Self::encode(&ids)?).await?;
        }
        Ok(())
    }

    // -- Agents -------------------------------------------------------------

    pub async fn put_agent(&self, agent: &AgentRecord) -> Result<(), StoreError> {
        self.blobs
            .put(&agent_key(agent.did.as_str()), Self::encode(agent)?)
            .await?;
        Ok(())
    }

    pub async fn get_agent(&self, did: &str) -> Result<Option<AgentRecord>, StoreError> {
        self.get_record(&agent_key(did)).await
    }

    pub async fn agent_exists(&self, did: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.head(&agent_key(did)).await?)
    }

    /// Search agents across the whole namespace.
    ///
    /// Prefix-lists `privacy/agents/`, skips the index blobs by their
    /// name suffix, and applies every filter in the query. Enumeration is
    /// naive get-per-object; the corpus is small.
    pub async fn search_agents(
        &self,
        query: &AgentSearchQuery,
    ) -> Result<Vec<AgentRecord>, StoreError> {
        let mut results = Vec::new();
        for key in self.blobs.list(AGENTS_PREFIX).await? {
            if key.ends_with("/channels.json") || key.ends_with("/invitations.json") {
                continue;
            }
            let Some(agent) = self.get_record::<AgentRecord>(&key).await? else {
                continue;
            };

            if !query
                .capabilities
                .iter()
                .all(|c| agent.profile.capabilities.contains(c))
            {
                continue;
            }
            if let Some(min) = query.min_reputation {
                if agent.profile.reputation < min {
                    continue;
                }
            }
            if let Some(contract) = &query.credential_contract {
                if !agent.has_verified_credential(contract, query.credential_schema.as_deref()) {
                    continue;
                }
            }
            results.push(agent);
        }
        Ok(results)
    }

    // -- Channels -----------------------------------------------------------

    /// Persist a channel and index it for every participant.
    ///
    /// Safe to call on updates: the index appends are idempotent. The
    /// channel blob lands before any index write, so a crash mid-save
    /// leaves indices pointing at nothing worse than a fetchable channel.
    pub async fn save_channel(&self, channel: &ChannelRecord) -> Result<(), StoreError> {
        self.blobs
            .put(&channel_key(&channel.id), Self::encode(channel)?)
            .await?;
        for participant in &channel.participants {
            let did = participant.as_str();
            self.append_to_index(did, &agent_channels_key(did), &channel.id)
                .await?;
        }
        Ok(())
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>, StoreError> {
        self.get_record(&channel_key(channel_id)).await
    }

    /// Drop a channel id from one agent's channel index (used on leave).
    pub async fn remove_channel_from_index(
        &self,
        did: &str,
        channel_id: &str,
    ) -> Result<(), StoreError> {
        self.remove_from_index(did, &agent_channels_key(did), channel_id)
            .await
    }

    /// All channels an agent currently participates in.
    ///
    /// Walks the agent's index and filters out channels the agent has
    /// since left plus dangling ids from interrupted deletions.
    pub async fn channels_for_agent(&self, did: &str) -> Result<Vec<ChannelRecord>, StoreError> {
        let mut channels = Vec::new();
        for id in self.read_index(&agent_channels_key(did)).await? {
            if let Some(channel) = self.get_channel(&id).await? {
                if channel.participants.iter().any(|p| p.as_str() == did) {
                    channels.push(channel);
                }
            }
        }
        Ok(channels)
    }

    /// Delete a channel and everything hanging off it: participant index
    /// entries, message objects, and referencing invitations (including
    /// their invitee index entries), then the channel record itself.
    pub async fn delete_channel(&self, channel_id: &str) -> Result<(), StoreError> {
        if let Some(channel) = self.get_channel(channel_id).await? {
            for participant in &channel.participants {
                let did = participant.as_str();
                self.remove_from_index(did, &agent_channels_key(did), channel_id)
                    .await?;
            }
        }

        for key in self.blobs.list(&messages_prefix(channel_id)).await? {
            self.blobs.delete(&key).await?;
        }

        for key in self.blobs.list(INVITATIONS_PREFIX).await? {
            let Some(invitation) = self.get_record::<Invitation>(&key).await? else {
                continue;
            };
            if invitation.channel_id == channel_id {
                let invitee = invitation.invitee.as_str();
                self.remove_from_index(invitee, &agent_invitations_key(invitee), &invitation.id)
                    .await?;
                self.blobs.delete(&key).await?;
            }
        }

        self.blobs.delete(&channel_key(channel_id)).await?;
        Ok(())
    }

    /// Ids of every stored channel, derived from the metadata keys.
    pub async fn list_channel_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for key in self.blobs.list(CHANNELS_PREFIX).await? {
            if let Some(rest) = key.strip_prefix(CHANNELS_PREFIX) {
                if let Some(id) = rest.strip_suffix("/metadata.json") {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    // -- Invitations --------------------------------------------------------

    /// Persist an invitation and index it for the invitee.
    pub async fn save_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        self.blobs
            .put(&invitation_key(&invitation.id), Self::encode(invitation)?)
            .await?;
        let invitee = invitation.invitee.as_str();
        self.append_to_index(invitee, &agent_invitations_key(invitee), &invitation.id)
            .await?;
        Ok(())
    }

    /// Rewrite an invitation record (status transitions).
    pub async fn update_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        self.blobs
            .put(&invitation_key(&invitation.id), Self::encode(invitation)?)
            .await?;
        Ok(())
    }

    pub async fn get_invitation(
        &self,
        invitation_id: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        self.get_record(&invitation_key(invitation_id)).await
    }

    /// An agent's pending invitations.
    ///
    /// Walks the invitee index, lazily flipping overdue pending
    /// invitations to expired and writing the transition back before
    /// filtering them out of the result.
    pub async fn pending_invitations(
        &self,
        did: &str,
        now: i64,
    ) -> Result<Vec<Invitation>, StoreError> {
        let mut pending = Vec::new();
        for id in self.read_index(&agent_invitations_key(did)).await? {
            let Some(mut invitation) = self.get_invitation(&id).await? else {
                continue;
            };
            if invitation.expire_if_due(now) {
                self.update_invitation(&invitation).await?;
            }
            if invitation.status == crate::channel::InvitationStatus::Pending {
                pending.push(invitation);
            }
        }
        Ok(pending)
    }

    // -- Messages -----------------------------------------------------------

    pub async fn put_message(&self, message: &EncryptedMessage) -> Result<(), StoreError> {
        self.blobs
            .put(
                &message_key(&message.channel_id, &message.id),
                Self::encode(message)?,
            )
            .await?;
        Ok(())
    }

    /// List a channel's live messages, newest first.
    ///
    /// TTL-expired envelopes are invisible here regardless of whether the
    /// sweeper has physically removed them yet. `before`/`after` bound
    /// the timestamps exclusively; `limit` truncates after ordering.
    pub async fn list_messages(
        &self,
        channel: &ChannelRecord,
        query: &MessageQuery,
        now: i64,
    ) -> Result<Vec<EncryptedMessage>, StoreError> {
        let ttl = channel.message_ttl_seconds();
        let mut messages = Vec::new();
        for key in self.blobs.list(&messages_prefix(&channel.id)).await? {
            let Some(message) = self.get_record::<EncryptedMessage>(&key).await? else {
                continue;
            };
            if message.is_expired(ttl, now) {
                continue;
            }
            if let Some(before) = query.before {
                if message.timestamp >= before {
                    continue;
                }
            }
            if let Some(after) = query.after {
                if message.timestamp <= after {
                    continue;
                }
            }
            messages.push(message);
        }
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages.truncate(query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT));
        Ok(messages)
    }

    /// All live messages of a channel, unordered page-free form used for
    /// statistics.
    pub async fn all_messages(
        &self,
        channel: &ChannelRecord,
    ) -> Result<Vec<EncryptedMessage>, StoreError> {
        let mut messages = Vec::new();
        for key in self.blobs.list(&messages_prefix(&channel.id)).await? {
            if let Some(message) = self.get_record::<EncryptedMessage>(&key).await? {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    /// Physically delete a channel's TTL-expired messages. Returns how
    /// many objects were dropped.
    pub async fn sweep_channel(
        &self,
        channel: &ChannelRecord,
        now: i64,
    ) -> Result<usize, StoreError> {
        let Some(ttl) = channel.message_ttl_seconds() else {
            return Ok(0);
        };
        let mut swept = 0;
        for key in self.blobs.list(&messages_prefix(&channel.id)).await? {
            let Some(message) = self.get_record::<EncryptedMessage>(&key).await? else {
                continue;
            };
            if message.is_expired(Some(ttl), now) {
                self.blobs.delete(&key).await?;
                swept += 1;
            }
        }
        Ok(swept)
    }

    /// Sweep every channel in the namespace. Returns the total number of
    /// expired messages dropped.
    pub async fn sweep_expired(&self, now: i64) -> Result<usize, StoreError> {
        let mut swept = 0;
        for id in self.list_channel_ids().await? {
            if let Some(channel) = self.get_channel(&id).await? {
                swept += self.sweep_channel(&channel, now).await?;
            }
        }
        Ok(swept)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
