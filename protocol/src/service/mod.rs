//! # Service Façade
//!
//! Translates authenticated external requests into component calls and
//! nothing else: no domain logic lives here beyond sequencing. Each
//! public method corresponds to one row of the HTTP surface (plus a few
//! internal operations with no route, like reputation adjustment and the
//! external verifier signal).
//!
//! Every method that the surface marks 🔒 takes the already-authenticated
//! caller record; [`PrivacyService::authenticate`] resolves the
//! `X-Agent-DID` header value into that record.
//!
//! ## Partial failure
//!
//! Channel creation persists the channel first, then each invitation. A
//! failure mid-way is not rolled back: surviving invitations stay valid
//! and the missing ones must be reissued. Multi-object transactions on a
//! blob store are not worth their cost here.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use crate::channel::{
    build_channel_with_invitations, build_envelope, channel_stats, evaluate_access, AccessPolicy,
    ChannelError, ChannelRecord, ChannelStats, CreateChannelRequest, EncryptedMessage, Invitation,
    InvitationError, InvitationStatus, MessageError, MessageQuery, SendMessageRequest,
};
use crate::config::MAX_MESSAGE_LIMIT;
use crate::crypto::CryptoError;
use crate::identity::{
    AgentDid, AgentRecord, IdentityError, ProfileUpdate, RegisterAgentRequest,
};
use crate::storage::{AgentSearchQuery, BlobStore, PrivacyStore, StoreError};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error taxonomy of the façade, one variant per HTTP status family.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 400 — malformed input, unknown policy tag, limit beyond cap.
    #[error("{0}")]
    BadRequest(String),

    /// 401 — missing header, invalid DID format, unregistered agent.
    #[error("{0}")]
    Unauthorized(String),

    /// 403 — authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// 404 — unknown agent, channel, or invitation.
    #[error("{0}")]
    NotFound(String),

    /// 409 — duplicate registration on the same public key.
    #[error("{0}")]
    Conflict(String),

    /// 400 — opaque cryptographic failure. Cause never distinguished.
    #[error("cryptographic failure")]
    Crypto(#[from] CryptoError),

    /// 500 — storage failure, propagated and logged, never retried here.
    #[error("storage failure")]
    Storage(#[from] StoreError),
}

impl ServiceError {
    /// The HTTP status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) | ServiceError::Crypto(_) => 400,
            ServiceError::Unauthorized(_) => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Storage(_) => 500,
        }
    }

    /// Advisory hint text for the response envelope. Never machine-parsed.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ServiceError::Unauthorized(_) => {
                Some("Register the agent, then pass its DID in the X-Agent-DID header")
            }
            ServiceError::Conflict(_) => Some("Each public key registers exactly once"),
            _ => None,
        }
    }
}

impl From<IdentityError> for ServiceError {
    fn from(e: IdentityError) -> Self {
        ServiceError::BadRequest(e.to_string())
    }
}

impl From<ChannelError> for ServiceError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::NotAuthorized => ServiceError::Forbidden(e.to_string()),
            _ => ServiceError::BadRequest(e.to_string()),
        }
    }
}

impl From<InvitationError> for ServiceError {
    fn from(e: InvitationError) -> Self {
        ServiceError::BadRequest(e.to_string())
    }
}

impl From<MessageError> for ServiceError {
    fn from(e: MessageError) -> Self {
        ServiceError::BadRequest(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Request bodies owned by the façade
// ---------------------------------------------------------------------------

/// The body of `POST /agents/:did/nft`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCredentialRequest {
    pub contract: String,
    pub asset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// PrivacyService
// ---------------------------------------------------------------------------

/// The privacy layer's service façade over a blob store.
pub struct PrivacyService {
    store: PrivacyStore,
}

impl PrivacyService {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store: PrivacyStore::new(blobs),
        }
    }

    /// Direct access to the storage adapter, for tooling and tests.
    pub fn store(&self) -> &PrivacyStore {
        &self.store
    }

    // -- Authentication -----------------------------------------------------

    /// Resolve an `X-Agent-DID` header value into the caller's record.
    ///
    /// Fails closed: a missing header, a malformed DID, and an
    /// unregistered DID are all 401.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AgentRecord, ServiceError> {
        let raw = header
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Missing X-Agent-DID header".into()))?;
        let did = AgentDid::parse(raw)
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))?;
        self.store
            .get_agent(did.as_str())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Unknown agent DID".into()))
    }

    // -- Agents -------------------------------------------------------------

    /// `POST /agents/register`
    pub async fn register_agent(
        &self,
        request: &RegisterAgentRequest,
    ) -> Result<AgentRecord, ServiceError> {
        let agent = AgentRecord::from_registration(request, now_ms())?;
        if self.store.agent_exists(agent.did.as_str()).await? {
            return Err(ServiceError::Conflict("Agent already registered".into()));
        }
        self.store.put_agent(&agent).await?;
        tracing::info!(did = %agent.did, "agent registered");
        Ok(agent)
    }

    /// `GET /agents/:did`
    pub async fn get_agent(&self, did: &str) -> Result<AgentRecord, ServiceError> {
        let did = AgentDid::parse(did).map_err(|e| ServiceError::BadRequest(e.to_string()))?;
        self.store
            .get_agent(did.as_str())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Agent not found".into()))
    }

    /// `GET /agents/search`
    pub async fn search_agents(
        &self,
        query: &AgentSearchQuery,
    ) -> Result<Vec<AgentRecord>, ServiceError> {
        Ok(self.store.search_agents(query).await?)
    }

    /// `PATCH /agents/:did` — self-service only.
    pub async fn update_profile(
        &self,
        caller: &AgentRecord,
        did: &str,
        update: &ProfileUpdate,
    ) -> Result<AgentRecord, ServiceError> {
        if caller.did.as_str() != did {
            return Err(ServiceError::Unauthorized(
                "Agents may only update their own profile".into(),
            ));
        }
        let mut agent = self.get_agent(did).await?;
        agent.apply_profile_update(update);
        self.store.put_agent(&agent).await?;
        Ok(agent)
    }

    /// `POST /agents/:did/nft` — attach an (unverified) credential.
    pub async fn add_credential(
        &self,
        caller: &AgentRecord,
        did: &str,
        request: &AddCredentialRequest,
    ) -> Result<AgentRecord, ServiceError> {
        if caller.did.as_str() != did {
            return Err(ServiceError::Unauthorized(
                "Agents may only attach credentials to their own profile".into(),
            ));
        }
        if request.contract.is_empty() || request.asset_id.is_empty() {
            return Err(ServiceError::BadRequest("Missing required fields".into()));
        }
        let mut agent = self.get_agent(did).await?;
        agent.add_credential(&request.contract, &request.asset_id, request.schema.as_deref());
        self.store.put_agent(&agent).await?;
        Ok(agent)
    }

    /// External verifier signal: mark a credential verified. No route;
    /// invoked by the ownership verifier out of band.
    pub async fn verify_credential(
        &self,
        did: &str,
        contract: &str,
        asset_id: &str,
    ) -> Result<AgentRecord, ServiceError> {
        let mut agent = self.get_agent(did).await?;
        if !agent.mark_credential_verified(contract, asset_id, now_ms()) {
            return Err(ServiceError::NotFound("Credential not found".into()));
        }
        self.store.put_agent(&agent).await?;
        tracing::info!(did = %agent.did, contract, asset_id, "credential verified");
        Ok(agent)
    }

    /// Authorized reputation adjustment. No route; reputation moves only
    /// through this operation and always stays in `[0, 100]`.
    pub async fn adjust_reputation(
        &self,
        did: &str,
        delta: i32,
    ) -> Result<AgentRecord, ServiceError> {
        let mut agent = self.get_agent(did).await?;
        let new = agent.adjust_reputation(delta);
        self.store.put_agent(&agent).await?;
        tracing::debug!(did = %agent.did, delta, reputation = new, "reputation adjusted");
        Ok(agent)
    }

    // -- Channels -----------------------------------------------------------

    /// `POST /channels`
    ///
    /// Resolves every invitee, builds the channel plus invitation set,
    /// and persists channel first, then each invitation.
    pub async fn create_channel(
        &self,
        caller: &AgentRecord,
        request: &CreateChannelRequest,
    ) -> Result<(ChannelRecord, Vec<Invitation>), ServiceError> {
        if request.invitee_dids.is_empty() {
            return Err(ServiceError::BadRequest(
                "At least one invitee is required".into(),
            ));
        }

        let mut invitees = Vec::with_capacity(request.invitee_dids.len());
        for raw in &request.invitee_dids {
            let did =
                AgentDid::parse(raw).map_err(|e| ServiceError::BadRequest(e.to_string()))?;
            if !self.store.agent_exists(did.as_str()).await? {
                return Err(ServiceError::BadRequest(format!("Agent not found: {raw}")));
            }
            invitees.push(did);
        }

        let (channel, invitations) =
            build_channel_with_invitations(&caller.did, &invitees, request, now_ms())?;

        self.store.save_channel(&channel).await?;
        for invitation in &invitations {
            self.store.save_invitation(invitation).await?;
        }

        tracing::info!(
            channel = %channel.id,
            creator = %caller.did,
            invitations = invitations.len(),
            "channel created"
        );
        Ok((channel, invitations))
    }

    /// `GET /channels` — the caller's channels with statistics.
    pub async fn list_channels(
        &self,
        caller: &AgentRecord,
    ) -> Result<Vec<(ChannelRecord, ChannelStats)>, ServiceError> {
        let now = now_ms();
        let mut result = Vec::new();
        for channel in self.store.channels_for_agent(caller.did.as_str()).await? {
            let messages = self.store.all_messages(&channel).await?;
            let stats = channel_stats(&channel, &messages, now);
            result.push((channel, stats));
        }
        Ok(result)
    }

    /// `GET /channels/:id` — access-controlled.
    pub async fn get_channel(
        &self,
        caller: &AgentRecord,
        channel_id: &str,
    ) -> Result<(ChannelRecord, ChannelStats), ServiceError> {
        let channel = self.require_channel(channel_id).await?;
        self.require_access(&channel, caller)?;
        let messages = self.store.all_messages(&channel).await?;
        let stats = channel_stats(&channel, &messages, now_ms());
        Ok((channel, stats))
    }

    /// `POST /channels/:id/join`
    pub async fn join_channel(
        &self,
        caller: &AgentRecord,
        channel_id: &str,
    ) -> Result<ChannelRecord, ServiceError> {
        let mut channel = self.require_channel(channel_id).await?;
        self.require_access(&channel, caller)?;
        if channel.add_participant(&caller.did)? {
            self.store.save_channel(&channel).await?;
            tracing::info!(channel = %channel.id, did = %caller.did, "participant joined");
        }
        Ok(channel)
    }

    /// `POST /channels/:id/leave` — self-leave.
    pub async fn leave_channel(
        &self,
        caller: &AgentRecord,
        channel_id: &str,
    ) -> Result<(), ServiceError> {
        let mut channel = self.require_channel(channel_id).await?;
        if !channel.is_participant(&caller.did) {
            return Err(ServiceError::BadRequest("Not a channel participant".into()));
        }
        channel
            .remove_participant(&caller.did, &caller.did)
            .map_err(|e| ServiceError::BadRequest(e.to_string()))?;
        self.store.save_channel(&channel).await?;
        self.store
            .remove_channel_from_index(caller.did.as_str(), channel_id)
            .await?;
        tracing::info!(channel = %channel.id, did = %caller.did, "participant left");
        Ok(())
    }

    /// Moderation: the creator removes another participant. No route in
    /// the public surface; exposed for operator tooling.
    pub async fn remove_participant(
        &self,
        caller: &AgentRecord,
        channel_id: &str,
        target: &str,
    ) -> Result<ChannelRecord, ServiceError> {
        let target =
            AgentDid::parse(target).map_err(|e| ServiceError::BadRequest(e.to_string()))?;
        let mut channel = self.require_channel(channel_id).await?;
        channel.remove_participant(&caller.did, &target)?;
        self.store.save_channel(&channel).await?;
        self.store
            .remove_channel_from_index(target.as_str(), channel_id)
            .await?;
        Ok(channel)
    }

    /// Replace a channel's access policy. Creator only.
    pub async fn update_access_policy(
        &self,
        caller: &AgentRecord,
        channel_id: &str,
        policy: AccessPolicy,
    ) -> Result<ChannelRecord, ServiceError> {
        let mut channel = self.require_channel(channel_id).await?;
        channel.set_access_policy(&caller.did, policy)?;
        self.store.save_channel(&channel).await?;
        Ok(channel)
    }

    // -- Invitations --------------------------------------------------------

    /// `GET /invitations` — the caller's pending invitations.
    pub async fn list_invitations(
        &self,
        caller: &AgentRecord,
    ) -> Result<Vec<Invitation>, ServiceError> {
        Ok(self
            .store
            .pending_invitations(caller.did.as_str(), now_ms())
            .await?)
    }

    /// `POST /invitations/:id/accept`
    ///
    /// On time, transitions to accepted and adds the caller to the
    /// channel. Past the deadline, transitions to expired and returns the
    /// expired record without touching the channel.
    pub async fn accept_invitation(
        &self,
        caller: &AgentRecord,
        invitation_id: &str,
    ) -> Result<Invitation, ServiceError> {
        let mut invitation = self.require_invitation(invitation_id).await?;
        if invitation.invitee != caller.did {
            return Err(ServiceError::Forbidden(
                "Invitation not addressed to caller".into(),
            ));
        }

        let status = invitation.accept(now_ms())?;
        self.store.update_invitation(&invitation).await?;

        if status == InvitationStatus::Accepted {
            let mut channel = self.require_channel(&invitation.channel_id).await?;
            if channel.add_participant(&caller.did)? {
                self.store.save_channel(&channel).await?;
            }
            tracing::info!(
                invitation = %invitation.id,
                channel = %invitation.channel_id,
                did = %caller.did,
                "invitation accepted"
            );
        }
        Ok(invitation)
    }

    /// `POST /invitations/:id/reject`
    pub async fn reject_invitation(
        &self,
        caller: &AgentRecord,
        invitation_id: &str,
    ) -> Result<Invitation, ServiceError> {
        let mut invitation = self.require_invitation(invitation_id).await?;
        if invitation.invitee != caller.did {
            return Err(ServiceError::Forbidden(
                "Invitation not addressed to caller".into(),
            ));
        }
        invitation.reject(now_ms())?;
        self.store.update_invitation(&invitation).await?;
        Ok(invitation)
    }

    // -- Messages -----------------------------------------------------------

    /// `POST /channels/:id/messages`
    pub async fn send_message(
        &self,
        caller: &AgentRecord,
        channel_id: &str,
        request: &SendMessageRequest,
    ) -> Result<EncryptedMessage, ServiceError> {
        let channel = self.require_channel(channel_id).await?;
        let message = build_envelope(&channel, &caller.did, request, now_ms())?;
        self.store.put_message(&message).await?;
        tracing::debug!(channel = %channel.id, message = %message.id, "message stored");
        Ok(message)
    }

    /// `GET /channels/:id/messages` — access-controlled, paginated.
    pub async fn get_messages(
        &self,
        caller: &AgentRecord,
        channel_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<EncryptedMessage>, ServiceError> {
        if let Some(limit) = query.limit {
            if limit > MAX_MESSAGE_LIMIT {
                return Err(ServiceError::BadRequest(format!(
                    "Limit must be at most {MAX_MESSAGE_LIMIT}"
                )));
            }
        }
        let channel = self.require_channel(channel_id).await?;
        self.require_access(&channel, caller)?;
        Ok(self.store.list_messages(&channel, query, now_ms()).await?)
    }

    /// Drop every TTL-expired message in the namespace. Run periodically
    /// by the node. Returns the number of objects removed.
    pub async fn sweep_expired(&self) -> Result<usize, ServiceError> {
        let swept = self.store.sweep_expired(now_ms()).await?;
        if swept > 0 {
            tracing::info!(swept, "expired messages swept");
        }
        Ok(swept)
    }

    // -- Internal helpers ---------------------------------------------------

    async fn require_channel(&self, channel_id: &str) -> Result<ChannelRecord, ServiceError> {
        self.store
            .get_channel(channel_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Channel not found".into()))
    }

    async fn require_invitation(&self, invitation_id: &str) -> Result<Invitation, ServiceError> {
        self.store
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invitation not found".into()))
    }

    fn require_access(
        &self,
        channel: &ChannelRecord,
        caller: &AgentRecord,
    ) -> Result<(), ServiceError> {
        let decision = evaluate_access(channel, caller);
        if !decision.allowed {
            return Err(ServiceError::Forbidden(
                decision.reason.unwrap_or_else(|| "Access denied".into()),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
