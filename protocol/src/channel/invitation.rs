//! # Invitation State Machine
//!
//! An invitation conveys a wrapped channel key from inviter to invitee
//! and tracks acceptance state.
//!
//! ```text
//!            ┌──────────┐  accept (in time)   ┌──────────┐
//!            │          ├────────────────────>│ accepted │
//!            │          │                     └──────────┘
//!            │ pending  │  reject             ┌──────────┐
//!            │          ├────────────────────>│ rejected │
//!            │          │                     └──────────┘
//!            │          │  accept (too late)  ┌──────────┐
//!            │          ├────────────────────>│ expired  │
//!            └────┬─────┘  or lazily on read  └──────────┘
//!                 └──────────────────────────────────^
//! ```
//!
//! Accepted, rejected, and expired are terminal. Acting on a terminal
//! invitation is an illegal-state error; expiry is monotonic and a lost
//! concurrent write can never resurrect `pending`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::INVITATION_TTL_MS;
use crate::crypto::ids::invitation_id;
use crate::crypto::WrappedChannelKey;
use crate::identity::AgentDid;

/// Invitation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl InvitationStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
            InvitationStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// Errors acting on an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvitationError {
    /// The invitation is already in a terminal state.
    #[error("Illegal state: invitation is {0}")]
    IllegalState(InvitationStatus),
}

/// A first-class invitation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub channel_id: String,
    pub inviter: AgentDid,
    pub invitee: AgentDid,
    /// Creation timestamp (ms).
    pub created_at: i64,
    /// Hard expiry: `created_at` + 7 days.
    pub expires_at: i64,
    /// The channel key wrapped for the invitee. Opaque to the server.
    pub wrapped_key: WrappedChannelKey,
    pub status: InvitationStatus,
}

impl Invitation {
    /// Create a pending invitation expiring 7 days from `now`.
    pub fn new(
        channel_id: &str,
        inviter: &AgentDid,
        invitee: &AgentDid,
        wrapped_key: WrappedChannelKey,
        now: i64,
    ) -> Self {
        Self {
            id: invitation_id(),
            channel_id: channel_id.to_string(),
            inviter: inviter.clone(),
            invitee: invitee.clone(),
            created_at: now,
            expires_at: now + INVITATION_TTL_MS,
            wrapped_key,
            status: InvitationStatus::Pending,
        }
    }

    /// Whether the expiry deadline has passed.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// Lazily promote an overdue pending invitation to expired.
    ///
    /// Returns `true` when the status changed (the caller should persist
    /// the transition). Terminal states are untouched.
    pub fn expire_if_due(&mut self, now: i64) -> bool {
        if self.status == InvitationStatus::Pending && self.is_expired(now) {
            self.status = InvitationStatus::Expired;
            return true;
        }
        false
    }

    /// Accept the invitation.
    ///
    /// On time: transitions to `accepted`. Past the deadline: transitions
    /// to `expired` instead; the caller gets the resulting status either
    /// way and decides what to do with the record. From a terminal state:
    /// illegal.
    pub fn accept(&mut self, now: i64) -> Result<InvitationStatus, InvitationError> {
        if self.status.is_terminal() {
            return Err(InvitationError::IllegalState(self.status));
        }
        self.status = if self.is_expired(now) {
            InvitationStatus::Expired
        } else {
            InvitationStatus::Accepted
        };
        Ok(self.status)
    }

    /// Reject the invitation. Only a live pending invitation can be
    /// rejected; an overdue one expires instead.
    pub fn reject(&mut self, now: i64) -> Result<InvitationStatus, InvitationError> {
        if self.status.is_terminal() {
            return Err(InvitationError::IllegalState(self.status));
        }
        self.status = if self.is_expired(now) {
            InvitationStatus::Expired
        } else {
            InvitationStatus::Rejected
        };
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn did(tag: char) -> AgentDid {
        AgentDid::parse(&format!("did:moltbook:{}", tag.to_string().repeat(32))).unwrap()
    }

    fn wrapped() -> WrappedChannelKey {
        WrappedChannelKey {
            wrapped: "d3JhcHBlZA==".into(),
            nonce: "bm9uY2U=".into(),
        }
    }

    fn pending(now: i64) -> Invitation {
        Invitation::new("chan-x", &did('a'), &did('b'), wrapped(), now)
    }

    #[test]
    fn new_invitation_is_pending_with_seven_day_expiry() {
        let inv = pending(1_000);
        assert_eq!(inv.status, InvitationStatus::Pending);
        assert_eq!(inv.expires_at - inv.created_at, 7 * 86_400_000);
        assert!(inv.id.starts_with("inv-"));
    }

    #[test]
    fn accept_in_time() {
        let mut inv = pending(0);
        assert_eq!(inv.accept(100).unwrap(), InvitationStatus::Accepted);
        assert_eq!(inv.status, InvitationStatus::Accepted);
    }

    #[test]
    fn accept_exactly_at_expiry_still_succeeds() {
        // The deadline is inclusive: expired means strictly past it.
        let mut inv = pending(0);
        let deadline = inv.expires_at;
        assert_eq!(inv.accept(deadline).unwrap(), InvitationStatus::Accepted);
    }

    #[test]
    fn accept_after_expiry_transitions_to_expired() {
        let now = 10_000;
        let mut inv = pending(now - INVITATION_TTL_MS - 1_000);
        assert_eq!(inv.accept(now).unwrap(), InvitationStatus::Expired);
        assert_eq!(inv.status, InvitationStatus::Expired);
    }

    #[test]
    fn reject_transitions_to_rejected() {
        let mut inv = pending(0);
        assert_eq!(inv.reject(100).unwrap(), InvitationStatus::Rejected);
    }

    #[test]
    fn terminal_states_reject_further_actions() {
        let mut accepted = pending(0);
        accepted.accept(1).unwrap();
        assert_eq!(
            accepted.accept(2).unwrap_err(),
            InvitationError::IllegalState(InvitationStatus::Accepted)
        );
        assert_eq!(
            accepted.reject(2).unwrap_err(),
            InvitationError::IllegalState(InvitationStatus::Accepted)
        );

        let mut rejected = pending(0);
        rejected.reject(1).unwrap();
        assert!(rejected.accept(2).is_err());

        let mut expired = pending(0);
        assert!(expired.expire_if_due(INVITATION_TTL_MS + 1));
        assert_eq!(
            expired.accept(INVITATION_TTL_MS + 2).unwrap_err(),
            InvitationError::IllegalState(InvitationStatus::Expired)
        );
    }

    #[test]
    fn lazy_expiry_flips_only_overdue_pending() {
        let mut live = pending(0);
        assert!(!live.expire_if_due(100));
        assert_eq!(live.status, InvitationStatus::Pending);

        let mut overdue = pending(0);
        assert!(overdue.expire_if_due(INVITATION_TTL_MS + 1));
        assert_eq!(overdue.status, InvitationStatus::Expired);
        // A second sweep reports no change.
        assert!(!overdue.expire_if_due(INVITATION_TTL_MS + 2));
    }

    #[test]
    fn lazy_expiry_never_touches_terminal_states() {
        let mut accepted = pending(0);
        accepted.accept(1).unwrap();
        assert!(!accepted.expire_if_due(i64::MAX));
        assert_eq!(accepted.status, InvitationStatus::Accepted);
    }

    #[test]
    fn status_serializes_lowercase() {
        let inv = pending(0);
        let json = serde_json::to_string(&inv).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"channelId\":\"chan-x\""));
        assert!(json.contains("\"expiresAt\""));
    }

    #[test]
    fn invitation_serde_roundtrip() {
        let inv = pending(42);
        let back: Invitation = serde_json::from_str(&serde_json::to_string(&inv).unwrap()).unwrap();
        assert_eq!(inv, back);
    }
}
