//! # Channel Module
//!
//! Channel lifecycle and everything scoped to a channel: the participant
//! set, access-control policy, the invitation state machine, encrypted
//! message envelopes, TTL expiry, and statistics.
//!
//! Nothing in this module touches storage or crypto beyond carrying
//! opaque wrapped-key blobs. Functions here are pure over their inputs,
//! which keeps every rule in §access-control and the invitation state
//! machine unit-testable without a blob store.

pub mod access;
pub mod channel;
pub mod invitation;
pub mod message;

pub use access::{evaluate_access, AccessDecision, AccessPolicy};
pub use channel::{
    build_channel_with_invitations, ChannelError, ChannelMetadata, ChannelRecord,
    CreateChannelRequest, EncryptionAlgorithm, EncryptionConfig, EncryptionScheme,
};
pub use invitation::{Invitation, InvitationError, InvitationStatus};
pub use message::{
    build_envelope, channel_stats, ChannelStats, EncryptedMessage, MessageError, MessageQuery,
    SendMessageRequest,
};
