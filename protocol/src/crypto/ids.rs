//! Unguessable identifier generation.
//!
//! Every server-assigned id (channel, invitation, message) is 128 bits of
//! OS randomness rendered as 32 lowercase hex characters, optionally
//! behind a short prefix joined with `-`. Identifiers double as storage
//! key components, so they must be safe in a flat blob namespace: hex is.

use rand::RngCore;

use crate::config::{
    CHANNEL_ID_PREFIX, ID_ENTROPY_BYTES, INVITATION_ID_PREFIX, MESSAGE_ID_PREFIX,
};

/// Generate a 128-bit random identifier, optionally prefixed.
///
/// `generate_id(Some("msg"))` yields `msg-<32 hex>`; `generate_id(None)`
/// yields the bare 32 hex characters.
pub fn generate_id(prefix: Option<&str>) -> String {
    let mut bytes = [0u8; ID_ENTROPY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let body = hex::encode(bytes);
    match prefix {
        Some(p) => format!("{p}-{body}"),
        None => body,
    }
}

/// Fresh channel id: `chan-<32 hex>`.
pub fn channel_id() -> String {
    generate_id(Some(CHANNEL_ID_PREFIX))
}

/// Fresh invitation id: `inv-<32 hex>`.
pub fn invitation_id() -> String {
    generate_id(Some(INVITATION_ID_PREFIX))
}

/// Fresh message id: `msg-<32 hex>`.
pub fn message_id() -> String {
    generate_id(Some(MESSAGE_ID_PREFIX))
}
