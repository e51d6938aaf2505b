//! # Protocol Configuration & Constants
//!
//! Every magic number in the privacy layer lives here. The storage key
//! prefixes in particular are a public contract: external backup and
//! migration tooling walks these exact paths, so changing them is a
//! breaking change to the persisted-state interface.

// ---------------------------------------------------------------------------
// DID Method
// ---------------------------------------------------------------------------

/// DID method name. Every agent identifier is `did:moltbook:<identifier>`.
pub const DID_METHOD: &str = "moltbook";

/// Length of the method-specific identifier: the first 32 lowercase hex
/// characters of SHA-256 over the agent's key-agreement public key text.
pub const DID_IDENTIFIER_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// X25519 for pairwise key agreement. Montgomery-form Curve25519.
pub const KEY_AGREEMENT_ALGORITHM: &str = "X25519";

/// Ed25519 for registration signatures. A dedicated signing keypair,
/// never shared with the key-agreement keypair.
pub const SIGNING_ALGORITHM: &str = "Ed25519";

/// AES-256-GCM for every symmetric operation: message payloads client-side
/// and channel-key wrapping.
pub const SYMMETRIC_ALGORITHM: &str = "AES-256-GCM";

/// Raw public key length for both X25519 and Ed25519 keys.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// AES-256-GCM key length in bytes. Also the channel key length.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. 96 bits, the standard GCM nonce size.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes. Appended to ciphertext.
pub const AES_TAG_LENGTH: usize = 16;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Entropy per generated identifier: 16 bytes rendered as 32 lowercase
/// hex characters. Identifiers must be unguessable.
pub const ID_ENTROPY_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// Identifier Prefixes
// ---------------------------------------------------------------------------

/// Prefix for message envelope ids: `msg-<32 hex>`.
pub const MESSAGE_ID_PREFIX: &str = "msg";

/// Prefix for invitation ids: `inv-<32 hex>`.
pub const INVITATION_ID_PREFIX: &str = "inv";

/// Prefix for channel ids: `chan-<32 hex>`.
pub const CHANNEL_ID_PREFIX: &str = "chan";

// ---------------------------------------------------------------------------
// Identity Parameters
// ---------------------------------------------------------------------------

/// Reputation assigned to every agent at registration, regardless of
/// anything the registration request claims.
pub const INITIAL_REPUTATION: u8 = 50;

/// Upper reputation bound. Adjustments clamp to `[0, MAX_REPUTATION]`.
pub const MAX_REPUTATION: u8 = 100;

// ---------------------------------------------------------------------------
// Channel Parameters
// ---------------------------------------------------------------------------

/// Invitation lifetime: 7 days in milliseconds. A pending invitation
/// observed past `created_at + INVITATION_TTL_MS` is expired.
pub const INVITATION_TTL_MS: i64 = 7 * 86_400_000;

/// Default page size for message listing when the caller gives no limit.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Hard cap on message listing page size. Requests beyond this are
/// rejected, not clamped.
pub const MAX_MESSAGE_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Storage Namespace
// ---------------------------------------------------------------------------
//
// Key shapes (DIDs are URL-encoded in keys):
//
// | Record                | Key                                              |
// |-----------------------|--------------------------------------------------|
// | Agent                 | privacy/agents/<did>.json                        |
// | Agent channel index   | privacy/agents/<did>/channels.json               |
// | Agent invite index    | privacy/agents/<did>/invitations.json            |
// | Channel               | privacy/channels/<channel id>/metadata.json      |
// | Message               | privacy/channels/<channel id>/messages/<id>.json |
// | Invitation            | privacy/invitations/<invitation id>.json         |

/// Root of the privacy namespace inside the blob store.
pub const STORAGE_ROOT: &str = "privacy";

/// Prefix for agent records and per-agent indices.
pub const AGENTS_PREFIX: &str = "privacy/agents/";

/// Prefix for channel metadata and message objects.
pub const CHANNELS_PREFIX: &str = "privacy/channels/";

/// Prefix for invitation records.
pub const INVITATIONS_PREFIX: &str = "privacy/invitations/";

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The request header naming the authenticated caller's DID.
pub const AGENT_DID_HEADER: &str = "x-agent-did";

/// Common prefix under which the HTTP surface is mounted.
pub const API_PREFIX: &str = "/privacy";

/// Default API port for the node binary.
pub const DEFAULT_API_PORT: u16 = 8730;

/// Default Prometheus metrics port for the node binary.
pub const DEFAULT_METRICS_PORT: u16 = 8731;
