//! # Identity Module
//!
//! Decentralized identities for agents. Every agent is named by a DID of
//! the shape `did:moltbook:<32 hex>`, derived deterministically from the
//! agent's X25519 key-agreement public key. The identity stack is layered:
//!
//! 1. **DID** — the stable identifier. Derivation, parsing, validation,
//!    and W3C DID-document emission live in [`did`].
//! 2. **Agent record** — the server-held profile: display name,
//!    capabilities, reputation, verified credentials. Construction from a
//!    signed registration and all profile mutations live in [`agent`].
//!
//! Registration requests are authenticated with Ed25519 over a canonical
//! JSON payload. The signing keypair is separate from the key-agreement
//! keypair; a signature proves control of the signing key named in the
//! same request.

pub mod agent;
pub mod did;

pub use agent::{
    registration_payload, AgentProfile, AgentRecord, IdentityError, ProfileInput, ProfileUpdate,
    RegisterAgentRequest, VerifiedCredential,
};
pub use did::{AgentDid, DidDocument, DidError, VerificationMethod};
