//! # Storage
//!
//! Two layers. [`blob`] is the abstract key/value blob interface the
//! privacy layer is written against, with an in-memory implementation for
//! tests and embedded use and a sled-backed one for durable single-node
//! deployments. [`adapter`] maps core entities onto the flat `privacy/`
//! namespace, maintains the per-agent secondary indices, and implements
//! search, pagination, cascade deletes, and the TTL sweeper.
//!
//! The key shapes the adapter writes are a public contract; backup and
//! migration tooling walks them directly.

pub mod adapter;
pub mod blob;

pub use adapter::{AgentSearchQuery, PrivacyStore, StoreError};
pub use blob::{BlobError, BlobStore, MemoryBlobStore, SledBlobStore};
