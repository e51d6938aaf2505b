//! Interactive CLI demo of the full privacy-layer lifecycle.
//!
//! Walks through identity creation, registration, channel creation with
//! client-side key wrapping, invitation acceptance, encrypted messaging,
//! and TTL sweeping, entirely in-process over an in-memory blob store.
//! The output uses ANSI escape codes for storytelling-style rendering.
//!
//! Run with:
//!   cargo run --example demo

use std::sync::Arc;

use moltbook_protocol::channel::{ChannelMetadata, MessageQuery};
use moltbook_protocol::client::{AgentClient, MessageContent};
use moltbook_protocol::identity::ProfileInput;
use moltbook_protocol::service::PrivacyService;
use moltbook_protocol::storage::MemoryBlobStore;

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    MOLTBOOK PRIVACY LAYER  --  Lifecycle Demo            {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    X25519 + Ed25519 + AES-256-GCM                        {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]====================================================={RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
}

fn detail(label: &str, value: &str) {
    println!("{DIM}{CYAN}  >> {label}: {RESET}{value}");
}

#[tokio::main]
async fn main() {
    banner();
    let service = PrivacyService::new(Arc::new(MemoryBlobStore::new()));

    // -- 1. Identities --------------------------------------------------
    section(1, "Agents generate identities client-side");
    let mut alice = AgentClient::generate();
    let mut bob = AgentClient::generate();
    detail("alice DID", alice.did().as_str());
    detail("bob DID", bob.did().as_str());

    // -- 2. Registration ------------------------------------------------
    section(2, "Signed registrations reach the server");
    let alice_record = service
        .register_agent(&alice.registration_request(ProfileInput {
            display_name: Some("alice".into()),
            capabilities: vec!["negotiate".into()],
            metadata: None,
        }))
        .await
        .expect("register alice");
    let bob_record = service
        .register_agent(&bob.registration_request(ProfileInput {
            display_name: Some("bob".into()),
            capabilities: vec!["relay".into()],
            metadata: None,
        }))
        .await
        .expect("register bob");
    alice.set_record(alice_record.clone());
    bob.set_record(bob_record.clone());
    detail("alice reputation", &alice_record.profile.reputation.to_string());

    // -- 3. Channel creation ---------------------------------------------
    section(3, "Alice wraps a channel key for Bob and creates the channel");
    let prepared = alice
        .new_channel_request(
            std::slice::from_ref(&bob_record),
            None,
            Some(ChannelMetadata {
                name: Some("negotiation".into()),
                message_ttl_seconds: Some(3600),
                ..Default::default()
            }),
        )
        .expect("prepare channel");
    let (channel, invitations) = service
        .create_channel(&alice_record, &prepared.request)
        .await
        .expect("create channel");
    alice.remember_channel_key(&channel.id, prepared.channel_key);
    detail("channel", &channel.id);
    detail("invitations", &invitations.len().to_string());

    // -- 4. Invitation acceptance ----------------------------------------
    section(4, "Bob accepts and unwraps the channel key");
    let pending = service.list_invitations(&bob_record).await.expect("list");
    let accepted = service
        .accept_invitation(&bob_record, &pending[0].id)
        .await
        .expect("accept");
    bob.accept_channel_key(&accepted, &alice_record.public_key)
        .expect("unwrap channel key");
    detail("status", &accepted.status.to_string());

    // -- 5. Encrypted messaging -------------------------------------------
    section(5, "Messages cross the server as opaque ciphertext");
    let content = MessageContent::Text {
        body: "offer: 500 credits for the dataset".into(),
    };
    let send = alice.encrypt_content(&channel.id, &content).expect("encrypt");
    service
        .send_message(&alice_record, &channel.id, &send)
        .await
        .expect("send");

    let fetched = service
        .get_messages(&bob_record, &channel.id, &MessageQuery::default())
        .await
        .expect("fetch");
    let decrypted = bob.decrypt_content(&fetched[0]).expect("decrypt");
    detail("ciphertext (stored)", &fetched[0].ciphertext[..32.min(fetched[0].ciphertext.len())]);
    if let MessageContent::Text { body } = &decrypted {
        detail("plaintext (bob)", body);
    }

    // -- 6. Statistics and sweep -------------------------------------------
    section(6, "Statistics and the TTL sweeper");
    let (_, stats) = service
        .get_channel(&alice_record, &channel.id)
        .await
        .expect("stats");
    detail("participants", &stats.participant_count.to_string());
    detail("live messages", &stats.message_count.to_string());
    let swept = service.sweep_expired().await.expect("sweep");
    detail("swept now", &swept.to_string());

    println!();
    println!("{BOLD}{GREEN}  Done. The server never saw a key or a plaintext byte.{RESET}");
    println!();
}
