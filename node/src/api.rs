//! # HTTP Façade
//!
//! Builds the axum router exposing the privacy layer, mounted under the
//! `/privacy` prefix. Authentication is the `X-Agent-DID` header;
//! endpoints marked 🔒 require it to resolve to a registered agent.
//!
//! | Method | Path                          | Auth        |
//! |--------|-------------------------------|-------------|
//! | POST   | `/agents/register`            | —           |
//! | GET    | `/agents/search`              | —           |
//! | GET    | `/agents/:did`                | —           |
//! | PATCH  | `/agents/:did`                | 🔒 (self)   |
//! | POST   | `/agents/:did/nft`            | 🔒 (self)   |
//! | POST   | `/channels`                   | 🔒          |
//! | GET    | `/channels`                   | 🔒          |
//! | GET    | `/channels/:id`               | 🔒 (access) |
//! | POST   | `/channels/:id/join`          | 🔒 (access) |
//! | POST   | `/channels/:id/leave`         | 🔒 (member) |
//! | GET    | `/invitations`                | 🔒          |
//! | POST   | `/invitations/:id/accept`     | 🔒 (invitee)|
//! | POST   | `/invitations/:id/reject`     | 🔒 (invitee)|
//! | POST   | `/channels/:id/messages`      | 🔒 (member) |
//! | GET    | `/channels/:id/messages`      | 🔒 (access) |
//!
//! Every response body is the `{success, data?, error?, hint?}` envelope.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use moltbook_protocol::channel::{CreateChannelRequest, MessageQuery, SendMessageRequest};
use moltbook_protocol::config::{AGENT_DID_HEADER, API_PREFIX};
use moltbook_protocol::identity::{AgentRecord, ProfileUpdate, RegisterAgentRequest};
use moltbook_protocol::service::{AddCredentialRequest, PrivacyService, ServiceError};
use moltbook_protocol::storage::AgentSearchQuery;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state for all request handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PrivacyService>,
    pub metrics: SharedMetrics,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Response Envelope
// ---------------------------------------------------------------------------

/// The uniform response envelope.
#[derive(Debug, Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

fn ok(status: StatusCode, data: impl Serialize) -> Response {
    let data = serde_json::to_value(data).expect("response data serializes");
    (
        status,
        Json(ApiResponse {
            success: true,
            data: if data.is_null() { None } else { Some(data) },
            error: None,
            hint: None,
        }),
    )
        .into_response()
}

fn fail(err: ServiceError) -> Response {
    if matches!(err, ServiceError::Storage(_)) {
        tracing::error!(error = %err, "storage failure");
    }
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(err.to_string()),
            hint: err.hint().map(str::to_string),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Build the full axum [`Router`]: the privacy surface under its prefix,
/// a health probe at the root, CORS, and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any);

    let privacy = Router::new()
        .route("/agents/register", post(register_agent))
        .route("/agents/search", get(search_agents))
        .route("/agents/{did}", get(get_agent).patch(update_agent))
        .route("/agents/{did}/nft", post(add_credential))
        .route("/channels", post(create_channel).get(list_channels))
        .route("/channels/{id}", get(get_channel))
        .route("/channels/{id}/join", post(join_channel))
        .route("/channels/{id}/leave", post(leave_channel))
        .route("/channels/{id}/messages", post(send_message).get(get_messages))
        .route("/invitations", get(list_invitations))
        .route("/invitations/{id}/accept", post(accept_invitation))
        .route("/invitations/{id}/reject", post(reject_invitation));

    Router::new()
        .route("/health", get(health_handler))
        .nest(API_PREFIX, privacy)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve the caller from the `X-Agent-DID` header.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AgentRecord, ServiceError> {
    let header = headers
        .get(AGENT_DID_HEADER)
        .and_then(|value| value.to_str().ok());
    state.service.authenticate(header).await
}

// ---------------------------------------------------------------------------
// Query Parameters
// ---------------------------------------------------------------------------

/// `GET /agents/search` query string.
#[derive(Debug, Deserialize)]
struct SearchParams {
    /// Comma-separated capability list; all must match.
    capabilities: Option<String>,
    #[serde(rename = "minReputation")]
    min_reputation: Option<u8>,
    #[serde(rename = "nftContract")]
    nft_contract: Option<String>,
    #[serde(rename = "nftSchema")]
    nft_schema: Option<String>,
}

impl From<SearchParams> for AgentSearchQuery {
    fn from(params: SearchParams) -> Self {
        AgentSearchQuery {
            capabilities: params
                .capabilities
                .map(|csv| {
                    csv.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            min_reputation: params.min_reputation,
            credential_contract: params.nft_contract,
            credential_schema: params.nft_schema,
        }
    }
}

/// `GET /channels/:id/messages` query string.
#[derive(Debug, Deserialize)]
struct MessagesParams {
    limit: Option<usize>,
    before: Option<i64>,
    after: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers — health
// ---------------------------------------------------------------------------

/// `GET /health` — liveness probe for orchestrators.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

// ---------------------------------------------------------------------------
// Handlers — agents
// ---------------------------------------------------------------------------

/// `POST /agents/register`
async fn register_agent(
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> Response {
    match state.service.register_agent(&request).await {
        Ok(agent) => {
            state.metrics.agents_registered_total.inc();
            ok(
                StatusCode::CREATED,
                serde_json::json!({ "did": agent.did, "agent": agent }),
            )
        }
        Err(err) => fail(err),
    }
}

/// `GET /agents/search`
async fn search_agents(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.service.search_agents(&params.into()).await {
        Ok(agents) => ok(StatusCode::OK, agents),
        Err(err) => fail(err),
    }
}

/// `GET /agents/:did`
async fn get_agent(State(state): State<AppState>, Path(did): Path<String>) -> Response {
    match state.service.get_agent(&did).await {
        Ok(agent) => ok(StatusCode::OK, agent),
        Err(err) => fail(err),
    }
}

/// `PATCH /agents/:did` — self only.
async fn update_agent(
    State(state): State<AppState>,
    Path(did): Path<String>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.update_profile(&caller, &did, &update).await {
        Ok(agent) => ok(StatusCode::OK, agent),
        Err(err) => fail(err),
    }
}

/// `POST /agents/:did/nft` — self only.
async fn add_credential(
    State(state): State<AppState>,
    Path(did): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AddCredentialRequest>,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.add_credential(&caller, &did, &request).await {
        Ok(agent) => ok(StatusCode::OK, agent),
        Err(err) => fail(err),
    }
}

// ---------------------------------------------------------------------------
// Handlers — channels
// ---------------------------------------------------------------------------

/// `POST /channels`
async fn create_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateChannelRequest>,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.create_channel(&caller, &request).await {
        Ok((channel, invitations)) => {
            state.metrics.channels_created_total.inc();
            state
                .metrics
                .invitations_issued_total
                .inc_by(invitations.len() as u64);
            ok(
                StatusCode::CREATED,
                serde_json::json!({ "channel": channel, "invitations": invitations }),
            )
        }
        Err(err) => fail(err),
    }
}

/// `GET /channels` — the caller's channels with statistics.
async fn list_channels(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.list_channels(&caller).await {
        Ok(channels) => {
            let data: Vec<serde_json::Value> = channels
                .into_iter()
                .map(|(channel, stats)| {
                    serde_json::json!({ "channel": channel, "stats": stats })
                })
                .collect();
            ok(StatusCode::OK, data)
        }
        Err(err) => fail(err),
    }
}

/// `GET /channels/:id`
async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.get_channel(&caller, &id).await {
        Ok((channel, stats)) => ok(
            StatusCode::OK,
            serde_json::json!({ "channel": channel, "stats": stats }),
        ),
        Err(err) => fail(err),
    }
}

/// `POST /channels/:id/join`
async fn join_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.join_channel(&caller, &id).await {
        Ok(channel) => ok(StatusCode::OK, channel),
        Err(err) => fail(err),
    }
}

/// `POST /channels/:id/leave`
async fn leave_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.leave_channel(&caller, &id).await {
        Ok(()) => ok(StatusCode::OK, serde_json::Value::Null),
        Err(err) => fail(err),
    }
}

// ---------------------------------------------------------------------------
// Handlers — invitations
// ---------------------------------------------------------------------------

/// `GET /invitations` — the caller's pending invitations.
async fn list_invitations(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.list_invitations(&caller).await {
        Ok(invitations) => ok(StatusCode::OK, invitations),
        Err(err) => fail(err),
    }
}

/// `POST /invitations/:id/accept`
async fn accept_invitation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.accept_invitation(&caller, &id).await {
        Ok(invitation) => {
            let wrapped_key = invitation.wrapped_key.clone();
            ok(
                StatusCode::OK,
                serde_json::json!({ "invitation": invitation, "wrappedKey": wrapped_key }),
            )
        }
        Err(err) => fail(err),
    }
}

/// `POST /invitations/:id/reject`
async fn reject_invitation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.reject_invitation(&caller, &id).await {
        Ok(_) => ok(StatusCode::OK, serde_json::Value::Null),
        Err(err) => fail(err),
    }
}

// ---------------------------------------------------------------------------
// Handlers — messages
// ---------------------------------------------------------------------------

/// `POST /channels/:id/messages`
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    match state.service.send_message(&caller, &id, &request).await {
        Ok(message) => {
            state.metrics.messages_stored_total.inc();
            ok(StatusCode::CREATED, message)
        }
        Err(err) => fail(err),
    }
}

/// `GET /channels/:id/messages`
async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<MessagesParams>,
) -> Response {
    let caller = match authenticate(&state, &headers).await {
        Ok(caller) => caller,
        Err(err) => return fail(err),
    };
    let query = MessageQuery {
        limit: params.limit,
        before: params.before,
        after: params.after,
    };
    match state.service.get_messages(&caller, &id, &query).await {
        Ok(messages) => ok(StatusCode::OK, messages),
        Err(err) => fail(err),
    }
}
