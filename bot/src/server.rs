//! HTTP surface: the interactions endpoint, readiness and metrics.
//!
//! # Request Flow
//!
//! 1. Verify the Ed25519 signature over the raw body (`401` on failure)
//! 2. Decode the payload (`400` when it is not an interaction, `204` when it
//!    names a command or component the bot does not handle)
//! 3. Resolve the member's role ids to names
//! 4. Answer `PING` directly, send everything else through the store and wait
//!    for the terminal action carrying the same interaction id
//! 5. Encode the reply, or `204` when the interaction was ignored

use crate::discord::verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::discord::{Inbound, RawInteraction, RoleDirectory, SignatureVerifier, response};
use crate::environment::BotEnvironment;
use crate::error::AppError;
use crate::reducer::InteractionReducer;
use crate::types::{BotAction, BotState, Interaction, Reply};
use crate::views;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_core::counters::CounterStore;
use tally_runtime::Store;
use tally_runtime::metrics::{InteractionMetrics, MetricsRecorder};
use tower_http::trace::TraceLayer;

/// The interaction store.
pub type BotStore = Store<BotState, BotAction, BotEnvironment, InteractionReducer>;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    /// Runs the interaction reducer
    pub store: BotStore,
    /// Checks request signatures
    pub verifier: SignatureVerifier,
    /// Resolves role ids to names
    pub roles: Arc<dyn RoleDirectory>,
    /// How long to wait for the reducer before sending the failure reply
    pub response_timeout: Duration,
    /// Pinged by `/health`
    pub storage: Arc<dyn CounterStore>,
    /// Prometheus recorder, when installed
    pub metrics: Option<MetricsRecorder>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/interactions", post(interactions))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `200 ok` while storage answers, `503` otherwise.
async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.storage.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            tracing::warn!(error = %error, "Storage not ready");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        },
    }
}

#[allow(clippy::unused_async)]
async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(recorder) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            recorder.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn interactions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, AppError> {
    state
        .verifier
        .verify(header_str(&headers, SIGNATURE_HEADER), header_str(&headers, TIMESTAMP_HEADER), &body)
        .map_err(|e| AppError::unauthorized("invalid request signature").with_source(e))?;

    let raw: RawInteraction =
        serde_json::from_slice(&body).map_err(|e| AppError::bad_request("malformed interaction").with_source(e))?;

    let role_names = resolve_roles(state.roles.as_ref(), &raw).await;

    match raw
        .into_inbound(role_names)
        .map_err(|e| AppError::bad_request("incomplete interaction").with_source(e))?
    {
        Inbound::Ping => Ok(Json(response::pong()).into_response()),
        Inbound::Event(interaction) => Ok(dispatch(&state, interaction).await),
        Inbound::Unhandled(reason) => {
            tracing::debug!(reason = %reason, "Ignoring unhandled interaction");
            InteractionMetrics::record_outcome("ignored", Duration::ZERO);
            Ok(StatusCode::NO_CONTENT.into_response())
        },
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Role names of the invoking member; empty when they cannot be resolved.
async fn resolve_roles(roles: &dyn RoleDirectory, raw: &RawInteraction) -> Vec<String> {
    let (Some(guild_id), role_ids) = (raw.guild_id.as_deref(), raw.role_ids()) else {
        return Vec::new();
    };
    match roles.role_names(guild_id, role_ids).await {
        Ok(names) => names,
        Err(error) => {
            tracing::warn!(guild = guild_id, error = %error, "Could not resolve role names");
            Vec::new()
        },
    }
}

async fn dispatch(state: &AppState, interaction: Interaction) -> Response {
    let started = Instant::now();
    let id = interaction.id.clone();
    InteractionMetrics::record_received(interaction.kind.label());

    let settled = state
        .store
        .send_and_wait_for(BotAction::Received(interaction), |a| a.settles(&id), state.response_timeout)
        .await;

    let (outcome, response) = match settled {
        Ok(BotAction::Responded { reply, .. }) => ("responded", Json(response::reply(&reply)).into_response()),
        Ok(_) => ("ignored", StatusCode::NO_CONTENT.into_response()),
        Err(error) => {
            tracing::error!(interaction = %id, error = %error, "Interaction did not settle");
            (
                "failed",
                Json(response::reply(&Reply::Message(views::failure()))).into_response(),
            )
        },
    };

    InteractionMetrics::record_outcome(outcome, started.elapsed());
    response
}
