use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::CookieConfig;
use crate::cookies;
use crate::error::ApiError;
use crate::ingest::{IngestionJob, Ingestor};
use crate::oauth::AuthClient;
use crate::pages;
use crate::session::{id_prefix, Session, SessionStore};
use crate::spotify::{SpotifyClient, TimeRange, DEFAULT_LIMIT};

const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthClient>,
    pub spotify: SpotifyClient,
    pub sessions: Arc<dyn SessionStore>,
    pub ingestor: Ingestor,
    pub cookie: CookieConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::login))
        .route("/dashboard", get(pages::dashboard))
        .route("/health", get(health_handler))
        .route("/callback", get(callback_handler))
        .route("/api/auth/authorize", get(authorize_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/data/top-artists", get(top_artists_handler))
        .route("/api/data/top-tracks", get(top_tracks_handler))
        .route("/api/data/playlists", get(playlists_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// `Query` whose rejection is rendered as the usual JSON error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
struct ApiQuery<T>(T);

/// Session resolved from the request's cookie. Rejects with 401.
pub struct AuthSession {
    pub session_id: String,
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = cookies::session_id(&jar).ok_or(ApiError::Unauthenticated)?;
        let session = state.sessions.resolve(&session_id).await?;
        Ok(Self {
            session_id,
            session,
        })
    }
}

// Auth handlers

async fn authorize_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "auth_url": state.auth.authorization_url() }))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn callback_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiQuery(params): ApiQuery<CallbackParams>,
) -> Result<Response, ApiError> {
    if let Some(reason) = params.error {
        warn!(reason = %reason, "authorization denied by provider");
        return Err(ApiError::AuthenticationFailed);
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(ApiError::AuthenticationFailed)?;

    // The code is consumed once the exchange starts, so finish the login even
    // if the browser goes away; only the response is lost then.
    let cookie_config = state.cookie.clone();
    let session_id = tokio::spawn(complete_login(state, code))
        .await
        .map_err(|e| {
            error!(error = %e, "login task aborted");
            ApiError::Internal
        })??;

    let jar = jar.add(cookies::session_cookie(&session_id, &cookie_config));
    Ok((StatusCode::FOUND, jar, [(header::LOCATION, DASHBOARD_PATH)]).into_response())
}

/// Token exchange, profile lookup, session creation, then ingestion is
/// scheduled without being awaited. Returns the new session id.
async fn complete_login(state: AppState, code: String) -> Result<String, ApiError> {
    let token = state.auth.exchange_code(&code).await.map_err(|e| {
        error!(error = %e, "token exchange failed");
        ApiError::AuthenticationFailed
    })?;

    let profile = state
        .auth
        .fetch_profile(&token.access_token)
        .await
        .map_err(|e| {
            error!(error = %e, "profile lookup failed");
            ApiError::AuthenticationFailed
        })?;

    let session_id = state
        .sessions
        .create(&profile.principal_id, &token.access_token)
        .await
        .map_err(|e| {
            error!(error = %e, "session creation failed");
            ApiError::Internal
        })?;

    info!(
        principal_id = %profile.principal_id,
        display_name = profile.display_name.as_deref().unwrap_or("-"),
        session = id_prefix(&session_id),
        "login successful"
    );

    state.ingestor.schedule(IngestionJob {
        principal_id: profile.principal_id,
        access_token: token.access_token,
    });

    Ok(session_id)
}

async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    if let Some(session_id) = cookies::session_id(&jar) {
        state.sessions.invalidate(&session_id).await?;
        info!(session = id_prefix(&session_id), "logged out");
    }
    let jar = jar.remove(cookies::clear_session_cookie());
    Ok((jar, Json(json!({ "status": "logged out" }))))
}

// Data handlers

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[derive(Deserialize)]
struct RangeParams {
    #[serde(default)]
    time_range: TimeRange,
    #[serde(default = "default_limit")]
    limit: u32,
}

#[derive(Deserialize)]
struct LimitParams {
    #[serde(default = "default_limit")]
    limit: u32,
}

async fn top_artists_handler(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiQuery(params): ApiQuery<RangeParams>,
) -> Result<Json<Value>, ApiError> {
    let data = state
        .spotify
        .top_artists(&auth.session.access_token, params.time_range, params.limit)
        .await
        .map_err(|e| upstream_failure(&auth, "top artists", e))?;
    Ok(Json(data))
}

async fn top_tracks_handler(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiQuery(params): ApiQuery<RangeParams>,
) -> Result<Json<Value>, ApiError> {
    let data = state
        .spotify
        .top_tracks(&auth.session.access_token, params.time_range, params.limit)
        .await
        .map_err(|e| upstream_failure(&auth, "top tracks", e))?;
    Ok(Json(data))
}

async fn playlists_handler(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Result<Json<Value>, ApiError> {
    let data = state
        .spotify
        .playlists(&auth.session.access_token, params.limit)
        .await
        .map_err(|e| upstream_failure(&auth, "playlists", e))?;
    Ok(Json(data))
}

fn upstream_failure(auth: &AuthSession, what: &str, e: crate::spotify::DataError) -> ApiError {
    warn!(
        principal_id = %auth.session.principal_id,
        session = id_prefix(&auth.session_id),
        error = %e,
        "failed to fetch {}",
        what
    );
    ApiError::Upstream(e)
}
