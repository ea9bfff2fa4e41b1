use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cookie::{Cookie, SameSite};
use gateway_api::EngineRoute;
use serde_json::Value;
use shared::{
    domain::{GameId, Square},
    error::{ApiError, ErrorCode},
};
use storage::Session;
use tower_http::{
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{debug, error};

use crate::app_state::AppState;

type HandlerError = (StatusCode, Json<ApiError>);

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/signup", post(signup))
        .route("/user", get(user_info))
        .route("/chess/new", post(new_game))
        .route("/chess/info", post(game_info))
        .route("/chess/update", post(update_game))
        .route("/chess/:session_id/:coordinate", get(legal_moves))
        .route("/undo", post(undo))
        .route("/resume", get(resume_list))
        .route("/replays", get(replay_list))
        .route("/replay", post(replay_step));

    let router = match &state.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => router.fallback(not_found),
    };

    router
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HandlerError> {
    state
        .api
        .sessions
        .health_check()
        .await
        .map_err(|e| reject(ApiError::internal(e.to_string())))?;
    Ok("ok")
}

async fn not_found() -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(ErrorCode::NotFound, "no such route")),
    )
}

async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HandlerError> {
    let current = current_session(&state, &headers).await?;
    let body = parse_body(&body)?;
    let outcome = gateway_api::login(&state.api, current.as_ref(), body)
        .await
        .map_err(reject)?;

    let mut response = Json(outcome.body).into_response();
    if let Some(session) = outcome.session {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, session_cookie(&state, &session)?);
    }
    Ok(response)
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let token = session_token(&headers, &state.cookie_name);
    let body = gateway_api::logout(&state.api, token.as_deref())
        .await
        .map_err(reject)?;

    let mut response = Json(body).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, removal_cookie(&state)?);
    Ok(response)
}

async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HandlerError> {
    let current = current_session(&state, &headers).await?;
    let body = parse_body(&body)?;
    let response = gateway_api::signup(&state.api, current.as_ref(), body)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn user_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::User, None).await
}

async fn new_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::NewGame, Some(&body)).await
}

async fn game_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::Info, Some(&body)).await
}

async fn update_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::Update, Some(&body)).await
}

async fn legal_moves(
    State(state): State<Arc<AppState>>,
    Path((session_id, coordinate)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, HandlerError> {
    let Some(session) = current_session(&state, &headers).await? else {
        return Ok(Json(gateway_api::invalid()));
    };
    let session_id = session_id
        .parse::<i64>()
        .map(GameId)
        .map_err(|_| reject(ApiError::validation("session id must be an integer")))?;
    let square = coordinate
        .parse::<Square>()
        .map_err(|e| reject(ApiError::validation(e.to_string())))?;

    let response = gateway_api::forward_as_user(
        &state.api,
        &session,
        EngineRoute::LegalMoves { session_id, square },
        Value::Null,
    )
    .await
    .map_err(reject)?;
    Ok(Json(response))
}

async fn undo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::Undo, Some(&body)).await
}

async fn resume_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::Resume, None).await
}

async fn replay_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::Replays, None).await
}

async fn replay_step(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HandlerError> {
    forward(&state, &headers, EngineRoute::Replay, Some(&body)).await
}

async fn forward(
    state: &AppState,
    headers: &HeaderMap,
    route: EngineRoute,
    body: Option<&Bytes>,
) -> Result<Json<Value>, HandlerError> {
    let Some(session) = current_session(state, headers).await? else {
        debug!(route = %route.path(), "unauthenticated request");
        return Ok(Json(gateway_api::invalid()));
    };
    let body = match body {
        Some(bytes) => parse_body(bytes)?,
        None => Value::Null,
    };
    let response = gateway_api::forward_as_user(&state.api, &session, route, body)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn current_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Session>, HandlerError> {
    let token = session_token(headers, &state.cookie_name);
    gateway_api::authenticate(&state.api, token.as_deref())
        .await
        .map_err(reject)
}

fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
}

fn parse_body(bytes: &Bytes) -> Result<Value, HandlerError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| reject(ApiError::validation(format!("malformed JSON body: {e}"))))
}

fn session_cookie(state: &AppState, session: &Session) -> Result<HeaderValue, HandlerError> {
    let max_age = (session.expires_at - session.created_at).num_seconds().max(0);
    let cookie = Cookie::build((state.cookie_name.clone(), session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age))
        .build();
    header_value(&cookie)
}

fn removal_cookie(state: &AppState) -> Result<HeaderValue, HandlerError> {
    let mut cookie = Cookie::build((state.cookie_name.clone(), ""))
        .path("/")
        .http_only(true)
        .build();
    cookie.make_removal();
    header_value(&cookie)
}

fn header_value(cookie: &Cookie<'_>) -> Result<HeaderValue, HandlerError> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| reject(ApiError::internal(format!("invalid cookie header: {e}"))))
}

fn reject(err: ApiError) -> HandlerError {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(%err, "request failed");
    }
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/routes_tests.rs"]
mod tests;
