//! Session gate in front of the game engine.
//!
//! Holds no game state. Every operation either answers from the session store
//! or forwards to the engine with the authenticated username injected.

use std::sync::Arc;

use chrono::Duration;
use serde_json::{Map, Value};
use shared::{
    error::ApiError,
    protocol::{Credentials, LogoutResponse, ValidResponse},
};
use storage::{Session, SessionStore};
use tracing::{info, warn};

pub mod engine;

pub use engine::{EngineError, EngineRoute, GameEngine, HttpGameEngine};

/// Field the engine reads the caller's identity from.
pub const USER_FIELD: &str = "user";

#[derive(Clone)]
pub struct ApiContext {
    pub sessions: Arc<dyn SessionStore>,
    pub engine: Arc<dyn GameEngine>,
    pub session_ttl: Duration,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub body: Value,
    /// Set only when the engine accepted the credentials.
    pub session: Option<Session>,
}

pub fn invalid() -> Value {
    let ValidResponse { valid } = ValidResponse::invalid();
    serde_json::json!({ "valid": valid })
}

pub async fn authenticate(
    ctx: &ApiContext,
    token: Option<&str>,
) -> Result<Option<Session>, ApiError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    ctx.sessions.load_session(token).await.map_err(internal)
}

pub async fn login(
    ctx: &ApiContext,
    current: Option<&Session>,
    body: Value,
) -> Result<LoginOutcome, ApiError> {
    if current.is_some() {
        return Ok(LoginOutcome {
            body: invalid(),
            session: None,
        });
    }

    let credentials = parse_credentials(&body)?;
    let response = call_engine(ctx, &EngineRoute::Login, body).await?;
    if !is_valid(&response) {
        info!(username = %credentials.username, "login rejected by engine");
        return Ok(LoginOutcome {
            body: response,
            session: None,
        });
    }

    let session = ctx
        .sessions
        .create_exclusive_session(&credentials.username, ctx.session_ttl)
        .await
        .map_err(internal)?;
    info!(username = %credentials.username, "login established session");
    Ok(LoginOutcome {
        body: response,
        session: Some(session),
    })
}

pub async fn signup(
    ctx: &ApiContext,
    current: Option<&Session>,
    body: Value,
) -> Result<Value, ApiError> {
    if current.is_some() {
        return Ok(invalid());
    }
    parse_credentials(&body)?;
    call_engine(ctx, &EngineRoute::Signup, body).await
}

pub async fn logout(ctx: &ApiContext, token: Option<&str>) -> Result<LogoutResponse, ApiError> {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        ctx.sessions.destroy_session(token).await.map_err(internal)?;
    }
    Ok(LogoutResponse {
        msg: "logged out".to_string(),
    })
}

/// Forwards a game-scoped request on behalf of `session`'s user.
///
/// The engine's body is returned untouched, including `{"valid": false}`.
pub async fn forward_as_user(
    ctx: &ApiContext,
    session: &Session,
    route: EngineRoute,
    body: Value,
) -> Result<Value, ApiError> {
    let body = inject_user(body, &session.username)?;
    call_engine(ctx, &route, body).await
}

pub fn inject_user(body: Value, username: &str) -> Result<Value, ApiError> {
    let mut object = match body {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        _ => return Err(ApiError::validation("request body must be a JSON object")),
    };
    object.insert(USER_FIELD.to_string(), Value::String(username.to_string()));
    Ok(Value::Object(object))
}

async fn call_engine(
    ctx: &ApiContext,
    route: &EngineRoute,
    body: Value,
) -> Result<Value, ApiError> {
    ctx.engine.call(route, body).await.map_err(|err| {
        warn!(route = %route.path(), %err, "game engine call failed");
        ApiError::upstream(err.to_string())
    })
}

fn parse_credentials(body: &Value) -> Result<Credentials, ApiError> {
    serde_json::from_value(body.clone())
        .map_err(|_| ApiError::validation("username and password are required"))
}

fn is_valid(body: &Value) -> bool {
    body.get("valid").and_then(Value::as_bool).unwrap_or(false)
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
