use super::*;

use axum::{
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::GameStatus;
use tokio::net::TcpListener;

const SESSION_COOKIE: &str = "chess_session=tok-1";

fn has_session(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains(SESSION_COOKIE))
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["username"] == "alice" && body["password"] == "pw" {
        (
            [(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/; HttpOnly"))],
            Json(json!({ "valid": true })),
        )
            .into_response()
    } else {
        Json(json!({ "valid": false })).into_response()
    }
}

async fn info(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    if !has_session(&headers) {
        return Json(json!({ "valid": false }));
    }
    Json(json!({
        "valid": true,
        "fen": format!("fen-for-{}", body["session_id"]),
        "status": "Continue",
        "turn": "White",
        "history": [{ "src": "e2", "tar": "e4", "step": 1 }],
        "mode": "easy",
    }))
}

async fn legal(
    headers: HeaderMap,
    Path((session_id, square)): Path<(i64, String)>,
) -> Json<Value> {
    if !has_session(&headers) {
        return Json(json!({ "valid": false }));
    }
    assert_eq!(session_id, 5);
    let moves: Vec<&str> = if square == "e2" { vec!["e3", "e4"] } else { Vec::new() };
    Json(json!({ "moves": moves }))
}

async fn undo() -> impl IntoResponse {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "code": "upstream", "message": "game engine unreachable" })),
    )
}

async fn replay() -> &'static str {
    "<html>not json</html>"
}

async fn new_game(Json(body): Json<Value>) -> Json<Value> {
    let valid = body["mode"] == "pvp";
    Json(json!({ "valid": valid, "session_id": 11 }))
}

async fn spawn_gateway() -> Url {
    let app = Router::new()
        .route("/login", post(login))
        .route("/chess/info", post(info))
        .route("/chess/new", post(new_game))
        .route("/chess/:session_id/:square", get(legal))
        .route("/undo", post(undo))
        .route("/replay", post(replay));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    Url::parse(&format!("http://{addr}")).expect("url")
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        username: "alice".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn session_cookie_is_kept_between_calls() {
    let client = HttpGatewayClient::new(spawn_gateway().await).expect("client");

    let before = client.game_info(GameId(5)).await.expect("info");
    assert!(!before.valid);

    assert!(!client.login(&credentials("nope")).await.expect("login").valid);
    assert!(client.login(&credentials("pw")).await.expect("login").valid);

    let after = client.game_info(GameId(5)).await.expect("info");
    assert!(after.valid);
    assert_eq!(after.fen.as_deref(), Some("fen-for-5"));
    assert_eq!(after.status, Some(GameStatus::Continue));
    assert_eq!(after.history.len(), 1);

    let moves = client
        .legal_moves(GameId(5), "e2".parse().expect("square"))
        .await
        .expect("moves");
    assert!(moves.valid);
    assert_eq!(moves.moves.len(), 2);
}

#[tokio::test]
async fn new_game_reports_created_or_refused() {
    let client = HttpGatewayClient::new(spawn_gateway().await).expect("client");
    assert_eq!(
        client.new_game(Mode::Pvp).await,
        Ok(NewGame::Created(GameId(11)))
    );
    assert_eq!(client.new_game(Mode::Easy).await, Ok(NewGame::Refused));
}

#[tokio::test]
async fn bad_gateway_is_a_transport_error() {
    let client = HttpGatewayClient::new(spawn_gateway().await).expect("client");
    let err = client.undo(GameId(5)).await.expect_err("502");
    assert!(err.is_transport());
    assert!(err.to_string().contains("game engine unreachable"));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let client = HttpGatewayClient::new(spawn_gateway().await).expect("client");
    let err = client.replay_step(GameId(5), 1).await.expect_err("html");
    assert!(matches!(err, ControllerError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_gateway_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let url = Url::parse(&format!("http://{addr}")).expect("url");
    let client = HttpGatewayClient::new(url).expect("client");
    let err = client.game_info(GameId(1)).await.expect_err("refused");
    assert!(err.is_transport());
}

#[tokio::test]
async fn base_url_gets_trailing_slash() {
    let url = Url::parse("http://localhost:3000/api").expect("url");
    let client = HttpGatewayClient::new(url).expect("client");
    assert_eq!(client.base_url().as_str(), "http://localhost:3000/api/");
}
