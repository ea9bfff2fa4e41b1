use super::*;

async fn memory_store() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = memory_store().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn created_session_loads_by_token() {
    let storage = memory_store().await;
    let session = storage
        .create_exclusive_session("alice", Duration::hours(1))
        .await
        .expect("session");
    assert_eq!(session.username, "alice");
    assert!(session.token.len() >= 40);

    let loaded = storage
        .load_session(&session.token)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(loaded.username, "alice");
    assert_eq!(loaded.token, session.token);
}

#[tokio::test]
async fn second_login_evicts_first_session() {
    let storage = memory_store().await;
    let first = storage
        .create_exclusive_session("alice", Duration::hours(1))
        .await
        .expect("first");
    let second = storage
        .create_exclusive_session("alice", Duration::hours(1))
        .await
        .expect("second");
    assert_ne!(first.token, second.token);

    assert!(storage.load_session(&first.token).await.expect("load").is_none());
    assert!(storage.load_session(&second.token).await.expect("load").is_some());

    let sessions = storage.list_sessions().await.expect("list");
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn sessions_of_other_users_survive_eviction() {
    let storage = memory_store().await;
    let bob = storage
        .create_exclusive_session("bob", Duration::hours(1))
        .await
        .expect("bob");
    storage
        .create_exclusive_session("alice", Duration::hours(1))
        .await
        .expect("alice");
    storage
        .create_exclusive_session("alice", Duration::hours(1))
        .await
        .expect("alice again");

    assert!(storage.load_session(&bob.token).await.expect("load").is_some());
    assert_eq!(storage.list_sessions().await.expect("list").len(), 2);
}

#[tokio::test]
async fn destroy_session_is_idempotent() {
    let storage = memory_store().await;
    let session = storage
        .create_exclusive_session("carol", Duration::hours(1))
        .await
        .expect("session");
    storage.destroy_session(&session.token).await.expect("destroy");
    storage
        .destroy_session(&session.token)
        .await
        .expect("destroy absent");
    storage
        .destroy_session("never-issued")
        .await
        .expect("destroy unknown");
    assert!(storage.load_session(&session.token).await.expect("load").is_none());
}

#[tokio::test]
async fn expired_sessions_are_not_loaded_and_get_purged() {
    let storage = memory_store().await;
    let expired = storage
        .create_exclusive_session("dave", Duration::seconds(-5))
        .await
        .expect("expired");
    storage
        .create_exclusive_session("erin", Duration::seconds(-5))
        .await
        .expect("expired");
    storage
        .create_exclusive_session("frank", Duration::hours(1))
        .await
        .expect("live");

    assert!(storage.load_session(&expired.token).await.expect("load").is_none());
    // dave's row was removed lazily by the load above
    assert_eq!(storage.purge_expired().await.expect("purge"), 1);
    let remaining = storage.list_sessions().await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].username, "frank");
}

#[tokio::test]
async fn evict_by_username_reports_removed_rows() {
    let storage = memory_store().await;
    storage
        .create_exclusive_session("grace", Duration::hours(1))
        .await
        .expect("session");
    assert_eq!(storage.evict_by_username("grace").await.expect("evict"), 1);
    assert_eq!(storage.evict_by_username("grace").await.expect("evict"), 0);
}

#[tokio::test]
async fn racing_logins_leave_exactly_one_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("sessions.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let storage = Storage::new(&database_url).await.expect("db");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            storage
                .create_exclusive_session("racer", Duration::hours(1))
                .await
        }));
    }
    // a racer may lose to SQLITE_BUSY; the invariant must hold either way
    let mut tokens = Vec::new();
    for handle in handles {
        if let Ok(session) = handle.await.expect("join") {
            tokens.push(session.token);
        }
    }
    assert!(!tokens.is_empty());

    let mut live = 0;
    for token in &tokens {
        if storage.load_session(token).await.expect("load").is_some() {
            live += 1;
        }
    }
    assert_eq!(live, 1);
    assert_eq!(storage.list_sessions().await.expect("list").len(), 1);
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn sqlite_path_skips_memory_urls() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/gateway.db?mode=rwc"),
        Some(PathBuf::from("./data/gateway.db"))
    );
}
