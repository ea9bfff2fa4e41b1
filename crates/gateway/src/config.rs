use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

const DEFAULT_SESSION_TTL_HOURS: i64 = 30 * 24;
/// Ten years; anything longer is treated as a typo.
const MAX_SESSION_TTL_HOURS: i64 = 10 * 365 * 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub engine_url: String,
    pub static_dir: Option<PathBuf>,
    pub cookie_name: String,
    pub session_ttl_hours: i64,
    pub engine_timeout_ms: u64,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            database_url: "sqlite://./data/gateway.db".into(),
            engine_url: "http://127.0.0.1:5000/".into(),
            static_dir: Some(PathBuf::from("./build")),
            cookie_name: "chess_session".into(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            engine_timeout_ms: 10_000,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Settings {
    /// Out-of-range hours fall back to the default instead of overflowing.
    pub fn session_ttl(&self) -> chrono::Duration {
        valid_ttl_hours(self.session_ttl_hours)
            .and_then(chrono::Duration::try_hours)
            .unwrap_or_else(|| chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    engine_url: Option<String>,
    static_dir: Option<String>,
    cookie_name: Option<String>,
    session_ttl_hours: Option<i64>,
    engine_timeout_ms: Option<u64>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("gateway.toml").ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `gateway.toml`, then environment; later sources win.
pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(error) => tracing::warn!(%error, "ignoring unreadable gateway.toml"),
        }
    }

    let first = |keys: &[&str]| keys.iter().rev().find_map(|key| env(key));

    if let Some(v) = first(&["GATEWAY_BIND", "APP__BIND_ADDR"]) {
        settings.bind_addr = v;
    }
    if let Some(v) = first(&["DATABASE_URL", "APP__DATABASE_URL"]) {
        settings.database_url = v;
    }
    if let Some(v) = first(&["ENGINE_URL", "APP__ENGINE_URL"]) {
        settings.engine_url = v;
    }
    if let Some(v) = env("APP__STATIC_DIR") {
        settings.static_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
    }
    if let Some(v) = env("APP__COOKIE_NAME") {
        settings.cookie_name = v;
    }
    if let Some(parsed) = env("APP__SESSION_TTL_HOURS")
        .and_then(|v| v.trim().parse().ok())
        .and_then(valid_ttl_hours)
    {
        settings.session_ttl_hours = parsed;
    }
    if let Some(parsed) = env("APP__ENGINE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        settings.engine_timeout_ms = parsed;
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.engine_url {
        settings.engine_url = v;
    }
    if let Some(v) = file_cfg.static_dir {
        settings.static_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
    }
    if let Some(v) = file_cfg.cookie_name {
        settings.cookie_name = v;
    }
    if let Some(v) = file_cfg.session_ttl_hours.and_then(valid_ttl_hours) {
        settings.session_ttl_hours = v;
    }
    if let Some(v) = file_cfg.engine_timeout_ms {
        settings.engine_timeout_ms = v;
    }
    if let Some(v) = file_cfg.max_body_bytes {
        settings.max_body_bytes = v;
    }
}

fn valid_ttl_hours(hours: i64) -> Option<i64> {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        Some(hours)
    } else {
        tracing::warn!(hours, "ignoring out-of-range session_ttl_hours");
        None
    }
}

/// Parses the engine base url; paths are joined onto it, so it must end in `/`.
pub fn engine_base_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash).with_context(|| format!("invalid engine url '{raw}'"))
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
