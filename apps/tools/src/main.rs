use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use storage::{Session, SessionStore, Storage};

#[derive(Parser, Debug)]
#[command(about = "Inspect and evict gateway sessions")]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/gateway.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every stored session, expired ones included.
    ListSessions,
    /// Log a user out everywhere.
    Evict { username: String },
    /// Delete sessions past their expiry.
    PurgeExpired,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::ListSessions => {
            let sessions = storage.list_sessions().await?;
            if sessions.is_empty() {
                println!("no sessions");
            }
            let now = Utc::now();
            for session in &sessions {
                println!("{}", describe(session, now));
            }
        }
        Command::Evict { username } => {
            let evicted = storage.evict_by_username(&username).await?;
            println!("evicted {evicted} session(s) of '{username}'");
        }
        Command::PurgeExpired => {
            let purged = storage.purge_expired().await?;
            println!("purged {purged} expired session(s)");
        }
    }

    Ok(())
}

fn describe(session: &Session, now: DateTime<Utc>) -> String {
    // never print a usable token
    let prefix: String = session.token.chars().take(6).collect();
    format!(
        "{:<20} {}…  created {}  expires {}{}",
        session.username,
        prefix,
        session.created_at.format("%Y-%m-%d %H:%M:%S"),
        session.expires_at.format("%Y-%m-%d %H:%M:%S"),
        if session.is_expired_at(now) {
            "  (expired)"
        } else {
            ""
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn describe_hides_most_of_the_token() {
        let created_at = Utc::now();
        let session = Session {
            token: "abcdefghijklmnop".into(),
            username: "alice".into(),
            created_at,
            expires_at: created_at + Duration::hours(1),
        };
        let line = describe(&session, created_at);
        assert!(line.starts_with("alice"));
        assert!(line.contains("abcdef…"));
        assert!(!line.contains("abcdefg"));
        assert!(!line.contains("expired"));

        let later = created_at + Duration::hours(2);
        assert!(describe(&session, later).ends_with("(expired)"));
    }
}
