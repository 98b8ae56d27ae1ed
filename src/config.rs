use anyhow::{Context, Result};
use std::path::PathBuf;

/// Runtime settings, resolved from `.env`, the environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub user: Option<String>,
    pub rust_log: String,
}

impl Config {
    /// `db` and `user` come from the global CLI flags and win over the environment.
    pub fn load(db: Option<PathBuf>, user: Option<String>) -> Result<Self> {
        dotenvy::dotenv().ok(); // .env is optional

        let db_path = match db.or_else(|| std::env::var_os("VCONNECT_DB").map(PathBuf::from)) {
            Some(path) => path,
            None => default_db_path()?,
        };

        Ok(Config {
            db_path,
            user: pick_user(user, std::env::var("VCONNECT_USER").ok()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        })
    }
}

/// The CLI user wins unless blank; a blank environment value counts as unset.
fn pick_user(cli: Option<String>, env: Option<String>) -> Option<String> {
    let present = |u: &String| !u.trim().is_empty();
    cli.filter(present).or_else(|| env.filter(present))
}

fn default_db_path() -> Result<PathBuf> {
    // XDG data directory, or the current directory when there is no home
    match directories::ProjectDirs::from("", "", "vconnect") {
        Some(dirs) => Ok(dirs.data_dir().join("vconnect.db")),
        None => {
            let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
            Ok(cwd.join("vconnect.db"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_win() {
        let config = Config::load(
            Some(PathBuf::from("/tmp/override.db")),
            Some("cli-user".to_string()),
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.user.as_deref(), Some("cli-user"));
    }

    #[test]
    fn test_blank_cli_user_falls_back_to_env() {
        let some = |s: &str| Some(s.to_string());
        assert_eq!(pick_user(some("  "), some("env-user")), some("env-user"));
        assert_eq!(pick_user(None, some("env-user")), some("env-user"));
        assert_eq!(pick_user(some("cli-user"), some("env-user")), some("cli-user"));
        assert_eq!(pick_user(some(""), some("   ")), None);
        assert_eq!(pick_user(None, None), None);
    }
}
