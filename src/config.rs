//! Server configuration, loaded from environment variables at startup.
//!
//! A `.env` file in the working directory is honoured (see `main.rs`).

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl std::str::FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" | "" => Ok(UserRole::User),
            other => anyhow::bail!("unknown role '{}'", other),
        }
    }
}

/// A dashboard account allowed to log in.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub username: String,
    pub password: String,
    pub role: UserRole,
}

/// Authentication settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HMAC secret for issued tokens. Required unless dev mode is on.
    pub jwt_secret: Option<String>,
    /// Token lifetime in days.
    pub jwt_ttl_days: i64,
    pub users: Vec<UserAccount>,
}

impl AuthConfig {
    /// Whether API requests must carry a bearer token.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }

    pub fn find_user(&self, username: &str) -> Option<&UserAccount> {
        self.users.iter().find(|u| u.username == username)
    }
}

/// Settings for the upstream text-generation service.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Output ceiling sent with every request.
    pub max_tokens: u32,
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Disables authentication. Never enable on an exposed host.
    pub dev_mode: bool,
    pub generation: GenerationConfig,
    /// Upper bound on pipelines running at the same time.
    pub max_concurrent_tasks: usize,
    /// Age after which finished or abandoned tasks are swept.
    pub task_retention: Duration,
    /// How often the server runs the retention sweep. `None` disables it.
    pub sweep_interval: Option<Duration>,
    pub auth: AuthConfig,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY must be set")?;

        let users = match std::env::var("AUTH_USERS") {
            Ok(raw) => parse_users(&raw)?,
            Err(_) => Vec::new(),
        };

        let sweep_secs: u64 = parse_env("TASK_SWEEP_INTERVAL_SECS", 3600);

        Ok(Self {
            host: env_or("HOST", "127.0.0.1"),
            port: parse_env("PORT", 5000),
            dev_mode: env_flag("DEV_MODE"),
            generation: GenerationConfig {
                api_key,
                base_url: env_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com"),
                model: env_or("GENERATION_MODEL", "claude-3-7-sonnet-20250219"),
                max_tokens: parse_env("GENERATION_MAX_TOKENS", 64000),
            },
            max_concurrent_tasks: parse_env::<usize>("MAX_CONCURRENT_TASKS", 4).max(1),
            task_retention: Duration::from_secs(parse_env::<u64>("TASK_RETENTION_HOURS", 24) * 3600),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
                jwt_ttl_days: parse_env("JWT_TTL_DAYS", 7),
                users,
            },
        })
    }
}

/// Parse `name:password[:role]` entries separated by commas.
pub fn parse_users(raw: &str) -> anyhow::Result<Vec<UserAccount>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let username = parts.next().unwrap_or("").trim();
            let password = parts.next().unwrap_or("");
            if username.is_empty() || password.is_empty() {
                anyhow::bail!("AUTH_USERS entry '{}' must be name:password[:role]", username);
            }
            let role = match parts.next() {
                Some(r) => r.parse()?,
                None => UserRole::User,
            };
            Ok(UserAccount {
                username: username.to_string(),
                password: password.to_string(),
                role,
            })
        })
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_users() {
        let users = parse_users("admin:s3cret:admin, demo:demouser").unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "admin");
        assert_eq!(users[0].role, UserRole::Admin);
        assert_eq!(users[1].password, "demouser");
        assert_eq!(users[1].role, UserRole::User);
    }

    #[test]
    fn test_parse_users_rejects_malformed_entries() {
        assert!(parse_users("nopassword").is_err());
        assert!(parse_users("bob:pw:owner").is_err());
        assert!(parse_users("").unwrap().is_empty());
    }
}
