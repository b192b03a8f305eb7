use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Initial superuser created at startup when absent.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

/// One year.
pub const MAX_TOKEN_TTL_HOURS: u32 = 24 * 366;

fn parse_ttl(raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "TOKEN_TTL_HOURS",
        reason,
    };
    let hours: u32 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
    if hours == 0 || hours > MAX_TOKEN_TTL_HOURS {
        return Err(invalid(format!(
            "expected 1..={} hours, got {}",
            MAX_TOKEN_TTL_HOURS, hours
        )));
    }
    Ok(hours)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub token_ttl_hours: u32,
    pub acl_model: String,
    pub acl_policy: String,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = get("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;
        let token_ttl_hours = match get("TOKEN_TTL_HOURS") {
            Some(raw) => parse_ttl(&raw)?,
            None => 24,
        };
        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_EMAIL")),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            token_ttl_hours,
            acl_model: get("ACL_MODEL").unwrap_or_else(|| "acl/model.conf".to_string()),
            acl_policy: get("ACL_POLICY").unwrap_or_else(|| "acl/policy.csv".to_string()),
            admin,
        })
    }
}
