use anyhow::{Context, Result};

/// Signing secret used when `FOLIO_JWT_SECRET` is unset. Startup warns about it.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Settings the request handlers need. Listener and storage locations are
/// read by the server binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Public URL prefix stored media is served under.
    pub media_url: String,
    pub frontend_url: String,
    pub reset_token_ttl_hours: i64,
    pub from_email: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.into(),
            token_ttl_hours: 720,
            media_url: "/media".into(),
            frontend_url: "http://localhost:5173".into(),
            reset_token_ttl_hours: 24,
            from_email: "no-reply@example.com".into(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            jwt_secret: std::env::var("FOLIO_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            token_ttl_hours: env_number("FOLIO_TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
            media_url: std::env::var("FOLIO_MEDIA_URL").unwrap_or(defaults.media_url),
            frontend_url: std::env::var("FOLIO_FRONTEND_URL").unwrap_or(defaults.frontend_url),
            reset_token_ttl_hours: env_number(
                "FOLIO_RESET_TOKEN_TTL_HOURS",
                defaults.reset_token_ttl_hours,
            )?,
            from_email: std::env::var("FOLIO_FROM_EMAIL").unwrap_or(defaults.from_email),
        })
    }

    /// Public URL of a stored media path.
    pub fn media_link(&self, path: &str) -> String {
        format!("{}/{}", self.media_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn media_link_opt(&self, path: Option<&str>) -> Option<String> {
        path.filter(|p| !p.is_empty()).map(|p| self.media_link(p))
    }
}

fn env_number(key: &str, default: i64) -> Result<i64> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
