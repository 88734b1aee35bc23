use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub token_ttl_minutes: i64,
    pub retry: RetrySettings,
    pub bootstrap: BootstrapConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Company and default admin person created on first start.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub company_name: String,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("TIMETRACK_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid TIMETRACK_HOST: {e}"))?;

        let port: u16 = env_or("TIMETRACK_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid TIMETRACK_PORT: {e}"))?;

        let token_ttl_minutes: i64 = env_or("TIMETRACK_TOKEN_TTL_MINUTES", "60")
            .parse()
            .map_err(|e| format!("Invalid TIMETRACK_TOKEN_TTL_MINUTES: {e}"))?;

        let max_retries: u32 = env_or("TIMETRACK_MAX_RETRIES", "3")
            .parse()
            .map_err(|e| format!("Invalid TIMETRACK_MAX_RETRIES: {e}"))?;

        let retry_delay_seconds: u64 = env_or("TIMETRACK_RETRY_DELAY_SECONDS", "1")
            .parse()
            .map_err(|e| format!("Invalid TIMETRACK_RETRY_DELAY_SECONDS: {e}"))?;

        let bootstrap = BootstrapConfig {
            company_name: env_or("TIMETRACK_COMPANY_NAME", "Company"),
            admin_name: env_or("TIMETRACK_ADMIN_NAME", "Administrator"),
            admin_email: env_or("TIMETRACK_ADMIN_EMAIL", "admin@localhost"),
            admin_password: env_required("TIMETRACK_ADMIN_PASSWORD")?,
        };

        let log_level = env_or("TIMETRACK_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            token_ttl_minutes,
            retry: RetrySettings {
                max_retries,
                delay: Duration::from_secs(retry_delay_seconds),
            },
            bootstrap,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
