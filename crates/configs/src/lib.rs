use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// `compact` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 5000, worker_threads: None, log_format: default_log_format() }
    }
}

fn default_log_format() -> String { "compact".into() }

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
    /// Run pending migrations on startup.
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }
fn default_true() -> bool { true }

/// Secrets and lifetimes for the verification, session and reset flows.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Signs bearer (access) tokens.
    #[serde(default)]
    pub jwt_secret: String,
    /// Signs password reset tokens.
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: i64,
    #[serde(default = "default_code_ttl")]
    pub verification_code_ttl_minutes: i64,
    #[serde(default = "default_cooldown")]
    pub resend_cooldown_minutes: i64,
    #[serde(default = "default_max_resends")]
    pub max_resend_attempts: i32,
    #[serde(default = "default_reset_ttl")]
    pub reset_token_ttl_minutes: i64,
    #[serde(default = "default_reset_url")]
    pub reset_url_base: String,
}

fn default_access_ttl() -> i64 { 30 }
fn default_code_ttl() -> i64 { 10 }
fn default_cooldown() -> i64 { 5 }
fn default_max_resends() -> i32 { 3 }
fn default_reset_ttl() -> i64 { 60 }
fn default_reset_url() -> String { "http://localhost:5000/reset-password".into() }

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            secret_key: String::new(),
            access_token_ttl_minutes: default_access_ttl(),
            verification_code_ttl_minutes: default_code_ttl(),
            resend_cooldown_minutes: default_cooldown(),
            max_resend_attempts: default_max_resends(),
            reset_token_ttl_minutes: default_reset_ttl(),
            reset_url_base: default_reset_url(),
        }
    }
}

/// SMTP settings; without `smtp_host` outgoing mail is only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
}

fn default_smtp_port() -> u16 { 587 }
fn default_from() -> String { "Auth Service <no-reply@localhost>".into() }

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from: default_from(),
        }
    }
}

/// Per-client call budget for login, resend and forgot-password.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// Key clients by the first `X-Forwarded-For` hop. Only enable behind a proxy that sets it.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_max_requests() -> u32 { 5 }
fn default_window() -> u64 { 3600 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: true, max_requests: default_max_requests(), window_secs: default_window(), trust_forwarded_for: false }
    }
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Config used when no `config.toml` exists: defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut cfg = AppConfig::default();
        if let Ok(host) = std::env::var("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            cfg.server.port = port;
        }
        cfg.database = DatabaseConfig {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            auto_migrate: true,
            ..DatabaseConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        self.auth.normalize_from_env();
        self.auth.validate()?;
        self.mail.normalize_from_env();
        self.rate_limit.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        // 0 means unset; the binary then falls back to TOKIO_WORKER_THREADS
        if self.worker_threads == Some(0) {
            self.worker_threads = None;
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        // DATABASE_URL fills in a missing url
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl AuthSettings {
    pub fn normalize_from_env(&mut self) {
        if self.jwt_secret.trim().is_empty() {
            if let Ok(s) = std::env::var("JWT_SECRET") {
                self.jwt_secret = s;
            }
        }
        if self.secret_key.trim().is_empty() {
            if let Ok(s) = std::env::var("SECRET_KEY") {
                self.secret_key = s;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < 16 {
            return Err(anyhow!("auth.jwt_secret must be at least 16 bytes (or set JWT_SECRET)"));
        }
        if self.secret_key.len() < 16 {
            return Err(anyhow!("auth.secret_key must be at least 16 bytes (or set SECRET_KEY)"));
        }
        if self.access_token_ttl_minutes <= 0
            || self.verification_code_ttl_minutes <= 0
            || self.reset_token_ttl_minutes <= 0
        {
            return Err(anyhow!("auth token and code lifetimes must be positive minutes"));
        }
        if self.resend_cooldown_minutes < 0 || self.max_resend_attempts < 0 {
            return Err(anyhow!("auth resend limits must not be negative"));
        }
        Ok(())
    }
}

impl MailConfig {
    pub fn normalize_from_env(&mut self) {
        if self.smtp_host.is_none() {
            self.smtp_host = std::env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty());
        }
        if self.smtp_username.is_none() {
            self.smtp_username = std::env::var("SMTP_USERNAME").ok();
        }
        if self.smtp_password.is_none() {
            self.smtp_password = std::env::var("SMTP_PASSWORD").ok();
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && (self.max_requests == 0 || self.window_secs == 0) {
            return Err(anyhow!("rate_limit.max_requests and window_secs must be positive when enabled"));
        }
        Ok(())
    }
}
