use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::{AppConfig, MailConfig};
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use service::auth::repo::seaorm::SeaOrmAuthRepository;
use service::auth::repository::AuthRepository;
use service::auth::verification::RandomCodeGenerator;
use service::auth::{AuthConfig, AuthService};
use service::clock::SystemClock;
use service::mail::{LogMailer, Mailer, SmtpMailer};

use crate::errors::StartupError;
use crate::rate_limit;
use crate::routes::{self, auth::ServerState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Resolved configuration plus why the file was skipped, if it was.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub file_error: Option<String>,
}

impl LoadedConfig {
    /// Report the config source; call once the subscriber is installed.
    pub fn log_source(&self) {
        match &self.file_error {
            None => info!("configuration loaded from file"),
            Some(e) => warn!(error = %e, "config file unusable, falling back to environment"),
        }
    }
}

/// `config.toml` (or `CONFIG_PATH`) when present, else defaults plus environment.
pub fn load_config() -> anyhow::Result<LoadedConfig> {
    resolve_config(AppConfig::load_and_validate(), AppConfig::from_env)
}

fn resolve_config(
    file: anyhow::Result<AppConfig>,
    from_env: impl FnOnce() -> anyhow::Result<AppConfig>,
) -> anyhow::Result<LoadedConfig> {
    match file {
        Ok(config) => Ok(LoadedConfig { config, file_error: None }),
        Err(file_err) => {
            let config = from_env().map_err(|e| anyhow::anyhow!("{e} (config file: {file_err})"))?;
            Ok(LoadedConfig { config, file_error: Some(file_err.to_string()) })
        }
    }
}

fn build_mailer(cfg: &MailConfig) -> Arc<dyn Mailer> {
    if cfg.smtp_host.is_none() {
        info!("smtp_host not set, outgoing mail will only be logged");
        return Arc::new(LogMailer);
    }
    match SmtpMailer::from_config(cfg) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "smtp mailer unavailable, outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    }
}

/// Wire repository, mailer and limiter into the shared handler state.
pub fn build_state(cfg: &AppConfig, repo: Arc<dyn AuthRepository>, mailer: Arc<dyn Mailer>) -> ServerState {
    let auth = AuthService::with_parts(
        repo,
        AuthConfig::from(&cfg.auth),
        Arc::new(SystemClock),
        mailer,
        Arc::new(RandomCodeGenerator),
    );
    ServerState {
        auth: Arc::new(auth),
        limiter: rate_limit::from_config(&cfg.rate_limit),
        trust_forwarded_for: cfg.rate_limit.trust_forwarded_for,
    }
}

/// Public entry: load config and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let loaded = load_config()?;
    loaded.log_source();
    run_with_config(loaded.config).await
}

pub async fn run_with_config(cfg: AppConfig) -> anyhow::Result<()> {
    let db = models::db::connect_with_config(&cfg.database)
        .await
        .map_err(|e| StartupError::Database(e.to_string()))?;
    if cfg.database.auto_migrate {
        migration::Migrator::up(&db, None).await?;
        info!("database migrations applied");
    }

    let repo: Arc<dyn AuthRepository> = Arc::new(SeaOrmAuthRepository::new(db));
    let state = build_state(&cfg, repo, build_mailer(&cfg.mail));
    let app: Router = routes::build_router(state, build_cors());

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {e}")))?;
    info!(%addr, "starting auth server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_wins() -> anyhow::Result<()> {
        let loaded = resolve_config(Ok(AppConfig::default()), || Err(anyhow::anyhow!("unused")))?;
        assert!(loaded.file_error.is_none());
        Ok(())
    }

    #[test]
    fn env_fallback_keeps_file_error_for_later_logging() -> anyhow::Result<()> {
        let loaded = resolve_config(Err(anyhow::anyhow!("config.toml: not found")), || Ok(AppConfig::default()))?;
        assert_eq!(loaded.file_error.as_deref(), Some("config.toml: not found"));
        assert_eq!(loaded.config.server.port, 5000);
        Ok(())
    }

    #[test]
    fn both_sources_failing_reports_both() {
        let err = resolve_config(Err(anyhow::anyhow!("config.toml: not found")), || {
            Err(anyhow::anyhow!("database.url is empty"))
        })
        .unwrap_err()
        .to_string();
        assert!(err.contains("database.url is empty"));
        assert!(err.contains("config.toml: not found"));
    }
}
