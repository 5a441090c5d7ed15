//! commsd - identity and access daemon for the commcomms platform.

use commsd::api::{self, AppState};
use commsd::auth::jwt::TokenAuthority;
use commsd::auth::password::Argon2PasswordHasher;
use commsd::auth::rate_limit::RateLimiters;
use commsd::config::{self, Config};
use commsd::db::Database;
use commsd::identity::IdentityService;
use commsd::identity::invite::InviteService;
use commsd::identity::reputation::ReputationService;
use commsd::metrics;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(server = %config.server.name, bind = %config.server.bind, "Starting commsd");

    // SECURITY: Refuse to start with the default/weak signing secret.
    // Every token this daemon issues is an HMAC over that secret; a
    // predictable one lets anyone mint credentials.
    if config::is_default_secret(&config.auth.token_secret) {
        if std::env::var("COMMSD_ALLOW_INSECURE_SECRET").is_ok() {
            tracing::warn!(
                "INSECURE: Running with a weak token_secret (allowed via COMMSD_ALLOW_INSECURE_SECRET)"
            );
        } else {
            error!("FATAL: Insecure token_secret detected!");
            error!("  Set a strong secret in config.toml:");
            error!("    [auth]");
            error!("    token_secret = \"<random-32-char-string>\"");
            error!("  Generate one with: openssl rand -hex 32");
            error!("  For testing only, set COMMSD_ALLOW_INSECURE_SECRET=1 to bypass this check.");
            return Err(anyhow::anyhow!(
                "Refusing to start with an insecure token_secret. See error messages above."
            ));
        }
    }

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    metrics::init();
    info!("Metrics initialized");

    let registered = db.users().count().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to count registered users");
        0
    });
    if let Some(gauge) = metrics::REGISTERED_USERS.get() {
        gauge.set(registered);
    }
    info!(count = registered, "Loaded registered users");

    // Assemble the identity core
    let tokens = Arc::new(TokenAuthority::from_config(
        &config.auth,
        &config.server.name,
    ));
    let hasher = Arc::new(Argon2PasswordHasher);
    let revoked = Arc::new(db.revoked_tokens());

    let identity = IdentityService::new(
        Arc::new(db.users()),
        Arc::new(db.invites()),
        hasher,
        Arc::clone(&tokens),
        revoked.clone(),
    );
    let invites = InviteService::new(Arc::new(db.invites()), Arc::new(db.communities()));
    let reputation = ReputationService::new(Arc::new(db.reputation()));

    let limiters = Arc::new(RateLimiters::new(&config.rate_limits));

    // Sweep idle rate-limit buckets and stale revocations periodically,
    // outside of request flow.
    {
        let limiters = Arc::clone(&limiters);
        let revoked = db.revoked_tokens();
        let refresh_ttl_secs = (config.auth.refresh_ttl_days * 86400) as i64;
        let sweep_interval =
            tokio::time::Duration::from_secs(config.rate_limits.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                limiters.sweep();
                match revoked.prune(refresh_ttl_secs).await {
                    Ok(removed) if removed > 0 => {
                        info!(removed, "Stale token revocations pruned");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to prune token revocations");
                    }
                }
            }
        });
    }
    info!("Maintenance sweep task started");

    let state = Arc::new(AppState {
        identity,
        invites,
        reputation,
        tokens,
        limiters,
        access_ttl_secs: config.auth.access_ttl_mins * 60,
    });

    api::serve(state, config.server.bind).await
}
