//! Integration test common infrastructure.
//!
//! Builds a fully wired identity core over an in-memory database, and can
//! spawn the HTTP API on an ephemeral port for end-to-end tests.

#![allow(dead_code)]

use chrono::Duration;
use commsd::api::{self, AppState};
use commsd::auth::jwt::TokenAuthority;
use commsd::auth::password::Argon2PasswordHasher;
use commsd::auth::rate_limit::RateLimiters;
use commsd::config::RateLimitConfig;
use commsd::db::Database;
use commsd::identity::IdentityService;
use commsd::identity::invite::{Community, CommunityStore, InviteOptions, InviteService};
use commsd::identity::reputation::ReputationService;
use std::net::SocketAddr;
use std::sync::Arc;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789";

/// A wired identity core over an in-memory database.
pub struct TestCore {
    pub db: Database,
    pub identity: Arc<IdentityService>,
    pub invites: Arc<InviteService>,
    pub reputation: Arc<ReputationService>,
    pub tokens: Arc<TokenAuthority>,
}

impl TestCore {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_authority(|secret| {
            TokenAuthority::new(
                secret,
                "commcomms",
                "commcomms-api",
                Duration::minutes(15),
                Duration::days(7),
            )
        })
        .await
    }

    /// Build a core whose token authority is customized (e.g. negative
    /// TTLs to mint already-expired tokens).
    pub async fn with_authority(
        make: impl FnOnce(&'static [u8]) -> TokenAuthority,
    ) -> anyhow::Result<Self> {
        let db = Database::new(":memory:").await?;
        let tokens = Arc::new(make(TEST_SECRET));
        let hasher = Arc::new(Argon2PasswordHasher);

        let identity = Arc::new(IdentityService::new(
            Arc::new(db.users()),
            Arc::new(db.invites()),
            hasher,
            Arc::clone(&tokens),
            Arc::new(db.revoked_tokens()),
        ));
        let invites = Arc::new(InviteService::new(
            Arc::new(db.invites()),
            Arc::new(db.communities()),
        ));
        let reputation = Arc::new(ReputationService::new(Arc::new(db.reputation())));

        Ok(Self {
            db,
            identity,
            invites,
            reputation,
            tokens,
        })
    }

    /// Seed a community and return the code of a fresh invite into it.
    pub async fn seed_invite(&self, max_uses: i64) -> anyhow::Result<String> {
        self.seed_invite_with(InviteOptions {
            expires_at: None,
            max_uses,
        })
        .await
    }

    pub async fn seed_invite_with(&self, opts: InviteOptions) -> anyhow::Result<String> {
        let communities = self.db.communities();
        if communities.find_by_id("comm-1").await?.is_none() {
            communities
                .create(&Community {
                    id: "comm-1".into(),
                    name: "The Commons".into(),
                })
                .await?;
        }
        let invite = self.invites.create_invite("comm-1", "seed", opts).await?;
        Ok(invite.code)
    }
}

/// The HTTP API spawned on an ephemeral port.
pub struct TestServer {
    pub core: TestCore,
    pub base: String,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> anyhow::Result<Self> {
        // Generous default budgets; the admission tests bring their own.
        Self::spawn_with_limits(RateLimitConfig::default()).await
    }

    pub async fn spawn_with_limits(limits: RateLimitConfig) -> anyhow::Result<Self> {
        let core = TestCore::new().await?;

        let state = Arc::new(AppState {
            identity: IdentityService::new(
                Arc::new(core.db.users()),
                Arc::new(core.db.invites()),
                Arc::new(Argon2PasswordHasher),
                Arc::clone(&core.tokens),
                Arc::new(core.db.revoked_tokens()),
            ),
            invites: InviteService::new(
                Arc::new(core.db.invites()),
                Arc::new(core.db.communities()),
            ),
            reputation: ReputationService::new(Arc::new(core.db.reputation())),
            tokens: Arc::clone(&core.tokens),
            limiters: Arc::new(RateLimiters::new(&limits)),
            access_ttl_secs: 900,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = api::router(state).into_make_service_with_connect_info::<SocketAddr>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            core,
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}
