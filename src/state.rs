use crate::auth::repo::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::{AppConfig, JwtConfig, DEFAULT_TOKEN_TTL_MINUTES};
use crate::reviews::repo::{MemoryReviewStore, PgReviewStore, ReviewStore};
use crate::store;
use std::sync::Arc;

/// Which persistence the stores sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    /// Status string reported by `/health`.
    pub fn status(self) -> &'static str {
        match self {
            StoreBackend::Postgres => "connected",
            StoreBackend::Memory => "in-memory",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub backend: StoreBackend,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        if config.jwt.secret.is_none() {
            tracing::warn!("JWT_SECRET is not set; login and authenticated routes will fail");
        }

        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL is not set; using in-memory stores");
            return Ok(Self::in_memory(config));
        };

        let db = store::connect(database_url).await?;
        tracing::info!("connected to postgres, migrations applied");

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgReviewStore::new(db)),
            StoreBackend::Postgres,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        reviews: Arc<dyn ReviewStore>,
        backend: StoreBackend,
    ) -> Self {
        Self {
            config,
            users,
            reviews,
            backend,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryReviewStore::new()),
            StoreBackend::Memory,
        )
    }

    /// In-memory state with a fixed signing secret, for tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: Some("test-secret".into()),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            },
            allowed_origins: vec!["http://localhost:3000".into()],
            environment: "test".into(),
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::in_memory(config)
    }
}
