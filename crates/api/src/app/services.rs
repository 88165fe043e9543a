//! Service wiring shared by all handlers.

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use tracing::info;

use bookstore_auth::{
    AccountService, AdminSeed, CachedIdentityLookup, ClaimsAugmentation, IdentityStore,
    InMemoryIdentityStore, TokenError, TokenService, TokenSettings,
};
use bookstore_books::{BookRepository, FileStorage};
use bookstore_core::{Clock, SystemClock};
use bookstore_infra::{InMemoryBookRepository, LocalFileStorage, PostgresIdentityStore};

use crate::config::AppConfig;

/// Everything a handler may need. Cheap to share behind an `Arc`.
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub identities: Arc<CachedIdentityLookup>,
    pub tokens: Arc<TokenService>,
    pub augmentation: Arc<ClaimsAugmentation>,
    pub books: Arc<dyn BookRepository>,
    pub files: Arc<dyn FileStorage>,
    pub clock: Arc<dyn Clock>,
}

impl AppServices {
    /// Wire the auth subsystem around `store`. The clock drives token
    /// issuance/expiry, cache TTLs and book timestamps.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        books: Arc<dyn BookRepository>,
        files: Arc<dyn FileStorage>,
        token_settings: &TokenSettings,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let tokens = Arc::new(TokenService::with_clock(token_settings, clock.clone())?);
        let identities = Arc::new(CachedIdentityLookup::with_clock(store, cache_ttl, clock.clone()));
        let augmentation = Arc::new(ClaimsAugmentation::new(identities.clone()));
        let accounts = Arc::new(AccountService::new(identities.clone(), tokens.clone()));

        Ok(Self {
            accounts,
            identities,
            tokens,
            augmentation,
            books,
            files,
            clock,
        })
    }

    /// Startup wiring from configuration.
    ///
    /// Any failure here is fatal: the process must not serve requests with a
    /// missing signing key or an unreachable identity store.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn IdentityStore> = match &config.database_url {
            Some(url) => {
                let store = PostgresIdentityStore::connect(url)
                    .await
                    .context("failed to connect to the identity store")?;
                info!("using postgres identity store");
                Arc::new(store)
            }
            None => {
                info!("DATABASE_URL not set; using in-memory identity store");
                Arc::new(InMemoryIdentityStore::new())
            }
        };

        let files = LocalFileStorage::init(&config.upload_dir, config.upload_remove_all)
            .await
            .with_context(|| {
                format!("failed to prepare upload directory {}", config.upload_dir.display())
            })?;

        let services = Self::new(
            store,
            Arc::new(InMemoryBookRepository::new()),
            Arc::new(files),
            &config.token_settings(),
            config.cache_ttl(),
            Arc::new(SystemClock),
        )
        .context("invalid token configuration")?;

        if let Some(admin) = &config.admin {
            match services
                .accounts
                .ensure_admin(&admin.username, &admin.password)
                .await
                .context("failed to seed the admin identity")?
            {
                AdminSeed::Created(identity) => {
                    info!(user_id = %identity.id, username = %identity.username, "admin identity created")
                }
                AdminSeed::AlreadyPresent(identity) => {
                    info!(user_id = %identity.id, username = %identity.username, "admin identity already present")
                }
            }
        }

        Ok(services)
    }
}
