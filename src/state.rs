use std::sync::Arc;

use crate::auth::rate_limit::RateLimitPolicy;
use crate::auth::{CookiePolicy, RateLimiter, TokenResolver};
use crate::config::Config;
use crate::db::Store;
use crate::services::{AccountService, AuthService, SeaOrmAccountService, SeaOrmAuthService};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub resolver: TokenResolver,

    pub rate_limiter: Arc<RateLimiter>,

    pub auth_service: Arc<dyn AuthService>,

    pub account_service: Arc<dyn AccountService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self::with_store(config, store))
    }

    /// Wire services around an already-open store.
    #[must_use]
    pub fn with_store(config: Config, store: Store) -> Self {
        let resolver = TokenResolver::new(store.clone(), config.tokens.lifetime());
        let rate_limiter = Arc::new(RateLimiter::in_memory(config.security.trusted_proxies()));

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.tokens.clone(),
            config.security.clone(),
        )) as Arc<dyn AuthService>;

        let account_service = Arc::new(SeaOrmAccountService::new(
            store.clone(),
            config.security.clone(),
        )) as Arc<dyn AccountService>;

        Self {
            config: Arc::new(config),
            store,
            resolver,
            rate_limiter,
            auth_service,
            account_service,
        }
    }

    #[must_use]
    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy::new(self.config.server.secure_cookies)
    }

    #[must_use]
    pub fn login_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::from_config("login", self.config.security.login_throttle)
    }

    #[must_use]
    pub fn signup_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::from_config("signup", self.config.security.signup_throttle)
    }
}
