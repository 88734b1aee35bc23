use std::sync::Arc;

use crate::auth::extractor::AuthUser;
use crate::auth::identity::IdentityProvider;
use crate::config::Config;
use crate::db::Store;
use crate::rate_limit::LoginRateLimiter;
use crate::services::{
    CompanyRules, CompanyService, PersonRules, PersonService, TimeRecordService, UserContext,
};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Config,
    pub login_limiter: LoginRateLimiter,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>, config: Config) -> Self {
        Self {
            store,
            identity,
            config,
            login_limiter: LoginRateLimiter::new(),
        }
    }

    // Services are scoped to one caller, so each request builds its own.

    pub fn time_records(&self, caller: &AuthUser) -> TimeRecordService {
        TimeRecordService::new(self.store.clone(), self.config.retry, context(caller))
    }

    pub fn persons(&self, caller: &AuthUser) -> PersonService {
        PersonService::new(
            PersonRules::new(context(caller), self.identity.clone()),
            self.store.clone(),
            self.config.retry,
        )
    }

    pub fn company(&self, caller: &AuthUser) -> CompanyService {
        CompanyService::new(
            CompanyRules::new(context(caller)),
            self.store.clone(),
            self.config.retry,
        )
    }
}

fn context(caller: &AuthUser) -> Arc<dyn UserContext> {
    Arc::new(caller.clone())
}
