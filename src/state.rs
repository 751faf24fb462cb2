use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::{jwt::JwtKeys, password::PasswordHasher};
use crate::config::AppConfig;
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub hasher: PasswordHasher,
    pub jwt: JwtKeys,
}

impl AppState {
    /// Connects the pool, runs migrations and wires the Postgres store.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.database.clone())
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        Self::from_parts(Arc::new(config), users)
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(&config.password).context("argon2 parameters")?;
        let jwt = JwtKeys::new(&config.jwt);
        Ok(Self {
            config,
            users,
            hasher,
            jwt,
        })
    }
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> Self {
        Self::fake_with(AppConfig::for_tests())
    }

    pub fn fake_with(config: AppConfig) -> Self {
        let users = Arc::new(crate::users::memory::MemoryUserStore::default()) as Arc<dyn UserStore>;
        Self::from_parts(Arc::new(config), users).expect("test state")
    }
}
