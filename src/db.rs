use crate::cache::InMemoryEntityCache;
use crate::config::{CacheConfig, DatabaseConfig};
use crate::database::postgres_repository::PostgresRepository;
use crate::models::password_reset_ticket::PasswordResetTicket;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

pub(crate) async fn init_pool(db_config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let options = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800));

    if db_config.lazy_connect {
        return options.connect_lazy(&db_config.url);
    }

    let pool = options.connect(&db_config.url).await?;

    if db_config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

pub fn stage_db(db_config: DatabaseConfig, cache_config: CacheConfig) -> AdHoc {
    AdHoc::try_on_ignite("Postgres (sqlx)", move |rocket| async move {
        match init_pool(&db_config).await {
            Ok(pool) => {
                tracing::info!("Database pool initialized successfully");
                let ticket_cache = Arc::new(InMemoryEntityCache::<PasswordResetTicket>::new(cache_config.max_entries));
                Ok(rocket.manage(PostgresRepository::new(pool, ticket_cache)))
            }
            Err(e) => {
                tracing::error!("Failed to initialize database pool: {}", e);
                Err(rocket)
            }
        }
    })
}
