use std::{sync::Arc, time::Duration};

use redis::Client as RedisClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidtube_api::{
    config::{Config, ObjectStoreKind},
    db::{self, PgStore},
    routes::create_router,
    services::{object_store, tokens::TokenService},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);
    let tokens = Arc::new(TokenService::from_config(&config)?);

    let pool = db::create_pool(
        &config.database_url,
        Duration::from_secs(config.store_timeout_seconds),
    )
    .await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");
    let store = Arc::new(PgStore::new(pool));

    let redis = match &config.redis_url {
        Some(url) => {
            let client = RedisClient::open(url.as_str())?;
            let conn = client.get_multiplexed_async_connection().await?;
            info!("Redis connected, login rate limiting enabled");
            Some(conn)
        }
        None => {
            info!("REDIS_URL not set, login rate limiting disabled");
            None
        }
    };

    tokio::fs::create_dir_all(&config.upload_temp_dir).await?;
    if config.object_store == ObjectStoreKind::Disk {
        tokio::fs::create_dir_all(&config.media_dir).await?;
    }
    let objects = object_store::from_config(&config)?;
    info!("Object store: {:?}", config.object_store);

    let state = AppState {
        config: config.clone(),
        users: store.clone(),
        tweets: store,
        objects,
        tokens,
        redis,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("vidtube API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
