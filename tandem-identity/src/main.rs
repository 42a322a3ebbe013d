use std::sync::Arc;

use tandem_identity::cache::{Cache, MemoryCache, RedisCache};
use tandem_identity::config::{AppConfig, CacheBackend, MailerBackend, StorageBackend};
use tandem_identity::notify::{ConsoleNotifier, Notifier};
use tandem_identity::routes;
use tandem_identity::services::federation::GoogleProvider;
use tandem_identity::services::{Collaborators, IdentityService};
use tandem_identity::store::{AccountStore, MemoryStore, PgStore, ResourceStore};
use tandem_identity::AppState;
use tandem_shared::clients::db::create_pool;
use tandem_shared::clients::email::EmailClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tandem_shared::middleware::init_tracing("tandem-identity");

    let config = AppConfig::load()?;
    let port = config.port;

    let (accounts, resources): (Arc<dyn AccountStore>, Arc<dyn ResourceStore>) = match config.storage {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            split_store(Arc::new(PgStore::new(pool, config.store_timeout())))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            split_store(Arc::new(MemoryStore::new()))
        }
    };

    let cache: Arc<dyn Cache> = match config.cache {
        CacheBackend::Redis => Arc::new(RedisCache::connect(&config.redis_url, config.cache_timeout()).await?),
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
    };

    let notifier: Arc<dyn Notifier> = match config.mailer {
        MailerBackend::Resend => Arc::new(EmailClient::new(
            &config.resend_api_key,
            &config.from_email,
            &config.from_name,
            config.http_timeout(),
        )?),
        MailerBackend::Console => Arc::new(ConsoleNotifier),
    };

    let provider = Arc::new(GoogleProvider::new(
        &config.google_client_id,
        &config.google_client_secret,
        &config.google_redirect_uri,
        config.http_timeout(),
    )?);

    let metrics_handle = match tandem_shared::middleware::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let identity = IdentityService::new(
        &config,
        Collaborators { accounts, resources, cache, notifier, provider },
    );
    let app = routes::router(AppState::new(config, identity, metrics_handle));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "tandem-identity starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn split_store<S>(store: Arc<S>) -> (Arc<dyn AccountStore>, Arc<dyn ResourceStore>)
where
    S: AccountStore + ResourceStore + 'static,
{
    (store.clone() as Arc<dyn AccountStore>, store as Arc<dyn ResourceStore>)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
