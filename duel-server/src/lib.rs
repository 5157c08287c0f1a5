use std::sync::Arc;
use tracing::info;

use crate::broadcast::BroadcastEventSink;
use crate::config::{Config, LockBackend};
use crate::room_service::RoomService;
use duel_core::{
    CachedDictionary, DirectoryWordSource, EventBus, LocalLockProvider, LockProvider, RoomEngine,
    SystemClock, TracingEventSink,
};
use duel_persistence::{SeaRoomStore, connection::connect_and_migrate};

pub mod broadcast;
pub mod config;
#[cfg(feature = "redis-lock")]
pub mod redis_lock;
pub mod room_service;

/// Everything the binary wires together.
pub struct ServerContext {
    pub rooms: Arc<RoomService>,
    pub broadcast: BroadcastEventSink,
}

pub async fn build_context(config: &Config) -> anyhow::Result<ServerContext> {
    let engine_config = config.engine();
    let db = connect_and_migrate(&config.database_url).await?;
    let store = Arc::new(SeaRoomStore::new(db).with_lock_timeout(engine_config.lock_timeout));

    info!("Loading words from directory: {}", config.words_directory);
    let dictionary = Arc::new(CachedDictionary::new(
        DirectoryWordSource::new(&config.words_directory),
        config.dictionary_cache_ttl(),
    ));

    let lock_provider = build_lock_provider(config).await?;

    let broadcast = BroadcastEventSink::new(1024);
    let events = EventBus::new()
        .with_sink(Arc::new(TracingEventSink))
        .with_sink(Arc::new(broadcast.clone()));

    let engine = RoomEngine::new(dictionary, Arc::new(SystemClock), &engine_config);
    let rooms = Arc::new(RoomService::new(
        store,
        lock_provider,
        engine,
        Arc::new(events),
        engine_config,
    ));

    Ok(ServerContext { rooms, broadcast })
}

async fn build_lock_provider(config: &Config) -> anyhow::Result<Arc<dyn LockProvider>> {
    match config.lock_backend {
        LockBackend::Local => {
            info!("Using process-local room locks");
            Ok(Arc::new(LocalLockProvider::new()))
        }
        #[cfg(feature = "redis-lock")]
        LockBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("REDIS_URL is not set"))?;
            info!("Using Redis room locks");
            let provider = redis_lock::RedisLockProvider::connect(url, config.lock_ttl()).await?;
            Ok(Arc::new(provider))
        }
        #[cfg(not(feature = "redis-lock"))]
        LockBackend::Redis => {
            anyhow::bail!("LOCK_BACKEND=redis needs the server built with the redis-lock feature")
        }
    }
}
