use std::sync::Arc;

use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use arb_core::{
    audit::AuditLogger,
    broadcast::BroadcastScheduler,
    config::{Config, StoreBackend},
    directory::UserDirectory,
    kv::{KvStore, MemoryKv},
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    pairing::PairingDirectory,
    relay::RelayRouter,
    services::Services,
    state::StateStore,
};
use arb_redis::RedisKv;
use arb_sqlite::SqliteDirectory;
use arb_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<(), arb_core::Error> {
    arb_core::logging::init("arb")?;

    let cfg = Arc::new(Config::load()?);

    let kv: Arc<dyn KvStore> = match cfg.store_backend {
        StoreBackend::Redis => {
            let redis = RedisKv::connect(&cfg.redis_url).await?;
            redis.ping().await?;
            Arc::new(redis)
        }
        StoreBackend::Memory => {
            warn!("using in-process store; state and pairings are lost on restart");
            Arc::new(MemoryKv::new())
        }
    };

    let directory = SqliteDirectory::connect(&cfg.database_url).await?;
    directory.health_check().await?;
    let directory: Arc<dyn UserDirectory> = Arc::new(directory);

    // Telegram rejects bursts; every outbound call goes through the throttle.
    // RetryAfter is still retried once inside the adapter.
    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let raw_messenger: Arc<dyn MessagingPort> =
        Arc::new(TelegramMessenger::new(bot.clone(), cfg.protect_content));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let shutdown = CancellationToken::new();
    let broadcaster = Arc::new(BroadcastScheduler::new(
        messenger.clone(),
        directory.clone(),
        cfg.broadcast(),
        shutdown.clone(),
    ));

    let svc = Services {
        messenger,
        states: Arc::new(StateStore::new(kv.clone(), cfg.state_ttl)),
        pairing: Arc::new(PairingDirectory::new(kv)),
        directory,
        broadcaster,
        audit: Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        )),
        cfg: cfg.clone(),
    };
    let router = Arc::new(RelayRouter::new(svc));

    tokio::spawn(wait_for_signal(shutdown.clone()));

    arb_telegram::router::run_polling(cfg, bot, router, shutdown)
        .await
        .map_err(|e| arb_core::Error::External(format!("telegram bot failed: {e}")))?;

    info!("bye");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown requested");
    shutdown.cancel();
}
