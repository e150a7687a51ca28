use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use arb_core::{config::Config, relay::RelayRouter};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub router: Arc<RelayRouter>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Idle chat locks are pruned once the map grows past this many chats.
const PRUNE_THRESHOLD: usize = 256;

/// Serializes updates of one user so state transitions do not interleave.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            if map.len() >= PRUNE_THRESHOLD && !map.contains_key(&chat_id) {
                // Only the map holds a lock nobody is using or waiting on.
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Long-polls Telegram until `shutdown` fires.
pub async fn run_polling(
    cfg: Arc<Config>,
    bot: Bot,
    router: Arc<RelayRouter>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "relay bot started"),
        Err(e) => warn!(error = %e, "get_me failed; continuing"),
    }
    info!(operators = cfg.operators.len(), audit = %cfg.audit_channel, "configuration loaded");

    let state = Arc::new(AppState {
        cfg,
        router,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let stop = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        info!("stopping update polling");
        if let Ok(done) = stop.shutdown() {
            done.await;
        }
    });

    dispatcher.dispatch().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_chat_is_serialized() {
        let locks = Arc::new(ChatLocks::default());
        let guard = locks.lock_chat(1).await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(2)).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(1)).await;
        assert!(same.is_err());

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(1)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = ChatLocks::default();
        let held = locks.lock_chat(-1).await;
        for chat in 1..PRUNE_THRESHOLD as i64 {
            drop(locks.lock_chat(chat).await);
        }
        assert_eq!(locks.len().await, PRUNE_THRESHOLD);

        drop(locks.lock_chat(5_000).await);
        // Only the held lock and the new one survive.
        assert_eq!(locks.len().await, 2);
        drop(held);
    }
}
