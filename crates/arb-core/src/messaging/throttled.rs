use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::{
    domain::{MessageRef, Recipient},
    limiter::IntervalLimiter,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities, OutgoingMessage},
    },
    Result,
};

/// Per-chat limiters are pruned once the map grows past this many chats.
const PRUNE_THRESHOLD: usize = 256;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(34), // ~30/sec
            per_chat_min_interval: Duration::from_millis(50),
        }
    }
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// This is a best-effort defense against Telegram 429 errors. It does not
/// guarantee zero 429s, but it should drastically reduce them.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if map.len() >= PRUNE_THRESHOLD && !map.contains_key(&chat_id) {
            // Keep limiters still in use or with a reservation in the future.
            map.retain(|_, lim| {
                Arc::strong_count(lim) > 1 || lim.try_lock().map_or(true, |l| !l.is_idle())
            });
        }
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    #[cfg(test)]
    async fn tracked_chats(&self) -> usize {
        self.per_chat.lock().await.len()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle(&self, to: &Recipient) {
        match to.chat_key() {
            Some(chat) => self.throttle_chat(chat).await,
            None => self.throttle_global().await,
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send(&self, to: &Recipient, msg: OutgoingMessage) -> Result<MessageRef> {
        self.throttle(to).await;
        self.inner.send(to, msg).await
    }

    async fn edit_markup(&self, msg: MessageRef, keyboard: Option<InlineKeyboard>) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit_markup(msg, keyboard).await
    }

    async fn edit_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit_text(msg, text, keyboard).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.delete_message(msg).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // No chat_id available here; apply global throttling only.
        self.throttle_global().await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}
