//! In-process fakes for the ports, shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    audit::AuditLogger,
    broadcast::BroadcastScheduler,
    config::Config,
    directory::{Audience, UserDirectory},
    domain::{ChatId, MessageId, MessageRef, Recipient, UserId},
    errors::Error,
    kv::{KvStore, MemoryKv},
    messaging::{
        port::MessagingPort,
        types::{
            CallbackQuery, IncomingMessage, InlineKeyboard, MessagePayload,
            MessagingCapabilities, OutgoingMessage,
        },
    },
    pairing::PairingDirectory,
    services::Services,
    state::{StateStore, DEFAULT_STATE_TTL},
    Result,
};

pub const OPERATOR: UserId = UserId(1);
pub const MINI_APP_URL: &str = "https://app.example/match";

pub fn audit_channel() -> Recipient {
    Recipient::Channel("@relay_audit".to_string())
}

/// Fully wired services over in-memory fakes.
pub struct Harness {
    pub fake: Arc<FakeMessenger>,
    pub dir: Arc<FakeDirectory>,
    pub kv: Arc<MemoryKv>,
    pub svc: Services,
}

impl Harness {
    pub fn new(dir: FakeDirectory) -> Self {
        static SEQ: AtomicUsize = AtomicUsize::new(0);

        let fake = Arc::new(FakeMessenger::new());
        let dir = Arc::new(dir);
        let kv = Arc::new(MemoryKv::new());

        let mut cfg = Config::new("test-token", vec![OPERATOR.0], audit_channel());
        cfg.mini_app_url = Some(MINI_APP_URL.to_string());
        cfg.broadcast_menu_delay = Duration::ZERO;
        cfg.audit_log_path = std::env::temp_dir().join(format!(
            "arb-core-test-{}-{}.log",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        cfg.audit_log_json = true;
        let cfg = Arc::new(cfg);

        let broadcaster = Arc::new(BroadcastScheduler::new(
            fake.clone(),
            dir.clone(),
            cfg.broadcast(),
            CancellationToken::new(),
        ));
        let svc = Services {
            messenger: fake.clone(),
            states: Arc::new(StateStore::new(kv.clone(), DEFAULT_STATE_TTL)),
            pairing: Arc::new(PairingDirectory::new(kv.clone())),
            directory: dir.clone(),
            broadcaster,
            audit: Arc::new(AuditLogger::new(cfg.audit_log_path.clone(), true)),
            cfg,
        };

        Self { fake, dir, kv, svc }
    }

    pub fn message(user: UserId, payload: Option<MessagePayload>) -> IncomingMessage {
        IncomingMessage {
            chat_id: user.into(),
            user_id: user,
            username: None,
            payload,
        }
    }

    pub fn text(user: UserId, text: &str) -> IncomingMessage {
        Self::message(
            user,
            Some(MessagePayload::Text {
                text: text.to_string(),
            }),
        )
    }

    pub fn callback(user: UserId, data: &str) -> CallbackQuery {
        CallbackQuery {
            chat_id: user.into(),
            user_id: user,
            username: None,
            callback_id: format!("cb-{}-{data}", user.0),
            data: data.to_string(),
            message: None,
        }
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    pub sends: Mutex<Vec<(Recipient, OutgoingMessage, MessageRef)>>,
    pub markup_edits: Mutex<Vec<(MessageRef, Option<InlineKeyboard>)>>,
    pub text_edits: Mutex<Vec<(MessageRef, String)>>,
    pub deletes: Mutex<Vec<MessageRef>>,
    pub answers: Mutex<Vec<(String, Option<String>)>>,
    unreachable: Mutex<HashSet<Recipient>>,
    flaky: Mutex<HashSet<Recipient>>,
    undeletable: Mutex<HashSet<MessageRef>>,
    send_delay: Mutex<Option<Duration>>,
    caps: Mutex<Option<MessagingCapabilities>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    /// Sends to `to` fail as if the bot were blocked.
    pub fn block(&self, to: impl Into<Recipient>) {
        self.unreachable.lock().unwrap().insert(to.into());
    }

    /// Sends to `to` fail with a transient error.
    pub fn break_link(&self, to: impl Into<Recipient>) {
        self.flaky.lock().unwrap().insert(to.into());
    }

    pub fn refuse_delete(&self, msg: MessageRef) {
        self.undeletable.lock().unwrap().insert(msg);
    }

    pub fn delay_sends(&self, d: Duration) {
        *self.send_delay.lock().unwrap() = Some(d);
    }

    /// Reports `caps` instead of the Telegram-like defaults.
    pub fn set_capabilities(&self, caps: MessagingCapabilities) {
        *self.caps.lock().unwrap() = Some(caps);
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }

    pub fn sent_to(&self, to: impl Into<Recipient>) -> Vec<OutgoingMessage> {
        let to = to.into();
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _, _)| *r == to)
            .map(|(_, m, _)| m.clone())
            .collect()
    }

    pub fn texts_to(&self, to: impl Into<Recipient>) -> Vec<String> {
        self.sent_to(to)
            .into_iter()
            .filter_map(|m| match m.payload {
                MessagePayload::Text { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, m, _)| match &m.payload {
                MessagePayload::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.caps.lock().unwrap().unwrap_or(MessagingCapabilities {
            supports_edit: true,
            supports_web_apps: true,
            max_message_len: 4096,
            max_caption_len: 1024,
        })
    }

    async fn send(&self, to: &Recipient, msg: OutgoingMessage) -> Result<MessageRef> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.unreachable.lock().unwrap().contains(to) {
            return Err(Error::Unreachable(format!("{to} blocked the bot")));
        }
        if self.flaky.lock().unwrap().contains(to) {
            return Err(Error::External(format!("network error sending to {to}")));
        }
        let chat = match to {
            Recipient::Chat(c) => *c,
            Recipient::Channel(_) => ChatId(-1),
        };
        let r = self.alloc(chat);
        self.sends.lock().unwrap().push((to.clone(), msg, r));
        Ok(r)
    }

    async fn edit_markup(&self, msg: MessageRef, keyboard: Option<InlineKeyboard>) -> Result<()> {
        self.markup_edits.lock().unwrap().push((msg, keyboard));
        Ok(())
    }

    async fn edit_text(
        &self,
        msg: MessageRef,
        text: &str,
        _keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        self.text_edits.lock().unwrap().push((msg, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        if self.undeletable.lock().unwrap().contains(&msg) {
            return Err(Error::External("message to delete not found".to_string()));
        }
        self.deletes.lock().unwrap().push(msg);
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub audiences: Mutex<HashMap<Audience, Vec<UserId>>>,
    pub nicknames: Mutex<HashMap<UserId, String>>,
    pub remembered: Mutex<Vec<UserId>>,
    pub down: Mutex<bool>,
}

impl FakeDirectory {
    pub fn with_audience(self, audience: Audience, users: Vec<UserId>) -> Self {
        self.audiences.lock().unwrap().insert(audience, users);
        self
    }

    pub fn with_nickname(self, user: UserId, nick: &str) -> Self {
        self.nicknames.lock().unwrap().insert(user, nick.to_string());
        self
    }

    pub fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    fn check(&self) -> Result<()> {
        if *self.down.lock().unwrap() {
            return Err(Error::Store("directory offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn audience(&self, audience: Audience) -> Result<Vec<UserId>> {
        self.check()?;
        Ok(self
            .audiences
            .lock()
            .unwrap()
            .get(&audience)
            .cloned()
            .unwrap_or_default())
    }

    async fn nickname(&self, user: UserId) -> Result<Option<String>> {
        self.check()?;
        Ok(self.nicknames.lock().unwrap().get(&user).cloned())
    }

    async fn remember(&self, user: UserId, _username: Option<&str>) -> Result<()> {
        self.check()?;
        let mut seen = self.remembered.lock().unwrap();
        if !seen.contains(&user) {
            seen.push(user);
        }
        Ok(())
    }
}

/// A store that is always unreachable.
pub struct DownKv;

#[async_trait]
impl KvStore for DownKv {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<()> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<()> {
        Err(Error::Store("connection refused".to_string()))
    }
}

/// In-memory store whose `get` calls start failing after `ok` successes,
/// until [`FailingGets::heal`] is called.
pub struct FailingGets {
    inner: MemoryKv,
    ok: usize,
    gets: AtomicUsize,
    healed: Mutex<bool>,
}

impl FailingGets {
    pub fn after(ok: usize) -> Self {
        Self {
            inner: MemoryKv::new(),
            ok,
            gets: AtomicUsize::new(0),
            healed: Mutex::new(false),
        }
    }

    pub fn heal(&self) {
        *self.healed.lock().unwrap() = true;
    }
}

#[async_trait]
impl KvStore for FailingGets {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let n = self.gets.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok && !*self.healed.lock().unwrap() {
            return Err(Error::Store("read timed out".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}
