//! Inbound update routing and the anonymous relay itself.
//!
//! Every message and callback from the platform enters through
//! [`RelayRouter::handle`]. Operator traffic is handed to the
//! [`AdminPanel`]; everyone else is relayed to their partner.

use tracing::{debug, error, info, warn};

use crate::{
    admin::AdminPanel,
    audit::{truncate_text, AuditEvent},
    callback::{CallbackAction, DeletionToken, DELETE_PREFIX, EXIT},
    deletion::DeletionCoordinator,
    domain::{ChatId, Recipient, UserId},
    messaging::types::{
        CallbackQuery, IncomingMessage, IncomingUpdate, InlineButton, InlineKeyboard, Markup,
        MessagePayload, MessagingCapabilities, OutgoingMessage, PayloadKind,
    },
    notices,
    services::Services,
    state::Mode,
};

/// Telegram caps poll questions at 300 characters.
const MAX_POLL_QUESTION: usize = 300;

pub struct RelayRouter {
    svc: Services,
    admin: AdminPanel,
    deletion: DeletionCoordinator,
}

fn exit_keyboard() -> InlineKeyboard {
    InlineKeyboard::single(InlineButton::callback(notices::EXIT_BUTTON, EXIT))
}

fn deletion_keyboard(kind: PayloadKind, token: DeletionToken) -> InlineKeyboard {
    InlineKeyboard::one_per_row([
        InlineButton::callback(notices::delete_button(kind), token.encode()),
        InlineButton::callback(notices::EXIT_BUTTON, EXIT),
    ])
}

/// Cuts `s` so that it fits in `max` characters including the ellipsis.
fn fit(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        return s;
    }
    truncate_text(&s, max.saturating_sub(3))
}

/// The copy the partner receives: the original labelled with the sender's nickname.
fn frame_for_partner(
    payload: &MessagePayload,
    header: &str,
    caps: &MessagingCapabilities,
) -> MessagePayload {
    match payload {
        MessagePayload::Text { text } => MessagePayload::Text {
            text: fit(format!("{header}: {text}"), caps.max_message_len),
        },
        MessagePayload::Poll { question, options } => MessagePayload::Poll {
            question: fit(format!("{header}: {question}"), MAX_POLL_QUESTION),
            options: options.clone(),
        },
        MessagePayload::Contact { .. } => MessagePayload::Text {
            text: format!("{header}: {}", payload.describe()),
        },
        other => other
            .with_caption(fit(format!("{header}: {}", other.describe()), caps.max_caption_len))
            .unwrap_or_else(|| other.clone()),
    }
}

/// What the sender sees in their own chat (and can later delete).
fn echo_for_sender(payload: &MessagePayload, framed: &MessagePayload) -> MessagePayload {
    match payload {
        MessagePayload::Text { .. } => MessagePayload::Text {
            text: notices::ECHO_TEXT.to_string(),
        },
        MessagePayload::Poll { .. } => payload.clone(),
        _ => framed.clone(),
    }
}

/// Copies posted to the audit channel. Kinds that cannot carry a caption get
/// a separate text note.
fn audit_copies(payload: &MessagePayload, header: &str, max_caption: usize) -> Vec<MessagePayload> {
    let note = |body: String| MessagePayload::Text {
        text: format!("{header}\n{body}"),
    };
    match payload {
        MessagePayload::Text { .. }
        | MessagePayload::Location { .. }
        | MessagePayload::Contact { .. }
        | MessagePayload::Poll { .. } => vec![note(payload.describe())],
        MessagePayload::Sticker { .. } | MessagePayload::ShortVideo { .. } => {
            vec![payload.clone(), note(payload.kind().label().to_string())]
        }
        other => vec![other
            .with_caption(fit(format!("{header}\n{}", other.describe()), max_caption))
            .unwrap_or_else(|| other.clone())],
    }
}

impl RelayRouter {
    pub fn new(svc: Services) -> Self {
        Self {
            admin: AdminPanel::new(svc.clone()),
            deletion: DeletionCoordinator::new(svc.messenger.clone()),
            svc,
        }
    }

    pub async fn handle(&self, update: IncomingUpdate) {
        match update {
            IncomingUpdate::Message(msg) => self.handle_message(msg).await,
            IncomingUpdate::Callback(q) => self.handle_callback(q).await,
        }
    }

    pub async fn handle_message(&self, msg: IncomingMessage) {
        if let Err(e) = self
            .svc
            .directory
            .remember(msg.user_id, msg.username.as_deref())
            .await
        {
            debug!(user = msg.user_id.0, error = %e, "failed to record user");
        }

        let state = self.svc.states.get_state(msg.user_id).await;
        if AdminPanel::is_command(msg.text())
            || matches!(state.mode, Mode::AdminPanel | Mode::Broadcast)
        {
            self.admin.handle(&msg, &state).await;
            return;
        }

        self.chat(msg).await;
    }

    /// Default flow: relay to the partner, or invite the user to find one.
    async fn chat(&self, msg: IncomingMessage) {
        let partner = match self.svc.pairing.partner(msg.user_id).await {
            Ok(p) => p,
            Err(e) => {
                error!(user = msg.user_id.0, error = %e, "failed to look up partner");
                None
            }
        };

        let Some(partner) = partner else {
            self.prompt_connect(msg.chat_id).await;
            return;
        };

        let Some(payload) = msg.payload.clone() else {
            let markup = Some(Markup::Inline(exit_keyboard()));
            self.notify(msg.chat_id.into(), notices::UNSUPPORTED, markup).await;
            return;
        };

        self.relay(&msg, partner, payload).await;
    }

    async fn prompt_connect(&self, chat: ChatId) {
        let markup = self
            .svc
            .cfg
            .mini_app_url
            .as_ref()
            .filter(|_| self.svc.messenger.capabilities().supports_web_apps)
            .map(|url| {
                let button = InlineButton::web_app(notices::CONNECT_BUTTON, url.clone());
                Markup::Inline(InlineKeyboard::single(button))
            });
        self.notify(chat.into(), notices::CONNECT_PROMPT, markup).await;
    }

    async fn relay(&self, msg: &IncomingMessage, partner: UserId, payload: MessagePayload) {
        let sender = msg.user_id;
        let nick = self.display_name(sender, msg.username.as_deref()).await;
        let caps = self.svc.messenger.capabilities();
        let framed = frame_for_partner(&payload, &notices::relay_header(&nick), &caps);

        // 1. Partner copy.
        let delivered = match self
            .svc
            .messenger
            .send(
                &partner.into(),
                OutgoingMessage::new(framed.clone()).with_markup(Markup::Inline(exit_keyboard())),
            )
            .await
        {
            Ok(m) => m,
            Err(e) if e.is_unreachable() => {
                info!(
                    sender = sender.0,
                    partner = partner.0,
                    error = %e,
                    "partner unreachable, ending chat"
                );
                self.end_unreachable(msg.chat_id, sender, partner).await;
                return;
            }
            Err(e) => {
                warn!(
                    sender = sender.0,
                    partner = partner.0,
                    error = %e,
                    "failed to relay message"
                );
                self.notify(msg.chat_id.into(), notices::DELIVERY_FAILED, None).await;
                return;
            }
        };

        // 2. Sender echo, then swap its keyboard for one carrying the deletion token.
        // Without edits the echo keeps the plain exit keyboard.
        let echo = OutgoingMessage::new(echo_for_sender(&payload, &framed))
            .with_markup(Markup::Inline(exit_keyboard()));
        match self.svc.messenger.send(&msg.chat_id.into(), echo).await {
            Ok(_) if !caps.supports_edit => {
                debug!(sender = sender.0, "messenger cannot edit, echo sent without delete button");
            }
            Ok(echo) => {
                let token = DeletionToken {
                    sender: echo,
                    partner: delivered,
                };
                if let Err(e) = self
                    .svc
                    .messenger
                    .edit_markup(echo, Some(deletion_keyboard(payload.kind(), token)))
                    .await
                {
                    warn!(sender = sender.0, error = %e, "failed to attach delete button");
                }
            }
            Err(e) => warn!(sender = sender.0, error = %e, "failed to echo relayed message"),
        }

        // 3. Audit channel.
        let header = notices::audit_header(&nick, partner);
        for copy in audit_copies(&payload, &header, caps.max_caption_len) {
            if let Err(e) = self
                .svc
                .messenger
                .send(&self.svc.cfg.audit_channel, OutgoingMessage::new(copy))
                .await
            {
                warn!(
                    channel = %self.svc.cfg.audit_channel,
                    error = %e,
                    "failed to mirror message to audit channel"
                );
            }
        }

        debug!(
            sender = sender.0,
            partner = partner.0,
            kind = payload.kind().label(),
            "message relayed"
        );
        self.svc.audit.record(AuditEvent::relay(
            sender,
            partner,
            payload.kind().label(),
            &payload.describe(),
        ));
    }

    async fn end_unreachable(&self, chat: ChatId, sender: UserId, partner: UserId) {
        for user in [sender, partner] {
            if let Err(e) = self.svc.pairing.unpair(user).await {
                error!(user = user.0, error = %e, "failed to tear down pairing");
            }
        }
        self.svc.audit.record(AuditEvent::unpaired(
            sender,
            Some(partner),
            "partner_unreachable",
        ));
        self.notify(chat.into(), notices::PARTNER_UNREACHABLE, None).await;
    }

    /// Profile nickname, then `@handle`, then the numeric id.
    async fn display_name(&self, user: UserId, username: Option<&str>) -> String {
        match self.svc.directory.nickname(user).await {
            Ok(Some(nick)) if !nick.trim().is_empty() => return nick.trim().to_string(),
            Ok(_) => {}
            Err(e) => debug!(user = user.0, error = %e, "nickname lookup failed"),
        }
        match username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(handle) => format!("@{handle}"),
            None => user.to_string(),
        }
    }

    pub async fn handle_callback(&self, q: CallbackQuery) {
        let mut answer: Option<&str> = None;
        match CallbackAction::parse(&q.data) {
            Ok(CallbackAction::Delete(_)) => self.delete(&q).await,
            // Malformed deletion tokens still get a "not deleted" reply.
            Err(_) if q.data.starts_with(DELETE_PREFIX) => self.delete(&q).await,
            Ok(CallbackAction::Select(target)) => self.connect(&q, target).await,
            Ok(CallbackAction::Exit) => self.exit(&q).await,
            Ok(CallbackAction::Unknown) => {
                debug!(data = %q.data, "ignoring unknown callback");
                answer = Some(notices::UNKNOWN_ACTION);
            }
            Err(e) => {
                warn!(user = q.user_id.0, data = %q.data, error = %e, "malformed callback");
                answer = Some(notices::UNKNOWN_ACTION);
            }
        }

        if let Err(e) = self
            .svc
            .messenger
            .answer_callback_query(&q.callback_id, answer)
            .await
        {
            debug!(error = %e, "failed to answer callback query");
        }
    }

    async fn connect(&self, q: &CallbackQuery, target: UserId) {
        let me = q.user_id;
        let here: Recipient = q.chat_id.into();

        if target == me {
            self.notify(here, notices::SELF_PAIR, None).await;
            return;
        }

        match self.svc.pairing.partner(me).await {
            Ok(Some(current)) => {
                let markup = Some(Markup::Inline(exit_keyboard()));
                self.notify(here, &notices::already_paired(current), markup).await;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                error!(user = me.0, error = %e, "failed to look up own pairing");
                self.notify(here, notices::TEMPORARILY_UNAVAILABLE, None).await;
                return;
            }
        }

        match self.svc.pairing.is_available(target).await {
            Ok(true) => {}
            Ok(false) => {
                self.notify(here, &notices::partner_busy(target), None).await;
                return;
            }
            Err(e) => {
                error!(target = target.0, error = %e, "failed to check availability");
                self.notify(here, notices::TEMPORARILY_UNAVAILABLE, None).await;
                return;
            }
        }

        if let Err(e) = self.svc.pairing.pair(me, target).await {
            error!(user = me.0, target = target.0, error = %e, "failed to pair users");
            self.notify(here, notices::TEMPORARILY_UNAVAILABLE, None).await;
            return;
        }
        info!(user = me.0, partner = target.0, "users paired");
        self.svc.audit.record(AuditEvent::paired(me, target));

        let markup = Some(Markup::Inline(exit_keyboard()));
        if let Err(e) = self
            .svc
            .messenger
            .send_text(&target.into(), &notices::connected(me), markup.clone())
            .await
        {
            if e.is_unreachable() {
                info!(target = target.0, "new partner unreachable, undoing pairing");
                self.end_unreachable(q.chat_id, me, target).await;
                return;
            }
            warn!(target = target.0, error = %e, "failed to notify new partner");
        }
        self.notify(here, &notices::connected(target), markup).await;
    }

    async fn exit(&self, q: &CallbackQuery) {
        let me = q.user_id;
        match self.svc.pairing.unpair(me).await {
            Ok(former) => {
                info!(user = me.0, partner = ?former.map(|p| p.0), "user left chat");
                self.svc.audit.record(AuditEvent::unpaired(me, former, "exit"));
                if let Some(partner) = former {
                    self.notify(partner.into(), notices::PARTNER_LEFT, None).await;
                }
                self.notify(q.chat_id.into(), notices::YOU_LEFT, None).await;
            }
            Err(e) => {
                error!(user = me.0, error = %e, "failed to end chat");
                self.notify(q.chat_id.into(), notices::TEMPORARILY_UNAVAILABLE, None).await;
            }
        }
    }

    async fn delete(&self, q: &CallbackQuery) {
        let outcome = self.deletion.request_deletion(&q.data).await;
        let complete = outcome.is_complete();
        self.svc.audit.record(AuditEvent::deletion(q.user_id, complete));
        let text = if complete {
            notices::DELETED
        } else {
            notices::DELETE_FAILED
        };
        self.notify(q.chat_id.into(), text, None).await;
    }

    async fn notify(&self, to: Recipient, text: &str, markup: Option<Markup>) {
        if let Err(e) = self.svc.messenger.send_text(&to, text, markup).await {
            warn!(to = %to, error = %e, "failed to send notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageRef;
    use crate::messaging::types::ButtonAction;
    use crate::testing::{audit_channel, FakeDirectory, Harness, MINI_APP_URL};

    const ALICE: UserId = UserId(10);
    const BOB: UserId = UserId(20);
    const CAROL: UserId = UserId(30);

    const TELEGRAM: MessagingCapabilities = MessagingCapabilities {
        supports_edit: true,
        supports_web_apps: true,
        max_message_len: 4096,
        max_caption_len: 1024,
    };

    fn router(h: &Harness) -> RelayRouter {
        RelayRouter::new(h.svc.clone())
    }

    async fn paired(h: &Harness) {
        h.svc.pairing.pair(ALICE, BOB).await.unwrap();
    }

    fn sent_ref(h: &Harness, to: UserId) -> MessageRef {
        let to: Recipient = to.into();
        h.fake
            .sends
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _, _)| *r == to)
            .map(|(_, _, m)| *m)
            .unwrap()
    }

    #[tokio::test]
    async fn unpaired_user_is_invited_to_connect() {
        let h = Harness::new(FakeDirectory::default());
        router(&h).handle_message(Harness::text(ALICE, "hello?")).await;

        let sent = h.fake.sent_to(ALICE);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].payload,
            MessagePayload::Text {
                text: notices::CONNECT_PROMPT.to_string()
            }
        );
        let Some(Markup::Inline(kb)) = &sent[0].markup else {
            panic!("expected inline keyboard");
        };
        assert_eq!(
            kb.rows[0][0].action,
            ButtonAction::WebApp(MINI_APP_URL.to_string())
        );
        assert_eq!(*h.dir.remembered.lock().unwrap(), vec![ALICE]);
    }

    #[tokio::test]
    async fn select_pairs_both_users_and_notifies_them() {
        let h = Harness::new(FakeDirectory::default());
        router(&h)
            .handle_callback(Harness::callback(ALICE, "select_20"))
            .await;

        assert_eq!(h.svc.pairing.partner(ALICE).await.unwrap(), Some(BOB));
        assert_eq!(h.svc.pairing.partner(BOB).await.unwrap(), Some(ALICE));
        assert_eq!(h.fake.texts_to(ALICE), vec![notices::connected(BOB)]);
        assert_eq!(h.fake.texts_to(BOB), vec![notices::connected(ALICE)]);
        assert_eq!(h.fake.answers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn select_busy_target_is_refused() {
        let h = Harness::new(FakeDirectory::default());
        h.svc.pairing.pair(BOB, CAROL).await.unwrap();

        router(&h)
            .handle_callback(Harness::callback(ALICE, "select_20"))
            .await;

        assert_eq!(h.fake.texts_to(ALICE), vec![notices::partner_busy(BOB)]);
        assert!(h.svc.pairing.is_available(ALICE).await.unwrap());
        assert_eq!(h.svc.pairing.partner(BOB).await.unwrap(), Some(CAROL));
    }

    #[tokio::test]
    async fn select_self_or_while_paired_is_refused() {
        let h = Harness::new(FakeDirectory::default());
        let r = router(&h);

        r.handle_callback(Harness::callback(ALICE, "select_10")).await;
        assert!(h.svc.pairing.is_available(ALICE).await.unwrap());
        assert_eq!(h.fake.texts_to(ALICE), vec![notices::SELF_PAIR]);

        paired(&h).await;
        r.handle_callback(Harness::callback(ALICE, "select_30")).await;
        assert_eq!(h.svc.pairing.partner(ALICE).await.unwrap(), Some(BOB));
        assert!(h.svc.pairing.is_available(CAROL).await.unwrap());
        assert_eq!(
            h.fake.texts_to(ALICE).last().map(String::as_str),
            Some(notices::already_paired(BOB).as_str())
        );
    }

    #[tokio::test]
    async fn text_is_relayed_echoed_and_audited() {
        let h = Harness::new(FakeDirectory::default().with_nickname(ALICE, "Fox"));
        paired(&h).await;

        router(&h).handle_message(Harness::text(ALICE, "hi")).await;

        assert_eq!(h.fake.texts_to(BOB), vec!["From Fox: hi"]);
        assert_eq!(h.fake.texts_to(ALICE), vec![notices::ECHO_TEXT]);
        assert_eq!(
            h.fake.texts_to(audit_channel()),
            vec!["Message from Fox to 20:\nhi"]
        );

        let partner_copy = sent_ref(&h, BOB);
        let echo = sent_ref(&h, ALICE);
        let edits = h.fake.markup_edits.lock().unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, echo);
        let kb = edits[0].1.as_ref().unwrap();
        let token = DeletionToken {
            sender: echo,
            partner: partner_copy,
        };
        assert_eq!(kb.callback_data(), vec![token.encode().as_str(), EXIT]);
    }

    #[tokio::test]
    async fn echo_keeps_exit_keyboard_when_edits_are_unsupported() {
        let h = Harness::new(FakeDirectory::default().with_nickname(ALICE, "Fox"));
        h.fake.set_capabilities(MessagingCapabilities {
            supports_edit: false,
            ..TELEGRAM
        });
        paired(&h).await;

        router(&h).handle_message(Harness::text(ALICE, "hi")).await;

        assert_eq!(h.fake.texts_to(BOB), vec!["From Fox: hi"]);
        let echo = h.fake.sent_to(ALICE);
        assert_eq!(echo.len(), 1);
        assert_eq!(echo[0].markup, Some(Markup::Inline(exit_keyboard())));
        assert!(h.fake.markup_edits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_prompt_omits_web_app_button_when_unsupported() {
        let h = Harness::new(FakeDirectory::default());
        h.fake.set_capabilities(MessagingCapabilities {
            supports_web_apps: false,
            ..TELEGRAM
        });

        router(&h).handle_message(Harness::text(ALICE, "hello?")).await;

        let sent = h.fake.sent_to(ALICE);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].markup, None);
    }

    #[tokio::test]
    async fn media_captions_name_the_sender() {
        let h = Harness::new(FakeDirectory::default());
        paired(&h).await;
        let mut msg = Harness::message(
            ALICE,
            Some(MessagePayload::Image {
                file_id: "photo-1".into(),
                caption: None,
            }),
        );
        msg.username = Some("fox".into());

        router(&h).handle_message(msg).await;

        let to_bob = h.fake.sent_to(BOB);
        assert_eq!(
            to_bob[0].payload,
            MessagePayload::Image {
                file_id: "photo-1".into(),
                caption: Some("From @fox: photo".into()),
            }
        );
        let audited = h.fake.sent_to(audit_channel());
        assert_eq!(audited.len(), 1);
        assert_eq!(
            audited[0].payload.caption(),
            Some("Message from @fox to 20:\nphoto")
        );
    }

    #[tokio::test]
    async fn stickers_get_a_separate_audit_note() {
        let h = Harness::new(FakeDirectory::default());
        paired(&h).await;
        let sticker = MessagePayload::Sticker {
            file_id: "st".into(),
        };

        router(&h)
            .handle_message(Harness::message(ALICE, Some(sticker.clone())))
            .await;

        assert_eq!(h.fake.sent_to(BOB)[0].payload, sticker);
        let audited = h.fake.sent_to(audit_channel());
        assert_eq!(audited.len(), 2);
        assert_eq!(audited[0].payload, sticker);
        assert_eq!(
            h.fake.texts_to(audit_channel()),
            vec!["Message from 10 to 20:\nsticker"]
        );
    }

    #[tokio::test]
    async fn unreachable_partner_ends_the_chat() {
        let h = Harness::new(FakeDirectory::default());
        paired(&h).await;
        h.fake.block(BOB);

        router(&h).handle_message(Harness::text(ALICE, "hi")).await;

        assert!(h.svc.pairing.is_available(ALICE).await.unwrap());
        assert!(h.svc.pairing.is_available(BOB).await.unwrap());
        assert_eq!(h.fake.texts_to(ALICE), vec![notices::PARTNER_UNREACHABLE]);
        assert!(h.fake.sent_to(audit_channel()).is_empty());
    }

    #[tokio::test]
    async fn transient_failure_keeps_the_pairing() {
        let h = Harness::new(FakeDirectory::default());
        paired(&h).await;
        h.fake.break_link(BOB);

        router(&h).handle_message(Harness::text(ALICE, "hi")).await;

        assert_eq!(h.svc.pairing.partner(ALICE).await.unwrap(), Some(BOB));
        assert_eq!(h.fake.texts_to(ALICE), vec![notices::DELIVERY_FAILED]);
    }

    #[tokio::test]
    async fn unsupported_payload_is_reported() {
        let h = Harness::new(FakeDirectory::default());
        paired(&h).await;

        router(&h)
            .handle_message(Harness::message(ALICE, None))
            .await;

        assert_eq!(h.fake.texts_to(ALICE), vec![notices::UNSUPPORTED]);
        assert!(h.fake.sent_to(BOB).is_empty());
    }

    #[tokio::test]
    async fn exit_frees_both_and_tells_the_partner() {
        let h = Harness::new(FakeDirectory::default());
        paired(&h).await;

        router(&h)
            .handle_callback(Harness::callback(ALICE, "exit"))
            .await;

        assert!(h.svc.pairing.is_available(ALICE).await.unwrap());
        assert!(h.svc.pairing.is_available(BOB).await.unwrap());
        assert_eq!(h.fake.texts_to(BOB), vec![notices::PARTNER_LEFT]);
        assert_eq!(h.fake.texts_to(ALICE), vec![notices::YOU_LEFT]);
    }

    #[tokio::test]
    async fn delete_button_removes_both_copies() {
        let h = Harness::new(FakeDirectory::default());
        paired(&h).await;
        let r = router(&h);
        r.handle_message(Harness::text(ALICE, "oops")).await;

        let token = DeletionToken {
            sender: sent_ref(&h, ALICE),
            partner: sent_ref(&h, BOB),
        };
        r.handle_callback(Harness::callback(ALICE, &token.encode()))
            .await;

        assert_eq!(
            *h.fake.deletes.lock().unwrap(),
            vec![token.sender, token.partner]
        );
        assert_eq!(
            h.fake.texts_to(ALICE).last().map(String::as_str),
            Some(notices::DELETED)
        );
    }

    #[tokio::test]
    async fn malformed_delete_reports_failure() {
        let h = Harness::new(FakeDirectory::default());

        router(&h)
            .handle_callback(Harness::callback(ALICE, "delete_1_2"))
            .await;

        assert!(h.fake.deletes.lock().unwrap().is_empty());
        assert_eq!(h.fake.texts_to(ALICE), vec![notices::DELETE_FAILED]);
        assert_eq!(h.fake.answers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_callbacks_are_still_answered() {
        let h = Harness::new(FakeDirectory::default());

        router(&h)
            .handle_callback(Harness::callback(ALICE, "something_else"))
            .await;

        let answers = h.fake.answers.lock().unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].1.as_deref(), Some(notices::UNKNOWN_ACTION));
        assert_eq!(h.fake.send_count(), 0);
    }

    #[test]
    fn long_captions_are_cut_to_fit() {
        let payload = MessagePayload::Document {
            file_id: "d".into(),
            caption: Some("x".repeat(2000)),
        };
        let framed = frame_for_partner(&payload, "From Fox", &TELEGRAM);
        let caption = framed.caption().unwrap();
        assert_eq!(caption.chars().count(), 1024);
        assert!(caption.starts_with("From Fox: x"));
        assert!(caption.ends_with("..."));
    }

    #[test]
    fn long_texts_are_cut_to_message_limit() {
        let caps = MessagingCapabilities {
            max_message_len: 64,
            ..TELEGRAM
        };
        let payload = MessagePayload::Text {
            text: "y".repeat(500),
        };
        let MessagePayload::Text { text } = frame_for_partner(&payload, "From Fox", &caps) else {
            panic!("expected text");
        };
        assert_eq!(text.chars().count(), 64);
        assert!(text.starts_with("From Fox: y"));
    }

    #[test]
    fn contacts_are_relayed_as_text() {
        let contact = MessagePayload::Contact {
            phone_number: "+7000".into(),
            first_name: "Ann".into(),
            last_name: None,
        };
        assert_eq!(
            frame_for_partner(&contact, "From Fox", &TELEGRAM),
            MessagePayload::Text {
                text: "From Fox: Contact\nPhone: +7000\nName: Ann".into()
            }
        );
    }
}
