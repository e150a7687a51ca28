//! Operator panel: a reply-keyboard menu leading to the broadcast composer.
//!
//! Flow: `/admin` -> panel -> audience -> composer -> broadcast -> panel.

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    audit::AuditEvent,
    broadcast::BroadcastOutcome,
    directory::Audience,
    domain::{Recipient, UserId},
    messaging::types::{IncomingMessage, Markup, ReplyKeyboard},
    notices,
    services::Services,
    state::{Mode, UserState},
};

pub struct AdminPanel {
    svc: Services,
}

fn main_menu() -> Markup {
    Markup::Reply(ReplyKeyboard::new(vec![
        vec![notices::MENU_BROADCAST.to_string()],
        vec![notices::MENU_CLOSE.to_string()],
    ]))
}

fn audience_menu() -> Markup {
    let mut rows: Vec<Vec<String>> = Audience::ALL
        .iter()
        .map(|a| vec![notices::audience_button(*a).to_string()])
        .collect();
    rows.push(vec![notices::MENU_BACK.to_string()]);
    Markup::Reply(ReplyKeyboard::new(rows))
}

fn composer_menu() -> Markup {
    Markup::Reply(ReplyKeyboard::new(vec![vec![notices::MENU_BACK.to_string()]]))
}

impl AdminPanel {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }

    pub fn is_command(text: Option<&str>) -> bool {
        text.map(str::trim) == Some(notices::ADMIN_COMMAND)
    }

    /// Entry point for `/admin` and for any message while in an operator mode.
    pub async fn handle(&self, msg: &IncomingMessage, state: &UserState) {
        let user = msg.user_id;
        if !self.svc.cfg.is_operator(user) {
            self.deny(msg, state).await;
            return;
        }

        if Self::is_command(msg.text()) {
            self.open(user).await;
            return;
        }

        match state.mode {
            Mode::AdminPanel => self.on_panel(msg).await,
            Mode::Broadcast => self.on_composer(msg, state.broadcast_audience).await,
            _ => self.open(user).await,
        }
    }

    /// Saves `AdminPanel` and shows the main menu.
    pub async fn open(&self, user: UserId) {
        if let Err(e) = self
            .svc
            .states
            .save_state(user, &UserState::admin_panel())
            .await
        {
            warn!(user = user.0, error = %e, "failed to enter admin panel state");
        }
        self.reply(user, notices::ADMIN_WELCOME, main_menu()).await;
    }

    async fn on_panel(&self, msg: &IncomingMessage) {
        let user = msg.user_id;
        let text = msg.text().map(str::trim).unwrap_or_default();

        if text == notices::MENU_BROADCAST {
            let mut counts = Vec::with_capacity(Audience::ALL.len());
            for audience in Audience::ALL {
                let count = match self.svc.directory.audience(audience).await {
                    Ok(ids) => Some(ids.len()),
                    Err(e) => {
                        warn!(audience = audience.as_str(), error = %e, "failed to count audience");
                        None
                    }
                };
                counts.push((audience, count));
            }
            self.reply(user, &notices::audience_menu(&counts), audience_menu()).await;
            return;
        }

        if let Some(audience) = notices::audience_from_button(text) {
            if let Err(e) = self
                .svc
                .states
                .save_state(user, &UserState::broadcast(audience))
                .await
            {
                warn!(user = user.0, error = %e, "failed to enter broadcast composer");
                self.reply(user, notices::TEMPORARILY_UNAVAILABLE, main_menu()).await;
                return;
            }
            self.reply(user, &notices::compose_prompt(audience), composer_menu()).await;
            return;
        }

        if text == notices::MENU_BACK {
            self.open(user).await;
            return;
        }

        if text == notices::MENU_CLOSE {
            self.close(user).await;
            return;
        }

        // Anything else: show the menu again.
        self.reply(user, notices::ADMIN_WELCOME, main_menu()).await;
    }

    async fn close(&self, user: UserId) {
        if let Err(e) = self.svc.states.delete_state(user).await {
            warn!(user = user.0, error = %e, "failed to clear admin state");
        }
        self.reply(user, notices::ADMIN_CLOSED, Markup::RemoveReply).await;
    }

    async fn on_composer(&self, msg: &IncomingMessage, audience: Option<Audience>) {
        let user = msg.user_id;

        if msg.text().map(str::trim) == Some(notices::MENU_BACK) {
            if let Err(e) = self.svc.states.delete_state(user).await {
                warn!(user = user.0, error = %e, "failed to clear composer state");
            }
            self.open(user).await;
            return;
        }

        let text = msg.text().map(str::trim).unwrap_or_default();
        if let Some(switched) = notices::audience_from_button(text) {
            if let Err(e) = self
                .svc
                .states
                .save_state(user, &UserState::broadcast(switched))
                .await
            {
                warn!(user = user.0, error = %e, "failed to switch broadcast audience");
            }
            self.reply(user, &notices::compose_prompt(switched), composer_menu()).await;
            return;
        }

        let Some(audience) = audience else {
            warn!(user = user.0, "broadcast state without audience, reopening panel");
            self.open(user).await;
            return;
        };
        let Some(payload) = msg.payload.clone() else {
            self.reply(user, notices::UNSUPPORTED, composer_menu()).await;
            return;
        };

        // Leave the composer before sending so a second message cannot
        // start a second broadcast.
        if let Err(e) = self
            .svc
            .states
            .save_state(user, &UserState::admin_panel())
            .await
        {
            warn!(user = user.0, error = %e, "failed to leave broadcast composer");
        }

        info!(
            operator = user.0,
            audience = audience.as_str(),
            kind = payload.kind().label(),
            "operator started broadcast"
        );
        match self
            .svc
            .broadcaster
            .run(msg.chat_id, audience, payload)
            .await
        {
            Ok(BroadcastOutcome::Completed(report)) => {
                self.svc.audit.record(AuditEvent::broadcast(user, &report));
            }
            Ok(BroadcastOutcome::NoRecipients) => {}
            Err(e) => warn!(operator = user.0, error = %e, "broadcast aborted"),
        }

        sleep(self.svc.cfg.broadcast_menu_delay).await;
        self.open(user).await;
    }

    async fn deny(&self, msg: &IncomingMessage, state: &UserState) {
        let user = msg.user_id;
        warn!(
            user = user.0,
            username = msg.username.as_deref().unwrap_or(""),
            "non-operator tried to use the admin panel"
        );
        self.svc.audit.record(AuditEvent::admin_denied(user));

        if matches!(state.mode, Mode::AdminPanel | Mode::Broadcast) {
            if let Err(e) = self.svc.states.delete_state(user).await {
                warn!(user = user.0, error = %e, "failed to clear stray admin state");
            }
        }

        if let Err(e) = self
            .svc
            .messenger
            .send_text(&Recipient::Chat(msg.chat_id), notices::NOT_AUTHORIZED, None)
            .await
        {
            warn!(user = user.0, error = %e, "failed to send access denied notice");
        }

        if let Some(operator) = self.svc.cfg.primary_operator() {
            let alert = notices::intrusion_alert(user, msg.username.as_deref());
            if let Err(e) = self
                .svc
                .messenger
                .send_text(&operator.into(), &alert, None)
                .await
            {
                warn!(error = %e, "failed to alert operator");
            }
        }
    }

    async fn reply(&self, user: UserId, text: &str, markup: Markup) {
        if let Err(e) = self
            .svc
            .messenger
            .send_text(&user.into(), text, Some(markup))
            .await
        {
            warn!(user = user.0, error = %e, "failed to send admin panel message");
        }
    }
}
