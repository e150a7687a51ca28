//! User-facing texts and button labels.

use crate::{directory::Audience, domain::UserId, messaging::types::PayloadKind};

// ============== Relay ==============

pub const CONNECT_PROMPT: &str =
    "You are not in a chat yet. Open the app below to pick someone to talk to.";
pub const CONNECT_BUTTON: &str = "🔎 Find someone";
pub const EXIT_BUTTON: &str = "🔕 End chat";

pub const ECHO_TEXT: &str = "✅ Delivered. You can delete it for both of you below.";
pub const UNSUPPORTED: &str = "⚠️ This message type is not supported.";
pub const DELIVERY_FAILED: &str = "⚠️ Could not deliver your message. Please try again.";
pub const PARTNER_UNREACHABLE: &str =
    "⚠️ Your partner can no longer receive messages. The chat has ended.";
pub const TEMPORARILY_UNAVAILABLE: &str =
    "⚠️ Something went wrong on our side. Please try again in a moment.";

pub const SELF_PAIR: &str = "🙃 You cannot start a chat with yourself.";
pub const PARTNER_LEFT: &str = "👋 Your partner left the chat.";
pub const YOU_LEFT: &str = "👋 You left the chat.";
pub const DELETED: &str = "🗑 Message deleted for both of you.";
pub const DELETE_FAILED: &str = "⚠️ The message could not be deleted for both of you.";
pub const UNKNOWN_ACTION: &str = "This button is no longer valid.";

pub fn delete_button(kind: PayloadKind) -> String {
    format!("🗑 Delete {}", kind.label())
}

pub fn connected(other: UserId) -> String {
    format!("✅ You are now connected with {other}. Say hi!")
}

pub fn partner_busy(target: UserId) -> String {
    format!("⏳ User {target} is already in a chat. Please wait.")
}

pub fn already_paired(current: UserId) -> String {
    format!("💬 You are already talking to {current}. End that chat first.")
}

/// Header the partner sees on every relayed message.
pub fn relay_header(nick: &str) -> String {
    format!("From {nick}")
}

pub fn audit_header(nick: &str, partner: UserId) -> String {
    format!("Message from {nick} to {partner}:")
}

// ============== Operator panel ==============

pub const ADMIN_COMMAND: &str = "/admin";
pub const MENU_BROADCAST: &str = "📢 Broadcast";
pub const MENU_CLOSE: &str = "❌ Close";
pub const MENU_BACK: &str = "🔙 Back";

pub const ADMIN_WELCOME: &str = "🛠 Admin panel. Choose an action:";
pub const ADMIN_CLOSED: &str = "Admin panel closed.";
pub const NOT_AUTHORIZED: &str = "⛔ You do not have access to this command.";
pub const NO_RECIPIENTS: &str = "📭 There is nobody to send to.";

pub fn audience_button(audience: Audience) -> &'static str {
    match audience {
        Audience::All => "📣 All users",
        Audience::Profiles => "🙋 Profiles",
    }
}

pub fn audience_from_button(label: &str) -> Option<Audience> {
    Audience::ALL
        .into_iter()
        .find(|a| audience_button(*a) == label)
}

pub fn audience_menu(counts: &[(Audience, Option<usize>)]) -> String {
    let mut out = String::from("📢 Who should receive the broadcast?\n");
    for (audience, count) in counts {
        let count = count.map_or_else(|| "?".to_string(), |n| n.to_string());
        out.push_str(&format!("\n{}: {count}", audience.display_name()));
    }
    out
}

pub fn compose_prompt(audience: Audience) -> String {
    format!(
        "✍️ Send the message for {}. Text, photo, video and other kinds are all fine.",
        audience.display_name()
    )
}

pub fn recipients_failed(reason: &str) -> String {
    format!("❌ Could not load recipients: {reason}")
}

pub fn broadcast_started(total: usize) -> String {
    format!("📤 Sending...\n👥 Total: {total}")
}

pub fn intrusion_alert(user: UserId, username: Option<&str>) -> String {
    match username {
        Some(name) => format!("🚨 Admin panel access attempt by {user} (@{name})"),
        None => format!("🚨 Admin panel access attempt by {user}"),
    }
}
