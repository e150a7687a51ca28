use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// A private chat shares its id with the user on the other end.
impl From<UserId> for ChatId {
    fn from(user: UserId) -> Self {
        ChatId(user.0)
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Where an outgoing message goes: a numeric chat or a public channel handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Recipient {
    Chat(ChatId),
    /// Channel username including the leading `@`.
    Channel(String),
}

impl Recipient {
    /// Parses `@name` as a channel and anything numeric as a chat id.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() > 1 && raw.starts_with('@') {
            return Some(Recipient::Channel(raw.to_string()));
        }
        raw.parse::<i64>().ok().map(|id| Recipient::Chat(ChatId(id)))
    }

    /// Key used for per-destination throttling (`None` for channels).
    pub fn chat_key(&self) -> Option<i64> {
        match self {
            Recipient::Chat(c) => Some(c.0),
            Recipient::Channel(_) => None,
        }
    }
}

impl From<ChatId> for Recipient {
    fn from(chat: ChatId) -> Self {
        Recipient::Chat(chat)
    }
}

impl From<UserId> for Recipient {
    fn from(user: UserId) -> Self {
        Recipient::Chat(user.into())
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Chat(c) => write!(f, "{}", c.0),
            Recipient::Channel(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_parses_channels_and_chats() {
        assert_eq!(
            Recipient::parse("@relay_audit"),
            Some(Recipient::Channel("@relay_audit".to_string()))
        );
        assert_eq!(
            Recipient::parse(" -1001234 "),
            Some(Recipient::Chat(ChatId(-1001234)))
        );
        assert_eq!(Recipient::parse("@"), None);
        assert_eq!(Recipient::parse("relay_audit"), None);
    }
}
