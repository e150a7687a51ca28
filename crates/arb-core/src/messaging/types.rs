use crate::domain::{ChatId, MessageRef, UserId};

/// Cross-messenger incoming update model.
///
/// Telegram-specific fields live in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Message(IncomingMessage),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    /// `None` when the platform delivered something we cannot relay.
    pub payload: Option<MessagePayload>,
}

impl IncomingMessage {
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Some(MessagePayload::Text { text }) => Some(text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub callback_id: String,
    pub data: String,
    pub message: Option<MessageRef>,
}

/// A relayable message body.
///
/// Media is carried by platform file id, so forwarding never re-uploads bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum MessagePayload {
    Text {
        text: String,
    },
    Image {
        file_id: String,
        caption: Option<String>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
    Voice {
        file_id: String,
        caption: Option<String>,
    },
    /// Round "video note".
    ShortVideo {
        file_id: String,
    },
    Document {
        file_id: String,
        caption: Option<String>,
    },
    Audio {
        file_id: String,
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Sticker {
        file_id: String,
    },
    Contact {
        phone_number: String,
        first_name: String,
        last_name: Option<String>,
    },
    Poll {
        question: String,
        options: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Text,
    Image,
    Video,
    Voice,
    ShortVideo,
    Document,
    Audio,
    Location,
    Sticker,
    Contact,
    Poll,
}

impl PayloadKind {
    /// Human label used in captions and button texts.
    pub fn label(self) -> &'static str {
        match self {
            PayloadKind::Text => "message",
            PayloadKind::Image => "photo",
            PayloadKind::Video => "video",
            PayloadKind::Voice => "voice message",
            PayloadKind::ShortVideo => "video message",
            PayloadKind::Document => "document",
            PayloadKind::Audio => "audio",
            PayloadKind::Location => "location",
            PayloadKind::Sticker => "sticker",
            PayloadKind::Contact => "contact",
            PayloadKind::Poll => "poll",
        }
    }
}

impl MessagePayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            MessagePayload::Text { .. } => PayloadKind::Text,
            MessagePayload::Image { .. } => PayloadKind::Image,
            MessagePayload::Video { .. } => PayloadKind::Video,
            MessagePayload::Voice { .. } => PayloadKind::Voice,
            MessagePayload::ShortVideo { .. } => PayloadKind::ShortVideo,
            MessagePayload::Document { .. } => PayloadKind::Document,
            MessagePayload::Audio { .. } => PayloadKind::Audio,
            MessagePayload::Location { .. } => PayloadKind::Location,
            MessagePayload::Sticker { .. } => PayloadKind::Sticker,
            MessagePayload::Contact { .. } => PayloadKind::Contact,
            MessagePayload::Poll { .. } => PayloadKind::Poll,
        }
    }

    /// The user-provided caption of a media payload.
    pub fn caption(&self) -> Option<&str> {
        match self {
            MessagePayload::Image { caption, .. }
            | MessagePayload::Video { caption, .. }
            | MessagePayload::Voice { caption, .. }
            | MessagePayload::Document { caption, .. }
            | MessagePayload::Audio { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }

    /// Returns a copy with the caption replaced, or `None` if the kind has no caption.
    pub fn with_caption(&self, new: String) -> Option<Self> {
        let mut out = self.clone();
        match &mut out {
            MessagePayload::Image { caption, .. }
            | MessagePayload::Video { caption, .. }
            | MessagePayload::Voice { caption, .. }
            | MessagePayload::Document { caption, .. }
            | MessagePayload::Audio { caption, .. } => {
                *caption = Some(new);
                Some(out)
            }
            _ => None,
        }
    }

    /// Plain-text rendering, used where the kind itself cannot carry a header.
    pub fn describe(&self) -> String {
        match self {
            MessagePayload::Text { text } => text.clone(),
            MessagePayload::Location {
                latitude,
                longitude,
            } => format!("Location: {latitude:.6}, {longitude:.6}"),
            MessagePayload::Contact {
                phone_number,
                first_name,
                last_name,
            } => {
                let name = match last_name.as_deref().filter(|s| !s.is_empty()) {
                    Some(last) => format!("{first_name} {last}"),
                    None => first_name.clone(),
                };
                format!("Contact\nPhone: {phone_number}\nName: {name}")
            }
            MessagePayload::Poll { question, options } => {
                let mut out = format!("Poll: {question}");
                for opt in options {
                    out.push_str("\n- ");
                    out.push_str(opt);
                }
                out
            }
            other => other
                .caption()
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| other.kind().label().to_string()),
        }
    }
}

/// What the gateway is asked to deliver.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMessage {
    pub payload: MessagePayload,
    pub markup: Option<Markup>,
}

impl OutgoingMessage {
    pub fn new(payload: MessagePayload) -> Self {
        Self {
            payload,
            markup: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MessagePayload::Text { text: text.into() })
    }

    pub fn with_markup(mut self, markup: impl Into<Option<Markup>>) -> Self {
        self.markup = markup.into();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Markup {
    Inline(InlineKeyboard),
    Reply(ReplyKeyboard),
    /// Hide a previously shown reply keyboard.
    RemoveReply,
}

impl From<InlineKeyboard> for Markup {
    fn from(k: InlineKeyboard) -> Self {
        Markup::Inline(k)
    }
}

impl From<ReplyKeyboard> for Markup {
    fn from(k: ReplyKeyboard) -> Self {
        Markup::Reply(k)
    }
}

/// Inline keyboard attached under a message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub action: ButtonAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    /// Opens a web app (mini app) at the given URL.
    WebApp(String),
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn web_app(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::WebApp(url.into()),
        }
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// Convenience for "one button per row" layouts.
    pub fn one_per_row(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn single(button: InlineButton) -> Self {
        Self::one_per_row([button])
    }

    /// Callback data of every button, in layout order.
    pub fn callback_data(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match &b.action {
                ButtonAction::Callback(data) => Some(data.as_str()),
                ButtonAction::WebApp(_) => None,
            })
            .collect()
    }
}

/// Persistent keyboard replacing the user's text input (operator menus).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
    pub one_time: bool,
}

impl ReplyKeyboard {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            one_time: false,
        }
    }

    pub fn one_time(mut self) -> Self {
        self.one_time = true;
        self
    }
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    /// Sent messages can have their text or keyboard replaced.
    pub supports_edit: bool,
    /// Inline buttons may open a web app.
    pub supports_web_apps: bool,
    pub max_message_len: usize,
    pub max_caption_len: usize,
}
