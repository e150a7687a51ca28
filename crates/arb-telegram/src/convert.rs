//! Telegram update -> core update model.

use teloxide::types::{CallbackQuery as TgCallbackQuery, Message, User};

use arb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{CallbackQuery, IncomingMessage, MessagePayload},
};

fn user_id(user: &User) -> UserId {
    UserId(user.id.0 as i64)
}

/// `None` for messages without a sender (channel posts, service messages).
pub fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    let from = msg.from()?;
    Some(IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        user_id: user_id(from),
        username: from.username.clone(),
        payload: payload(msg),
    })
}

pub fn incoming_callback(q: &TgCallbackQuery) -> CallbackQuery {
    let user = user_id(&q.from);
    let message = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });
    CallbackQuery {
        chat_id: message.map(|m| m.chat_id).unwrap_or_else(|| user.into()),
        user_id: user,
        username: q.from.username.clone(),
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message,
    }
}

/// Maps the relayable message kinds; anything else is `None`.
pub fn payload(msg: &Message) -> Option<MessagePayload> {
    let caption = msg.caption().map(str::to_string);

    if let Some(text) = msg.text() {
        return Some(MessagePayload::Text {
            text: text.to_string(),
        });
    }
    if let Some(sizes) = msg.photo() {
        // Largest size comes last.
        let best = sizes.last()?;
        return Some(MessagePayload::Image {
            file_id: best.file.id.clone(),
            caption,
        });
    }
    if let Some(v) = msg.video() {
        return Some(MessagePayload::Video {
            file_id: v.file.id.clone(),
            caption,
        });
    }
    if let Some(v) = msg.voice() {
        return Some(MessagePayload::Voice {
            file_id: v.file.id.clone(),
            caption,
        });
    }
    if let Some(v) = msg.video_note() {
        return Some(MessagePayload::ShortVideo {
            file_id: v.file.id.clone(),
        });
    }
    if let Some(d) = msg.document() {
        return Some(MessagePayload::Document {
            file_id: d.file.id.clone(),
            caption,
        });
    }
    if let Some(a) = msg.audio() {
        return Some(MessagePayload::Audio {
            file_id: a.file.id.clone(),
            caption,
        });
    }
    if let Some(loc) = msg.location() {
        return Some(MessagePayload::Location {
            latitude: loc.latitude,
            longitude: loc.longitude,
        });
    }
    if let Some(s) = msg.sticker() {
        return Some(MessagePayload::Sticker {
            file_id: s.file.id.clone(),
        });
    }
    if let Some(c) = msg.contact() {
        return Some(MessagePayload::Contact {
            phone_number: c.phone_number.clone(),
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
        });
    }
    if let Some(p) = msg.poll() {
        return Some(MessagePayload::Poll {
            question: p.question.clone(),
            options: p.options.iter().map(|o| o.text.clone()).collect(),
        });
    }
    None
}
