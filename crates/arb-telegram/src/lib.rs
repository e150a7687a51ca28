//! Telegram adapter (teloxide).
//!
//! This crate implements the `arb-core` MessagingPort over Telegram Bot API
//! and feeds Telegram updates into the relay router.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton, KeyboardMarkup,
        KeyboardRemove, ReplyMarkup, WebAppInfo,
    },
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod convert;
pub mod handlers;
pub mod router;

use arb_core::{
    domain::{ChatId, MessageId, MessageRef, Recipient},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{
            ButtonAction, InlineKeyboard, Markup, MessagePayload, MessagingCapabilities,
            OutgoingMessage, ReplyKeyboard,
        },
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    protect_content: bool,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, protect_content: bool) -> Self {
        Self {
            bot,
            protect_content,
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_recipient(to: &Recipient) -> teloxide::types::Recipient {
        match to {
            Recipient::Chat(c) => teloxide::types::Recipient::Id(Self::tg_chat(*c)),
            Recipient::Channel(name) => teloxide::types::Recipient::ChannelUsername(name.clone()),
        }
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::Api(
                api @ (ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::UserDeactivated
                | ApiError::ChatNotFound
                | ApiError::CantInitiateConversation
                | ApiError::CantTalkWithBots),
            ) => Error::Unreachable(format!("telegram: {api}")),
            other => Error::External(format!("telegram error: {other}")),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

fn inline_markup(keyboard: &InlineKeyboard) -> Result<InlineKeyboardMarkup> {
    let mut rows = Vec::with_capacity(keyboard.rows.len());
    for row in &keyboard.rows {
        let mut buttons = Vec::with_capacity(row.len());
        for b in row {
            let button = match &b.action {
                ButtonAction::Callback(data) => {
                    InlineKeyboardButton::callback(b.label.clone(), data.clone())
                }
                ButtonAction::WebApp(raw) => {
                    let url = url::Url::parse(raw).map_err(|e| {
                        Error::InvalidInput(format!("bad web app url {raw:?}: {e}"))
                    })?;
                    InlineKeyboardButton::web_app(b.label.clone(), WebAppInfo { url })
                }
            };
            buttons.push(button);
        }
        rows.push(buttons);
    }
    Ok(InlineKeyboardMarkup::new(rows))
}

fn reply_keyboard(keyboard: &ReplyKeyboard) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(KeyboardButton::new).collect())
        .collect();
    KeyboardMarkup::new(rows)
        .resize_keyboard(true)
        .one_time_keyboard(keyboard.one_time)
}

fn reply_markup(markup: &Markup) -> Result<ReplyMarkup> {
    Ok(match markup {
        Markup::Inline(k) => ReplyMarkup::InlineKeyboard(inline_markup(k)?),
        Markup::Reply(k) => ReplyMarkup::Keyboard(reply_keyboard(k)),
        Markup::RemoveReply => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    })
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_edit: true,
            supports_web_apps: true,
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send(&self, to: &Recipient, msg: OutgoingMessage) -> Result<MessageRef> {
        let chat = Self::tg_recipient(to);
        let markup = msg.markup.as_ref().map(reply_markup).transpose()?;
        let protect = self.protect_content;

        let sent = match &msg.payload {
            MessagePayload::Text { text } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_message(chat.clone(), text.clone())
                        .protect_content(protect);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Image { file_id, caption } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_photo(chat.clone(), InputFile::file_id(file_id.clone()))
                        .protect_content(protect);
                    if let Some(c) = caption {
                        req = req.caption(c.clone());
                    }
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Video { file_id, caption } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_video(chat.clone(), InputFile::file_id(file_id.clone()))
                        .protect_content(protect);
                    if let Some(c) = caption {
                        req = req.caption(c.clone());
                    }
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Voice { file_id, caption } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_voice(chat.clone(), InputFile::file_id(file_id.clone()))
                        .protect_content(protect);
                    if let Some(c) = caption {
                        req = req.caption(c.clone());
                    }
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::ShortVideo { file_id } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_video_note(chat.clone(), InputFile::file_id(file_id.clone()))
                        .protect_content(protect);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Document { file_id, caption } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_document(chat.clone(), InputFile::file_id(file_id.clone()))
                        .protect_content(protect);
                    if let Some(c) = caption {
                        req = req.caption(c.clone());
                    }
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Audio { file_id, caption } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_audio(chat.clone(), InputFile::file_id(file_id.clone()))
                        .protect_content(protect);
                    if let Some(c) = caption {
                        req = req.caption(c.clone());
                    }
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Location {
                latitude,
                longitude,
            } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_location(chat.clone(), *latitude, *longitude)
                        .protect_content(protect);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Sticker { file_id } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_sticker(chat.clone(), InputFile::file_id(file_id.clone()))
                        .protect_content(protect);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Contact {
                phone_number,
                first_name,
                last_name,
            } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_contact(chat.clone(), phone_number.clone(), first_name.clone())
                        .protect_content(protect);
                    if let Some(last) = last_name {
                        req = req.last_name(last.clone());
                    }
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            MessagePayload::Poll { question, options } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_poll(chat.clone(), question.clone(), options.clone())
                        .protect_content(protect);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
        };

        Ok(MessageRef {
            chat_id: ChatId(sent.chat.id.0),
            message_id: MessageId(sent.id.0),
        })
    }

    async fn edit_markup(&self, msg: MessageRef, keyboard: Option<InlineKeyboard>) -> Result<()> {
        let markup = keyboard.as_ref().map(inline_markup).transpose()?;
        self.with_retry(|| {
            let mut req = self.bot.edit_message_reply_markup(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
            );
            if let Some(m) = &markup {
                req = req.reply_markup(m.clone());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn edit_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        let markup = keyboard.as_ref().map(inline_markup).transpose()?;
        self.with_retry(|| {
            let mut req = self.bot.edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            );
            if let Some(m) = &markup {
                req = req.reply_markup(m.clone());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}
