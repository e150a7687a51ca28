//! Telegram update handlers.
//!
//! Each handler converts the teloxide update into the core model and hands
//! it to the relay router under the sender's lock.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::debug;

use arb_core::messaging::types::IncomingUpdate;

use crate::{convert, router::AppState};

pub async fn handle_callback(
    _bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let q = convert::incoming_callback(&q);
    let _guard = state.chat_locks.lock_chat(q.user_id.0).await;
    state.router.handle(IncomingUpdate::Callback(q)).await;
    Ok(())
}

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(incoming) = convert::incoming_message(&msg) else {
        debug!(chat_id = msg.chat.id.0, "ignoring message without sender");
        return Ok(());
    };

    // Only private chats take part in the relay.
    if !msg.chat.is_private() {
        debug!(chat_id = msg.chat.id.0, "ignoring non-private chat");
        return Ok(());
    }

    let _guard = state.chat_locks.lock_chat(incoming.user_id.0).await;
    state.router.handle(IncomingUpdate::Message(incoming)).await;
    Ok(())
}
