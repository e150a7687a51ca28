use async_trait::async_trait;

use crate::{
    domain::{MessageRef, Recipient},
    messaging::types::{InlineKeyboard, Markup, MessagingCapabilities, OutgoingMessage},
    Result,
};

/// Cross-messenger port (the messaging gateway).
///
/// Implementations report a recipient that blocked the bot (or cannot be
/// messaged at all) as `Error::Unreachable`; everything else is transient.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send(&self, to: &Recipient, msg: OutgoingMessage) -> Result<MessageRef>;

    /// Replaces the inline keyboard of a sent message (`None` removes it).
    async fn edit_markup(&self, msg: MessageRef, keyboard: Option<InlineKeyboard>) -> Result<()>;

    async fn edit_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    async fn send_text(
        &self,
        to: &Recipient,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<MessageRef> {
        self.send(to, OutgoingMessage::text(text).with_markup(markup))
            .await
    }
}
