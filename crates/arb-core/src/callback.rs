//! Inline-button callback payloads.
//!
//! Wire formats:
//! - `select_{userId}`: connect to a user
//! - `exit`: leave the current conversation
//! - `delete_{senderChat}_{senderMsg}_{partnerChat}_{partnerMsg}`: delete a relayed pair

use std::fmt;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    Result,
};

pub const SELECT_PREFIX: &str = "select_";
pub const EXIT: &str = "exit";
pub const DELETE_PREFIX: &str = "delete_";

/// Both copies of one relayed message: the sender's echo and the partner's copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeletionToken {
    pub sender: MessageRef,
    pub partner: MessageRef,
}

impl DeletionToken {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses a full `delete_...` payload.
    pub fn parse(data: &str) -> Result<Self> {
        let body = data
            .strip_prefix(DELETE_PREFIX)
            .ok_or_else(|| Error::MalformedToken(format!("missing {DELETE_PREFIX} prefix")))?;

        let parts: Vec<&str> = body.split('_').collect();
        let [sc, sm, pc, pm] = parts.as_slice() else {
            return Err(Error::MalformedToken(format!(
                "expected 4 fields, got {}",
                parts.len()
            )));
        };

        Ok(Self {
            sender: MessageRef {
                chat_id: ChatId(parse_field(sc, "sender chat")?),
                message_id: MessageId(parse_field(sm, "sender message")?),
            },
            partner: MessageRef {
                chat_id: ChatId(parse_field(pc, "partner chat")?),
                message_id: MessageId(parse_field(pm, "partner message")?),
            },
        })
    }
}

impl fmt::Display for DeletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{DELETE_PREFIX}{}_{}_{}_{}",
            self.sender.chat_id.0,
            self.sender.message_id.0,
            self.partner.chat_id.0,
            self.partner.message_id.0
        )
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| Error::MalformedToken(format!("{what} is not a number: {raw:?}")))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Select(UserId),
    Exit,
    Delete(DeletionToken),
    /// Not ours (stale keyboards, other bots' buttons).
    Unknown,
}

impl CallbackAction {
    /// Classifies callback data. Known prefixes with broken bodies are errors.
    pub fn parse(data: &str) -> Result<Self> {
        if let Some(id) = data.strip_prefix(SELECT_PREFIX) {
            let id = parse_field::<i64>(id, "select target")?;
            return Ok(CallbackAction::Select(UserId(id)));
        }
        if data == EXIT {
            return Ok(CallbackAction::Exit);
        }
        if data.starts_with(DELETE_PREFIX) {
            return DeletionToken::parse(data).map(CallbackAction::Delete);
        }
        Ok(CallbackAction::Unknown)
    }

    /// Payload of a "connect to `user`" button.
    pub fn select(user: UserId) -> String {
        format!("{SELECT_PREFIX}{}", user.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> DeletionToken {
        DeletionToken {
            sender: MessageRef {
                chat_id: ChatId(11),
                message_id: MessageId(101),
            },
            partner: MessageRef {
                chat_id: ChatId(-22),
                message_id: MessageId(202),
            },
        }
    }

    #[test]
    fn deletion_token_encodes_four_fields() {
        assert_eq!(token().encode(), "delete_11_101_-22_202");
        assert_eq!(DeletionToken::parse("delete_11_101_-22_202").unwrap(), token());
    }

    #[test]
    fn deletion_token_rejects_malformed_payloads() {
        for bad in [
            "delete_1_2_3",
            "delete_1_2_3_4_5",
            "delete_a_2_3_4",
            "delete_1_2_3_99999999999",
            "remove_1_2_3_4",
            "delete_",
        ] {
            assert!(
                matches!(DeletionToken::parse(bad), Err(Error::MalformedToken(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn actions_are_classified() {
        assert_eq!(
            CallbackAction::parse("select_42").unwrap(),
            CallbackAction::Select(UserId(42))
        );
        assert_eq!(CallbackAction::parse("exit").unwrap(), CallbackAction::Exit);
        assert_eq!(
            CallbackAction::parse(&token().encode()).unwrap(),
            CallbackAction::Delete(token())
        );
        assert_eq!(
            CallbackAction::parse("noop").unwrap(),
            CallbackAction::Unknown
        );
        assert!(CallbackAction::parse("select_x").is_err());
        assert_eq!(CallbackAction::select(UserId(7)), "select_7");
    }
}
