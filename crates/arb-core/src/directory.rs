use async_trait::async_trait;

use crate::{domain::UserId, Result};

/// Broadcast target set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Everyone who ever wrote to the bot.
    All,
    /// Users that completed a profile.
    Profiles,
}

impl Audience {
    pub const ALL: [Audience; 2] = [Audience::All, Audience::Profiles];

    /// Stable wire name, stored inside conversation state.
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::Profiles => "profiles",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "all" => Some(Audience::All),
            "profiles" => Some(Audience::Profiles),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Audience::All => "All users",
            Audience::Profiles => "Profiles",
        }
    }
}

/// Durable user records kept outside the relay (profiles, first-contact log).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolves a broadcast audience to user ids, oldest registration first.
    async fn audience(&self, audience: Audience) -> Result<Vec<UserId>>;

    /// Profile nickname, if the user has one.
    async fn nickname(&self, user: UserId) -> Result<Option<String>>;

    /// Records that `user` has talked to the bot. Repeated calls are no-ops.
    async fn remember(&self, user: UserId, username: Option<&str>) -> Result<()>;
}
