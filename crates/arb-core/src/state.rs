//! Per-user conversation state.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{directory::Audience, domain::UserId, kv::KvStore, Result};

pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Which dialog a user is in. Only `Idle`, `AdminPanel` and `Broadcast`
/// drive behavior; the rest are kept so stored records stay readable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    #[serde(rename = "start")]
    Idle,
    #[serde(rename = "count")]
    AwaitingCount,
    #[serde(rename = "paid")]
    AwaitingPayment,
    #[serde(rename = "contact")]
    AwaitingContact,
    #[serde(rename = "admin_panel")]
    AdminPanel,
    #[serde(rename = "broadcast")]
    Broadcast,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    #[serde(rename = "state")]
    pub mode: Mode,
    /// Chosen audience while composing a broadcast.
    #[serde(rename = "broadcast_type", default, with = "audience_field")]
    pub broadcast_audience: Option<Audience>,
    #[serde(rename = "count", default)]
    pub aux_count: i64,
    #[serde(rename = "contact", default)]
    pub aux_contact: String,
    #[serde(default)]
    pub is_paid: bool,
}

impl UserState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn admin_panel() -> Self {
        Self {
            mode: Mode::AdminPanel,
            ..Self::default()
        }
    }

    pub fn broadcast(audience: Audience) -> Self {
        Self {
            mode: Mode::Broadcast,
            broadcast_audience: Some(audience),
            ..Self::default()
        }
    }
}

/// Empty string on the wire means "no audience chosen".
mod audience_field {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use crate::directory::Audience;

    pub fn serialize<S: Serializer>(v: &Option<Audience>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(v.map(Audience::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Audience>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => Audience::parse(s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("unknown broadcast audience {s:?}"))),
        }
    }
}

fn state_key(user: UserId) -> String {
    format!("user_state:{}", user.0)
}

pub struct StateStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Current state of `user`.
    ///
    /// Never fails: a missing record is created as `Idle` (best effort) and an
    /// unreadable or unreachable one reads as `Idle`.
    pub async fn get_state(&self, user: UserId) -> UserState {
        let key = state_key(user);
        match self.kv.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<UserState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(user = user.0, error = %e, "discarding undecodable user state");
                    UserState::idle()
                }
            },
            Ok(None) => {
                let fresh = UserState::idle();
                if let Err(e) = self.save_state(user, &fresh).await {
                    debug!(user = user.0, error = %e, "failed to persist fresh user state");
                }
                fresh
            }
            Err(e) => {
                warn!(user = user.0, error = %e, "state store unavailable, assuming idle");
                UserState::idle()
            }
        }
    }

    /// Persists `state`, refreshing its TTL.
    pub async fn save_state(&self, user: UserId, state: &UserState) -> Result<()> {
        let raw = serde_json::to_string(state)?;
        self.kv.set(&state_key(user), &raw, Some(self.ttl)).await
    }

    /// Drops the record; the next read yields a fresh `Idle` state.
    pub async fn delete_state(&self, user: UserId) -> Result<()> {
        self.kv.delete(&state_key(user)).await
    }
}
