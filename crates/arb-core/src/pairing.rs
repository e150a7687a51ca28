//! Symmetric partner relation: `partner(a) == b` iff `partner(b) == a`.

use std::sync::Arc;

use tracing::warn;

use crate::{domain::UserId, errors::Error, kv::KvStore, Result};

fn partner_key(user: UserId) -> String {
    format!("chat:partner:{}", user.0)
}

fn parse_partner(raw: &str) -> Option<UserId> {
    raw.trim().parse::<i64>().ok().map(UserId)
}

pub struct PairingDirectory {
    kv: Arc<dyn KvStore>,
}

impl PairingDirectory {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// True iff `user` has no partner.
    pub async fn is_available(&self, user: UserId) -> Result<bool> {
        Ok(!self.kv.exists(&partner_key(user)).await?)
    }

    pub async fn partner(&self, user: UserId) -> Result<Option<UserId>> {
        let Some(raw) = self.kv.get(&partner_key(user)).await? else {
            return Ok(None);
        };
        parse_partner(&raw)
            .map(Some)
            .ok_or_else(|| Error::Store(format!("corrupt partner record for {user}: {raw:?}")))
    }

    /// Pairs `a` and `b` in both directions. Pairings do not expire.
    pub async fn pair(&self, a: UserId, b: UserId) -> Result<()> {
        if a == b {
            return Err(Error::InvalidInput(format!("user {a} cannot pair with itself")));
        }
        self.kv.set(&partner_key(a), &b.0.to_string(), None).await?;
        if let Err(e) = self
            .kv
            .set(&partner_key(b), &a.0.to_string(), None)
            .await
        {
            // Roll back the first half so no one-sided pairing survives.
            if let Err(undo) = self.kv.delete(&partner_key(a)).await {
                warn!(user = a.0, error = %undo, "failed to roll back half-written pairing");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Ends the pairing of `user` and returns the former partner.
    ///
    /// The partner's side is only cleared while it still points back at `user`.
    pub async fn unpair(&self, user: UserId) -> Result<Option<UserId>> {
        let raw = self.kv.get(&partner_key(user)).await?;
        let partner = raw.as_deref().and_then(parse_partner);
        if raw.is_some() && partner.is_none() {
            warn!(user = user.0, raw = ?raw, "dropping corrupt partner record");
        }

        // Both sides are read before anything is deleted.
        let back = match partner {
            Some(p) => self.kv.get(&partner_key(p)).await?,
            None => None,
        };

        self.kv.delete(&partner_key(user)).await?;

        let Some(p) = partner else {
            return Ok(None);
        };
        match back.as_deref().map(parse_partner) {
            Some(Some(q)) if q == user => self.kv.delete(&partner_key(p)).await?,
            Some(None) => {
                warn!(user = p.0, raw = ?back, "dropping corrupt partner record");
                self.kv.delete(&partner_key(p)).await?;
            }
            _ => {}
        }
        Ok(Some(p))
    }
}
