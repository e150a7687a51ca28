use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    broadcast::BroadcastConfig,
    domain::{Recipient, UserId},
    errors::Error,
    security::is_authorized,
    state::DEFAULT_STATE_TTL,
    Result,
};

/// Which key-value backend holds conversation state and pairings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// Typed configuration for the relay bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub operators: Vec<i64>,
    pub audit_channel: Recipient,
    pub mini_app_url: Option<String>,
    pub protect_content: bool,

    // Stores
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub database_url: String,
    pub state_ttl: Duration,

    // Broadcast
    pub broadcast_rate_per_sec: u32,
    pub broadcast_max_in_flight: usize,
    pub broadcast_menu_delay: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    /// Configuration with every optional knob at its default.
    pub fn new(
        telegram_bot_token: impl Into<String>,
        operators: Vec<i64>,
        audit_channel: Recipient,
    ) -> Self {
        Self {
            telegram_bot_token: telegram_bot_token.into(),
            operators,
            audit_channel,
            mini_app_url: None,
            protect_content: true,
            store_backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            database_url: "sqlite://./aika.db".to_string(),
            state_ttl: DEFAULT_STATE_TTL,
            broadcast_rate_per_sec: 30,
            broadcast_max_in_flight: 64,
            broadcast_menu_delay: Duration::from_secs(2),
            audit_log_path: PathBuf::from("/tmp/arb-audit.log"),
            audit_log_json: false,
        }
    }

    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let operators = parse_csv_i64(env_str("ARB_OPERATORS"));
        let audit_channel = env_str("AUDIT_CHANNEL").and_then(non_empty);

        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if operators.is_empty() {
            return Err(Error::Config(
                "ARB_OPERATORS environment variable is required".to_string(),
            ));
        }
        let Some(audit_channel) = audit_channel else {
            return Err(Error::Config(
                "AUDIT_CHANNEL environment variable is required".to_string(),
            ));
        };
        let audit_channel = Recipient::parse(&audit_channel).ok_or_else(|| {
            Error::Config(format!(
                "AUDIT_CHANNEL must be @channel or a numeric chat id, got {audit_channel:?}"
            ))
        })?;

        let mut cfg = Self::new(telegram_bot_token, operators, audit_channel);

        cfg.mini_app_url = env_str("MINI_APP_URL").and_then(non_empty);
        if let Some(v) = env_bool("PROTECT_CONTENT") {
            cfg.protect_content = v;
        }

        // Stores
        if let Some(raw) = env_str("ARB_STORE").and_then(non_empty) {
            cfg.store_backend = match raw.trim().to_lowercase().as_str() {
                "redis" => StoreBackend::Redis,
                "memory" => StoreBackend::Memory,
                other => {
                    return Err(Error::Config(format!(
                        "ARB_STORE must be redis or memory, got {other:?}"
                    )))
                }
            };
        }
        if let Some(url) = env_str("REDIS_URL").and_then(non_empty) {
            cfg.redis_url = url;
        }
        if let Some(url) = env_str("DATABASE_URL").and_then(non_empty) {
            cfg.database_url = url;
        }
        if let Some(secs) = env_u64("STATE_TTL_SECS") {
            cfg.state_ttl = Duration::from_secs(secs.max(1));
        }

        // Broadcast
        if let Some(rate) = env_u32("BROADCAST_RATE_PER_SEC") {
            cfg.broadcast_rate_per_sec = rate.max(1);
        }
        if let Some(n) = env_usize("BROADCAST_MAX_IN_FLIGHT") {
            cfg.broadcast_max_in_flight = n.max(1);
        }
        if let Some(ms) = env_u64("BROADCAST_MENU_DELAY_MS") {
            cfg.broadcast_menu_delay = Duration::from_millis(ms);
        }

        // Audit logging
        if let Some(path) = env_str("AUDIT_LOG_PATH").and_then(non_empty) {
            cfg.audit_log_path = PathBuf::from(path);
        }
        cfg.audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(cfg)
    }

    pub fn is_operator(&self, user: UserId) -> bool {
        is_authorized(Some(user), &self.operators)
    }

    /// First configured operator; receives intrusion alerts.
    pub fn primary_operator(&self) -> Option<UserId> {
        self.operators.first().copied().map(UserId)
    }

    pub fn broadcast(&self) -> BroadcastConfig {
        BroadcastConfig {
            rate_per_sec: self.broadcast_rate_per_sec,
            max_in_flight: self.broadcast_max_in_flight,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatId;

    #[test]
    fn defaults_follow_telegram_limits() {
        let cfg = Config::new("t", vec![7], Recipient::Chat(ChatId(-100)));
        assert_eq!(cfg.broadcast_rate_per_sec, 30);
        assert_eq!(cfg.state_ttl, Duration::from_secs(86_400));
        assert!(cfg.protect_content);
        assert_eq!(cfg.primary_operator(), Some(UserId(7)));
        assert!(cfg.is_operator(UserId(7)));
        assert!(!cfg.is_operator(UserId(8)));
    }

    #[test]
    fn csv_operators_skip_garbage() {
        assert_eq!(
            parse_csv_i64(Some(" 1, x ,,3".to_string())),
            vec![1, 3]
        );
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert!(parse_bool("YES"));
        assert!(parse_bool(" on "));
        assert!(!parse_bool("off"));
        assert!(!parse_bool(""));
    }
}
