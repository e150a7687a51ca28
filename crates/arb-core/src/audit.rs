//! Local append-only audit trail.
//!
//! Complements the audit channel: every relay, pairing change, deletion and
//! broadcast leaves one record on disk.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::{broadcast::BroadcastReport, domain::UserId, errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 500;

fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, user: UserId) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: user.0,
            partner_id: None,
            message_type: None,
            content: None,
            outcome: None,
        }
    }

    pub fn relay(sender: UserId, partner: UserId, message_type: &str, content: &str) -> Self {
        Self {
            partner_id: Some(partner.0),
            message_type: Some(message_type.to_string()),
            content: Some(content.to_string()),
            ..Self::base("relay", sender)
        }
    }

    pub fn paired(user: UserId, partner: UserId) -> Self {
        Self {
            partner_id: Some(partner.0),
            ..Self::base("pair", user)
        }
    }

    pub fn unpaired(user: UserId, partner: Option<UserId>, reason: &str) -> Self {
        Self {
            partner_id: partner.map(|p| p.0),
            outcome: Some(reason.to_string()),
            ..Self::base("unpair", user)
        }
    }

    pub fn deletion(user: UserId, complete: bool) -> Self {
        Self {
            outcome: Some(if complete { "deleted" } else { "partial" }.to_string()),
            ..Self::base("delete", user)
        }
    }

    pub fn broadcast(operator: UserId, report: &BroadcastReport) -> Self {
        Self {
            message_type: Some(report.audience.as_str().to_string()),
            outcome: Some(format!(
                "total={} succeeded={} failed={} skipped={}",
                report.total, report.succeeded, report.failed, report.skipped
            )),
            ..Self::base("broadcast", operator)
        }
    }

    pub fn admin_denied(user: UserId) -> Self {
        Self {
            outcome: Some("denied".to_string()),
            ..Self::base("admin_access", user)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Like [`write`](Self::write) but only logs failures.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write audit log");
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}
