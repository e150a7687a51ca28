//! Rate-limited fan-out of one operator message to an audience.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::{DateTime, Local};
use tokio::{sync::Semaphore, task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    directory::{Audience, UserDirectory},
    domain::{ChatId, MessageRef, Recipient, UserId},
    limiter::IntervalLimiter,
    messaging::{
        port::MessagingPort,
        types::{MessagePayload, OutgoingMessage},
    },
    notices, Result,
};

#[derive(Clone, Copy, Debug)]
pub struct BroadcastConfig {
    /// Sends started per second (Telegram allows ~30 for bots).
    pub rate_per_sec: u32,
    /// Upper bound on sends awaiting a response.
    pub max_in_flight: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 30,
            max_in_flight: 64,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BroadcastReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Never dispatched because shutdown interrupted the run.
    pub skipped: usize,
    pub audience: Audience,
    pub finished_at: DateTime<Local>,
}

impl BroadcastReport {
    /// Delivered share in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }

    pub fn render(&self) -> String {
        let mut out = String::from("✅ Broadcast finished\n\n");
        out.push_str(&format!("👥 Total: {}\n", self.total));
        out.push_str(&format!("✔️ Delivered: {}\n", self.succeeded));
        out.push_str(&format!("❌ Failed: {}\n", self.failed));
        if self.skipped > 0 {
            out.push_str(&format!("⏭ Not sent (shutdown): {}\n", self.skipped));
        }
        out.push_str(&format!("📊 Success rate: {:.1}%\n", self.success_rate()));
        out.push_str(&format!("🎯 Audience: {}\n", self.audience.display_name()));
        out.push_str(&format!(
            "🕐 Finished: {}",
            self.finished_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BroadcastOutcome {
    NoRecipients,
    Completed(BroadcastReport),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Tally {
    succeeded: usize,
    failed: usize,
    skipped: usize,
}

pub struct BroadcastScheduler {
    messenger: Arc<dyn MessagingPort>,
    directory: Arc<dyn UserDirectory>,
    cfg: BroadcastConfig,
    shutdown: CancellationToken,
}

impl BroadcastScheduler {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        directory: Arc<dyn UserDirectory>,
        cfg: BroadcastConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            messenger,
            directory,
            cfg,
            shutdown,
        }
    }

    /// Sends `payload` to every member of `audience`, keeping `operator` informed.
    ///
    /// Per-recipient failures are counted, not raised. Only a failure to
    /// resolve the audience is returned as an error (after notifying the operator).
    pub async fn run(
        &self,
        operator: ChatId,
        audience: Audience,
        payload: MessagePayload,
    ) -> Result<BroadcastOutcome> {
        let operator = Recipient::Chat(operator);

        let recipients = match self.directory.audience(audience).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    audience = audience.as_str(),
                    error = %e,
                    "failed to resolve broadcast audience"
                );
                self.notify(&operator, &notices::recipients_failed(&e.to_string())).await;
                return Err(e);
            }
        };

        if recipients.is_empty() {
            self.notify(&operator, notices::NO_RECIPIENTS).await;
            return Ok(BroadcastOutcome::NoRecipients);
        }

        let total = recipients.len();
        info!(audience = audience.as_str(), total, "broadcast started");
        let progress = self.notify(&operator, &notices::broadcast_started(total)).await;

        let tally = self.deliver(&recipients, &payload).await;
        let report = BroadcastReport {
            total,
            succeeded: tally.succeeded,
            failed: tally.failed,
            skipped: tally.skipped,
            audience,
            finished_at: Local::now(),
        };

        let text = report.render();
        // The progress message becomes the report where the messenger allows edits.
        let editable = progress.filter(|_| self.messenger.capabilities().supports_edit);
        let edited = match editable {
            Some(msg) => match self.messenger.edit_text(msg, &text, None).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "failed to update broadcast progress message");
                    false
                }
            },
            None => false,
        };
        if !edited {
            self.notify(&operator, &text).await;
        }

        info!(
            audience = audience.as_str(),
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "broadcast completed"
        );
        Ok(BroadcastOutcome::Completed(report))
    }

    async fn notify(&self, to: &Recipient, text: &str) -> Option<MessageRef> {
        match self.messenger.send_text(to, text, None).await {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(to = %to, error = %e, "failed to notify operator");
                None
            }
        }
    }

    /// Starts at most `rate_per_sec` sends per second with at most
    /// `max_in_flight` outstanding, then waits for every started send.
    async fn deliver(&self, recipients: &[UserId], payload: &MessagePayload) -> Tally {
        let mut admission = IntervalLimiter::per_second(self.cfg.rate_per_sec);
        let permits = Arc::new(Semaphore::new(self.cfg.max_in_flight.max(1)));
        let succeeded = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        let mut dispatched = 0usize;

        for &user in recipients {
            let wait = admission.reserve();
            if !wait.is_zero() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = sleep(wait) => {}
                }
            }
            if self.shutdown.is_cancelled() {
                break;
            }
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                p = permits.clone().acquire_owned() => match p {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            dispatched += 1;
            let messenger = self.messenger.clone();
            let msg = OutgoingMessage::new(payload.clone());
            let succeeded = succeeded.clone();
            let failed = failed.clone();
            workers.spawn(async move {
                let _permit = permit;
                match messenger.send(&Recipient::from(user), msg).await {
                    Ok(_) => {
                        succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        debug!(user = user.0, error = %e, "broadcast delivery failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "broadcast worker aborted");
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let skipped = recipients.len() - dispatched;
        if skipped > 0 {
            warn!(skipped, "broadcast interrupted by shutdown");
        }
        Tally {
            succeeded: succeeded.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            skipped,
        }
    }
}
