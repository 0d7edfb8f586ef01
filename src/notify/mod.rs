//! Periodic notification checks
//!
//! Each check polls one external signal at most once per check interval,
//! renders a candidate announcement and sends it only when it differs from
//! the previous one and the debounce interval has passed since the last
//! announcement.

pub mod events;
pub mod occupancy;
pub mod wiki;

use std::fmt::Debug;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;

use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::channels::ChatId;
use crate::conversations::ConversationRegistry;
use crate::{Error, Result};

pub use events::EventReminder;
pub use occupancy::Occupancy;
pub use wiki::WikiChange;

/// Timing of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTiming {
    /// Minimum time between two fetches
    pub check_interval: Duration,
    /// Minimum time between two announcements
    pub debounce: Duration,
}

/// External state source plus its message formatting
#[async_trait]
pub trait Signal: Send + Sync {
    /// Observed external state
    type Value: Clone + PartialEq + Debug + Send + Sync;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetch the current state; `Ok(None)` means there is nothing to report
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot be reached or parsed
    async fn fetch(&self) -> Result<Option<Self::Value>>;

    /// Render the announcement for `value`, given the last announced value
    fn render(&self, value: &Self::Value, previous: Option<&Self::Value>) -> Option<String>;
}

/// Who receives an announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// Every known conversation except the home one
    AllExceptHome,
    /// Every known group conversation
    Groups,
}

/// How an announcement is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Plain message
    Message,
    /// Replace the conversation's pinned message, unless it already says the same
    ReplacePinned,
}

/// Memory of what a check last saw and said
#[derive(Debug, Clone)]
pub struct AnnouncementState<V> {
    /// Value behind the last announcement (or the silent baseline)
    pub last_value: Option<V>,
    /// Text of the last announcement
    pub last_message: Option<String>,
    pub last_announce: Option<Instant>,
    pub last_check: Option<Instant>,
    pub consecutive_failures: u32,
}

impl<V> Default for AnnouncementState<V> {
    fn default() -> Self {
        Self {
            last_value: None,
            last_message: None,
            last_announce: None,
            last_check: None,
            consecutive_failures: 0,
        }
    }
}

/// What a tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Check interval has not elapsed
    NotDue,
    /// Source had nothing to report
    NoData,
    /// First observation recorded without announcing
    Baseline,
    /// Candidate equals the last announcement
    Unchanged,
    /// Candidate changed but the debounce interval has not elapsed
    Debounced,
    /// Candidate was announced
    Announced(BroadcastReport),
    /// Unchanged pinned reminder re-applied where it was missing
    Refreshed(BroadcastReport),
    /// Source failed; treated as no data
    Failed,
}

/// Object-safe view of a notification check, so the daemon can hold a mixed list
#[async_trait]
pub trait Check: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Run the check if it is due
    ///
    /// # Errors
    ///
    /// Returns a fatal error once the consecutive-failure limit is exceeded,
    /// or if the conversation registry cannot be read
    async fn tick(
        &mut self,
        now: Instant,
        broadcaster: &Broadcaster,
        registry: &ConversationRegistry,
    ) -> Result<TickOutcome>;

    /// Fetch and render once without touching state or sending anything
    ///
    /// # Errors
    ///
    /// Returns error if the source fails
    async fn preview(&self) -> Result<Option<String>>;
}

/// Debounced, idempotent poller over one signal
pub struct NotificationCheck<S: Signal> {
    signal: S,
    timing: CheckTiming,
    recipients: Recipients,
    delivery: Delivery,
    quiet_baseline: bool,
    failure_limit: Option<u32>,
    retry_interval: Option<Duration>,
    state: AnnouncementState<S::Value>,
}

impl<S: Signal> NotificationCheck<S> {
    /// Create a check that sends plain messages
    pub fn new(signal: S, timing: CheckTiming, recipients: Recipients) -> Self {
        Self {
            signal,
            timing,
            recipients,
            delivery: Delivery::Message,
            quiet_baseline: false,
            failure_limit: None,
            retry_interval: None,
            state: AnnouncementState::default(),
        }
    }

    /// Set the delivery mode
    #[must_use]
    pub const fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Record the first observation silently instead of announcing it
    #[must_use]
    pub const fn quiet_baseline(mut self) -> Self {
        self.quiet_baseline = true;
        self
    }

    /// Escalate to a fatal error after more than `limit` consecutive failures
    #[must_use]
    pub const fn failure_limit(mut self, limit: u32) -> Self {
        self.failure_limit = Some(limit);
        self
    }

    /// Retry sooner than the check interval after a failed fetch
    #[must_use]
    pub const fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    /// Current announcement state
    pub const fn state(&self) -> &AnnouncementState<S::Value> {
        &self.state
    }

    fn is_due(&self, now: Instant) -> bool {
        let Some(last) = self.state.last_check else {
            return true;
        };
        let interval = match self.retry_interval {
            Some(retry) if self.state.consecutive_failures > 0 => retry.min(self.timing.check_interval),
            _ => self.timing.check_interval,
        };
        now.saturating_duration_since(last) >= interval
    }

    fn debounce_elapsed(&self, now: Instant) -> bool {
        self.state
            .last_announce
            .is_none_or(|last| now.saturating_duration_since(last) >= self.timing.debounce)
    }

    fn record_failure(&mut self, err: &Error) -> Result<TickOutcome> {
        self.state.consecutive_failures += 1;
        let failures = self.state.consecutive_failures;

        if let Some(limit) = self.failure_limit
            && failures > limit
        {
            return Err(Error::Fatal(format!(
                "{} check failed {failures} times in a row: {err}",
                self.signal.name()
            )));
        }

        tracing::warn!(
            check = self.signal.name(),
            failures,
            error = %err,
            "notification source failed, treating as no data"
        );
        Ok(TickOutcome::Failed)
    }

    async fn deliver(
        &self,
        message: &str,
        broadcaster: &Broadcaster,
        registry: &ConversationRegistry,
    ) -> Result<BroadcastReport> {
        let recipients = match self.recipients {
            Recipients::AllExceptHome => registry.all_except(registry.home())?,
            Recipients::Groups => registry.groups()?,
        };

        Ok(match self.delivery {
            Delivery::Message => broadcaster.broadcast(&recipients, message).await,
            Delivery::ReplacePinned => {
                let results = join_all(
                    recipients
                        .iter()
                        .map(|&chat_id| replace_pinned(broadcaster, chat_id, message)),
                )
                .await;
                let delivered = results.iter().filter(|ok| **ok).count();
                BroadcastReport {
                    delivered,
                    failed: results.len() - delivered,
                }
            }
        })
    }
}

#[async_trait]
impl<S: Signal> Check for NotificationCheck<S> {
    fn name(&self) -> &'static str {
        self.signal.name()
    }

    async fn tick(
        &mut self,
        now: Instant,
        broadcaster: &Broadcaster,
        registry: &ConversationRegistry,
    ) -> Result<TickOutcome> {
        if !self.is_due(now) {
            return Ok(TickOutcome::NotDue);
        }
        self.state.last_check = Some(now);

        let value = match self.signal.fetch().await {
            Ok(Some(value)) => value,
            Ok(None) => {
                self.state.consecutive_failures = 0;
                tracing::debug!(check = self.signal.name(), "nothing to report");
                return Ok(TickOutcome::NoData);
            }
            Err(e) if e.is_source_failure() || e.is_transient() => return self.record_failure(&e),
            Err(e) => return Err(e),
        };
        self.state.consecutive_failures = 0;

        if self.quiet_baseline && self.state.last_value.is_none() {
            tracing::debug!(check = self.signal.name(), ?value, "baseline recorded");
            self.state.last_message = self.signal.render(&value, None);
            self.state.last_value = Some(value);
            self.state.last_announce = Some(now);
            return Ok(TickOutcome::Baseline);
        }

        let Some(message) = self
            .signal
            .render(&value, self.state.last_value.as_ref())
            .filter(|m| !m.is_empty())
        else {
            return Ok(TickOutcome::Unchanged);
        };

        if self.state.last_message.as_deref() == Some(message.as_str()) {
            if self.delivery != Delivery::ReplacePinned {
                return Ok(TickOutcome::Unchanged);
            }
            // Groups that missed the pin, or joined since, get it now
            let report = self.deliver(&message, broadcaster, registry).await?;
            return Ok(TickOutcome::Refreshed(report));
        }

        if !self.debounce_elapsed(now) {
            tracing::debug!(check = self.signal.name(), "change debounced");
            return Ok(TickOutcome::Debounced);
        }

        let report = self.deliver(&message, broadcaster, registry).await?;
        tracing::info!(
            check = self.signal.name(),
            delivered = report.delivered,
            failed = report.failed,
            "announcement sent"
        );

        self.state.last_value = Some(value);
        self.state.last_message = Some(message);
        self.state.last_announce = Some(now);

        Ok(TickOutcome::Announced(report))
    }

    async fn preview(&self) -> Result<Option<String>> {
        let Some(value) = self.signal.fetch().await? else {
            return Ok(None);
        };
        Ok(self
            .signal
            .render(&value, self.state.last_value.as_ref())
            .or_else(|| Some(format!("{value:?}"))))
    }
}

/// Swap a conversation's pinned message for `message`
///
/// Returns whether the conversation now shows `message` pinned.
async fn replace_pinned(broadcaster: &Broadcaster, chat_id: ChatId, message: &str) -> bool {
    let transport = broadcaster.transport();

    match transport.pinned_message_text(chat_id).await {
        Ok(Some(pinned)) if pinned == message => {
            tracing::debug!(chat_id, "pinned message already up to date");
            return true;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "could not read pinned message");
            return false;
        }
    }

    let Some(sent) = broadcaster.send(chat_id, message).await else {
        return false;
    };

    // Nothing pinned is fine
    if let Err(e) = transport.unpin_message(chat_id, None).await {
        tracing::debug!(chat_id, error = %e, "unpin failed");
    }

    match transport.pin_message(chat_id, sent.message_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "pin failed");
            false
        }
    }
}
