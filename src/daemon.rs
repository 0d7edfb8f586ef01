//! Bot daemon: notification checks and message polling in one loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::broadcast::Broadcaster;
use crate::channels::retry::backoff_delay;
use crate::channels::{IncomingMessage, TelegramTransport, Transport};
use crate::config::{Config, DaemonConfig};
use crate::conversations::{ConversationRegistry, ConversationStore, MemoryConversationStore};
use crate::db::{self, SqliteConversationStore};
use crate::notify::{
    Check, Delivery, EventReminder, NotificationCheck, Occupancy, Recipients, WikiChange,
};
use crate::reactions::{self, BuildInfo};
use crate::router::{Action, Context, PatternRouter};
use crate::{Error, Result};

/// Timeout for event listing and wiki feed requests
const SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Resume cursor into the transport's update stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOffset(Option<i64>);

impl PollOffset {
    /// Start at `offset`, or wherever the transport begins when `None`
    #[must_use]
    pub const fn new(offset: Option<i64>) -> Self {
        Self(offset)
    }

    #[must_use]
    pub const fn get(self) -> Option<i64> {
        self.0
    }

    /// Move past `update_id`; never moves backwards
    pub fn advance_past(&mut self, update_id: i64) {
        let next = update_id + 1;
        if self.0.is_none_or(|current| next > current) {
            self.0 = Some(next);
        }
    }
}

/// Build the enabled notification checks
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built or the event title
/// filter is not a valid regex
pub fn build_checks(config: &Config) -> Result<Vec<Box<dyn Check>>> {
    let client = Client::builder().timeout(SOURCE_TIMEOUT).build()?;
    let mut checks: Vec<Box<dyn Check>> = Vec::new();

    let events = &config.events;
    if events.check.enabled {
        let title_filter = events.title_regex.as_deref().map(Regex::new).transpose()?;
        let reminder = EventReminder::new(client.clone(), events.url.clone())
            .with_title_filter(title_filter)
            .with_lead_time(events.lead_time);

        checks.push(Box::new(
            NotificationCheck::new(reminder, events.check.timing(), Recipients::Groups)
                .delivery(Delivery::ReplacePinned)
                .failure_limit(events.failure_limit)
                .retry_interval(events.retry_interval),
        ));
    }

    let wiki = &config.wiki;
    if wiki.check.enabled {
        let mut signal = WikiChange::new(client, wiki.url.clone());
        if let Some(feed_url) = &wiki.feed_url {
            signal = signal.with_feed_url(feed_url.clone());
        }

        checks.push(Box::new(
            NotificationCheck::new(signal, wiki.check.timing(), Recipients::AllExceptHome)
                .quiet_baseline(),
        ));
    }

    let occupancy = &config.occupancy;
    if occupancy.check.enabled {
        checks.push(Box::new(
            NotificationCheck::new(
                Occupancy::new(occupancy.host.clone(), occupancy.port),
                occupancy.check.timing(),
                Recipients::Groups,
            )
            .quiet_baseline(),
        ));
    }

    Ok(checks)
}

/// Open the known-conversation store
///
/// # Errors
///
/// Returns error if the database file cannot be opened or migrated
pub fn open_registry(config: &Config) -> Result<ConversationRegistry> {
    let store: Arc<dyn ConversationStore> = match &config.database_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using conversation database");
            Arc::new(SqliteConversationStore::new(db::init(path)?))
        }
        None => {
            tracing::warn!("no conversation database configured, conversations will not survive a restart");
            Arc::new(MemoryConversationStore::default())
        }
    };

    Ok(ConversationRegistry::new(store, config.home_chat_id))
}

/// The bot's main loop
pub struct Daemon {
    broadcaster: Broadcaster,
    registry: ConversationRegistry,
    router: PatternRouter,
    checks: Vec<Box<dyn Check>>,
    offset: PollOffset,
    settings: DaemonConfig,
    greeting: Option<String>,
}

impl Daemon {
    /// Create a daemon without notification checks
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: ConversationRegistry,
        router: PatternRouter,
        settings: DaemonConfig,
    ) -> Self {
        Self {
            broadcaster: Broadcaster::new(transport).with_send_timeout(settings.send_timeout),
            registry,
            router,
            checks: Vec::new(),
            offset: PollOffset::default(),
            settings,
            greeting: None,
        }
    }

    /// Wire up the Telegram transport, reactions and checks from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the database, reaction table or checks cannot be set up
    pub fn from_config(config: &Config, build: BuildInfo) -> Result<Self> {
        let transport = Arc::new(TelegramTransport::new(config.token.clone()));
        let registry = open_registry(config)?;
        let greeting = format!("Bot się wita po restarcie. wersja={}", build.describe());
        let router = reactions::default_router(build)?;

        let mut daemon = Self::new(transport, registry, router, config.daemon);
        daemon.checks = build_checks(config)?;
        daemon.greeting = Some(greeting);

        tracing::info!(
            reactions = daemon.router.len(),
            checks = daemon.checks.len(),
            home = ?config.home_chat_id,
            "daemon configured"
        );
        Ok(daemon)
    }

    /// Add a notification check
    #[must_use]
    pub fn with_check(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Resume polling from `offset`
    #[must_use]
    pub const fn with_offset(mut self, offset: Option<i64>) -> Self {
        self.offset = PollOffset::new(offset);
        self
    }

    /// Message broadcast to every conversation but the home one at startup
    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Next offset the transport will be asked for
    #[must_use]
    pub const fn offset(&self) -> Option<i64> {
        self.offset.get()
    }

    #[must_use]
    pub const fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn router(&self) -> &PatternRouter {
        &self.router
    }

    #[must_use]
    pub fn checks(&self) -> &[Box<dyn Check>] {
        &self.checks
    }

    /// One iteration at the current time
    ///
    /// # Errors
    ///
    /// See [`Daemon::run_once_at`]
    pub async fn run_once(&mut self) -> Result<()> {
        self.run_once_at(Instant::now()).await
    }

    /// One iteration: tick every check, then fetch and dispatch new messages
    ///
    /// # Errors
    ///
    /// Returns transient errors from polling or replying, fatal errors from
    /// checks that exceeded their failure limit, and registry failures
    pub async fn run_once_at(&mut self, now: Instant) -> Result<()> {
        for check in &mut self.checks {
            match check.tick(now, &self.broadcaster, &self.registry).await {
                Ok(outcome) => tracing::trace!(check = check.name(), ?outcome, "check ticked"),
                Err(e @ Error::Fatal(_)) => return Err(e),
                Err(e) => tracing::warn!(check = check.name(), error = %e, "check failed"),
            }
        }

        let timeout_secs = self.settings.poll_timeout.as_secs();
        let updates = self
            .broadcaster
            .transport()
            .get_updates(self.offset.get(), timeout_secs)
            .await?;

        for message in updates {
            self.offset.advance_past(message.update_id);

            let Some(text) = message.text.as_deref() else {
                tracing::trace!(update_id = message.update_id, "update without text skipped");
                continue;
            };

            self.registry.register(message.chat_id)?;
            self.dispatch(&message, text).await?;
        }

        Ok(())
    }

    async fn dispatch(&self, message: &IncomingMessage, text: &str) -> Result<()> {
        let Some(handler) = self.router.route(text) else {
            return Ok(());
        };

        let ctx = Context {
            router: &self.router,
        };
        let actions = match handler.react(&ctx, message, text).await {
            Ok(actions) => actions,
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                tracing::warn!(chat_id = message.chat_id, error = %e, "reaction failed");
                return Ok(());
            }
        };

        for action in actions {
            match action {
                Action::Reply(reply) => {
                    self.broadcaster.try_send(message.chat_id, &reply).await?;
                }
                Action::Broadcast(text) => {
                    self.broadcaster
                        .broadcast_except(&self.registry, &text, self.registry.home())
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn announce(&self, text: &str) {
        if let Err(e) = self
            .broadcaster
            .broadcast_except(&self.registry, text, self.registry.home())
            .await
        {
            tracing::warn!(error = %e, "could not list conversations for broadcast");
        }
    }

    /// Run until a shutdown signal arrives or a fatal error occurs
    ///
    /// Shutdown takes effect between iterations. Dropping every sender is not
    /// a shutdown request.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the loop, after it was broadcast
    /// and the crash cooldown elapsed
    pub async fn run_until(mut self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        if let Some(greeting) = &self.greeting {
            self.announce(greeting).await;
        }

        loop {
            match shutdown.try_recv() {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    break;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
            }

            match self.run_once().await {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    let delay = backoff_delay(self.settings.network_backoff, &e);
                    tracing::warn!(error = %e, ?delay, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_recipient_scoped() => {
                    tracing::warn!(error = %e, "conversation skipped");
                }
                Err(e) => {
                    tracing::error!(error = %e, "unrecoverable error");
                    self.announce(&format!("Bot umar. Błąd:\n\n{e}")).await;

                    tokio::select! {
                        Some(()) = shutdown.recv() => tracing::info!("shutdown during crash cooldown"),
                        () = tokio::time::sleep(self.settings.crash_cooldown) => {}
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!("daemon stopped");
        Ok(())
    }

    /// Run until ctrl-c or a fatal error
    ///
    /// # Errors
    ///
    /// See [`Daemon::run_until`]
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = shutdown_tx_clone.send(()).await;
                }
                Err(e) => tracing::warn!(error = %e, "ctrl-c handler unavailable"),
            }
        });

        let result = self.run_until(shutdown_rx).await;
        drop(shutdown_tx);
        result
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("registry", &self.registry)
            .field("routes", &self.router.len())
            .field("checks", &self.checks.len())
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}
