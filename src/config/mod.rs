//! Configuration management for the bot

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use self::file::{CheckFileConfig, MariuszConfigFile};
use crate::notify::CheckTiming;
use crate::notify::occupancy::{DEFAULT_HOST, DEFAULT_PORT};
use crate::notify::wiki::DEFAULT_WIKI_URL;
use crate::{Error, Result};

/// Default iCalendar listing of upcoming meetups
pub const DEFAULT_EVENTS_URL: &str = "https://www.meetup.com/hakierspejs-lodz/events/ical/";

/// Settings shared by every notification check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSettings {
    pub enabled: bool,
    pub check_interval: Duration,
    pub debounce: Duration,
}

impl CheckSettings {
    const fn new(check_interval_secs: u64, debounce_secs: u64) -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_secs(check_interval_secs),
            debounce: Duration::from_secs(debounce_secs),
        }
    }

    fn overlay(self, file: &CheckFileConfig) -> Self {
        Self {
            enabled: file.enabled.unwrap_or(self.enabled),
            check_interval: file
                .check_interval_secs
                .map_or(self.check_interval, Duration::from_secs),
            debounce: file.debounce_secs.map_or(self.debounce, Duration::from_secs),
        }
    }

    /// Interval pair for the check scheduler
    #[must_use]
    pub const fn timing(&self) -> CheckTiming {
        CheckTiming {
            check_interval: self.check_interval,
            debounce: self.debounce,
        }
    }
}

/// Event reminder configuration
#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub check: CheckSettings,
    pub url: String,
    /// Only events whose title matches this pattern are announced
    pub title_regex: Option<String>,
    /// Below this much time left the reminder says "starting soon"
    pub lead_time: Duration,
    /// Consecutive fetch failures tolerated before the bot gives up
    pub failure_limit: u32,
    pub retry_interval: Duration,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            check: CheckSettings::new(3600, 0),
            url: DEFAULT_EVENTS_URL.to_string(),
            title_regex: None,
            lead_time: Duration::from_secs(3 * 60 * 60),
            failure_limit: 10,
            retry_interval: Duration::from_secs(10),
        }
    }
}

/// Wiki change configuration
#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub check: CheckSettings,
    pub url: String,
    pub feed_url: Option<String>,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            check: CheckSettings::new(60, 60),
            url: DEFAULT_WIKI_URL.to_string(),
            feed_url: None,
        }
    }
}

/// Voice-server occupancy configuration
#[derive(Debug, Clone)]
pub struct OccupancyConfig {
    pub check: CheckSettings,
    pub host: String,
    pub port: u16,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            check: CheckSettings::new(60, 60),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Poll loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Long-poll timeout passed to the transport
    pub poll_timeout: Duration,
    /// Pause after a transient network failure
    pub network_backoff: Duration,
    /// Pause after broadcasting a crash diagnostic, before exiting
    pub crash_cooldown: Duration,
    /// Per-recipient send timeout
    pub send_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(10),
            network_backoff: Duration::from_secs(1),
            crash_cooldown: Duration::from_secs(600),
            send_timeout: crate::broadcast::DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot API token
    pub token: SecretString,

    /// Home conversation, excluded from most broadcasts
    pub home_chat_id: Option<i64>,

    /// SQLite file with known conversations; in-memory when unset
    pub database_path: Option<PathBuf>,

    pub daemon: DaemonConfig,
    pub events: EventsConfig,
    pub wiki: WikiConfig,
    pub occupancy: OccupancyConfig,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the token is missing, a value does not parse, or an
    /// explicitly given config file cannot be loaded
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        Self::from_sources(fc, |name| std::env::var(name).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the token is missing or a value does not parse
    pub fn from_sources(
        fc: MariuszConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let var = |name: &str| non_empty(env(name));

        let token = var("API_KEY")
            .or_else(|| var("TELEGRAM_BOT_TOKEN"))
            .or_else(|| non_empty(fc.telegram.token))
            .ok_or_else(|| Error::Config("API_KEY is not set".to_string()))?;

        let home_chat_id = match var("MAIN_CHAT_ID") {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|e| Error::Config(format!("invalid MAIN_CHAT_ID {raw}: {e}")))?,
            ),
            None => fc.telegram.home_chat_id,
        };

        let database_path = var("SCIEZKA_DO_BAZY_CHATOW")
            .map(PathBuf::from)
            .or(fc.database.path);

        let defaults = DaemonConfig::default();
        let secs = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_secs);
        let daemon = DaemonConfig {
            poll_timeout: secs(fc.daemon.poll_timeout_secs, defaults.poll_timeout),
            network_backoff: secs(fc.daemon.network_backoff_secs, defaults.network_backoff),
            crash_cooldown: secs(fc.daemon.crash_cooldown_secs, defaults.crash_cooldown),
            send_timeout: secs(fc.daemon.send_timeout_secs, defaults.send_timeout),
        };

        let defaults = EventsConfig::default();
        let events = EventsConfig {
            check: defaults.check.overlay(&fc.events.check),
            url: var("MARIUSZ_EVENTS_URL")
                .or(fc.events.url)
                .unwrap_or(defaults.url),
            title_regex: var("GROUP_REGEX").or(fc.events.title_regex),
            lead_time: secs(fc.events.lead_time_secs, defaults.lead_time),
            failure_limit: fc.events.failure_limit.unwrap_or(defaults.failure_limit),
            retry_interval: secs(fc.events.retry_interval_secs, defaults.retry_interval),
        };

        let defaults = WikiConfig::default();
        let wiki = WikiConfig {
            check: defaults.check.overlay(&fc.wiki.check),
            url: fc.wiki.url.unwrap_or(defaults.url),
            feed_url: var("MARIUSZ_WIKI_FEED_URL").or(fc.wiki.feed_url),
        };

        let defaults = OccupancyConfig::default();
        let occupancy = OccupancyConfig {
            check: defaults.check.overlay(&fc.occupancy.check),
            host: var("MARIUSZ_MUMBLE_HOST")
                .or(fc.occupancy.host)
                .unwrap_or(defaults.host),
            port: fc.occupancy.port.unwrap_or(defaults.port),
        };

        Ok(Self {
            token: SecretString::from(token),
            home_chat_id,
            database_path,
            daemon,
            events,
            wiki,
            occupancy,
        })
    }
}
