//! `.wersja` - describes the running build

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;
use crate::channels::IncomingMessage;
use crate::router::{Action, Context, Handler};

/// Directory where the deployment drops commit metadata
const DEFAULT_METADATA_DIR: &str = "/tmp";

/// Build identification, read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub commit: String,
    pub number: String,
    pub date: String,
}

impl BuildInfo {
    /// Read `commit-id`, `commit-no` and `commit-date` from `dir`
    ///
    /// Falls back to the crate version when the files are missing.
    #[must_use]
    pub fn detect_in(dir: &Path) -> Self {
        let read = |name: &str| {
            std::fs::read_to_string(dir.join(name))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        match (read("commit-id"), read("commit-no"), read("commit-date")) {
            (Some(commit), Some(number), Some(date)) => Self {
                commit,
                number,
                date,
            },
            _ => {
                tracing::debug!(dir = %dir.display(), "no commit metadata, using package version");
                Self {
                    commit: env!("CARGO_PKG_VERSION").to_string(),
                    number: "?".to_string(),
                    date: "?".to_string(),
                }
            }
        }
    }

    /// Detect from the default metadata directory
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_in(&PathBuf::from(DEFAULT_METADATA_DIR))
    }

    /// Short description: first six characters of the commit, number and date
    #[must_use]
    pub fn describe(&self) -> String {
        let short: String = self.commit.chars().take(6).collect();
        format!("{short} (#{}, {})", self.number, self.date)
    }
}

/// Replies with the build description
#[derive(Debug, Clone)]
pub struct VersionReply {
    build: BuildInfo,
}

impl VersionReply {
    #[must_use]
    pub const fn new(build: BuildInfo) -> Self {
        Self { build }
    }
}

#[async_trait]
impl Handler for VersionReply {
    fn description(&self) -> &str {
        "Podaje pierwsze 6 znaków hasha commita wersji."
    }

    async fn react(
        &self,
        _ctx: &Context<'_>,
        _message: &IncomingMessage,
        _text: &str,
    ) -> Result<Vec<Action>> {
        Ok(vec![Action::Reply(self.build.describe())])
    }
}
