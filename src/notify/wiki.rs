//! Wiki change notice
//!
//! Watches the wiki's Atom feed and reports the most recently edited page.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use super::Signal;
use crate::{Error, Result};

/// Default wiki location; the feed lives at `{base}.atom`
pub const DEFAULT_WIKI_URL: &str = "https://github.com/hakierspejs/wiki/wiki";

/// Latest edit seen in the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiEdit {
    pub author: String,
    /// Decoded page name, `Home` for the wiki root
    pub page: String,
    pub revision: String,
    pub updated: DateTime<FixedOffset>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::MalformedFeed(format!("bad selector {css}: {e}")))
}

fn child_text(entry: ElementRef<'_>, sel: &Selector) -> Option<String> {
    entry
        .select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Page name from an entry link under `base`
fn page_name(href: &str, base: &str) -> String {
    let tail = href
        .strip_prefix(base)
        .or_else(|| href.split_once("/wiki/wiki").map(|(_, rest)| rest))
        .unwrap_or(href)
        .trim_matches('/');

    if tail.is_empty() {
        return "Home".to_string();
    }

    urlencoding::decode(tail).map_or_else(|_| tail.to_string(), |decoded| decoded.into_owned())
}

/// Find the most recently updated entry of an Atom feed
///
/// Returns `Ok(None)` for a feed without entries.
///
/// # Errors
///
/// Returns `MalformedFeed` if the document is not a feed or an entry lacks
/// its author, link, id or a valid update time
pub fn latest_edit(feed: &str, base: &str) -> Result<Option<WikiEdit>> {
    let document = Html::parse_document(feed);

    if document.select(&selector("feed")?).next().is_none() {
        return Err(Error::MalformedFeed("no <feed> element".to_string()));
    }

    let entry_sel = selector("feed entry")?;
    let updated_sel = selector("updated")?;
    let link_sel = selector("link[href]")?;
    let id_sel = selector("id")?;
    let author_sel = selector("author name")?;

    let mut latest: Option<WikiEdit> = None;

    for entry in document.select(&entry_sel) {
        let missing = |what: &str| Error::MalformedFeed(format!("entry without {what}"));

        let updated = child_text(entry, &updated_sel).ok_or_else(|| missing("updated"))?;
        let updated = DateTime::parse_from_rfc3339(&updated)
            .map_err(|e| Error::MalformedFeed(format!("bad timestamp {updated}: {e}")))?;

        let href = entry
            .select(&link_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .ok_or_else(|| missing("link"))?;
        let id = child_text(entry, &id_sel).ok_or_else(|| missing("id"))?;
        let author = child_text(entry, &author_sel).ok_or_else(|| missing("author"))?;

        if latest.as_ref().is_some_and(|l| l.updated >= updated) {
            continue;
        }

        latest = Some(WikiEdit {
            author,
            page: page_name(href, base),
            revision: id.rsplit('/').next().unwrap_or(&id).to_string(),
            updated,
        });
    }

    Ok(latest)
}

/// Announcement for an edit
#[must_use]
pub fn render_edit(edit: &WikiEdit, base: &str) -> String {
    let url = format!(
        "{base}/{}/_compare/{rev}%5E...{rev}",
        edit.page,
        rev = edit.revision
    );

    format!(
        "Wiki: {} zmienił(a) \"{}\".\n\nSprawdź zmianę tutaj: {url}",
        edit.author,
        edit.page.replace('-', " ")
    )
}

/// Wiki change watcher
pub struct WikiChange {
    client: Client,
    base: String,
    feed_url: String,
}

impl WikiChange {
    /// Watch the wiki at `base`, reading its feed from `{base}.atom`
    #[must_use]
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            client,
            feed_url: format!("{base}.atom"),
            base,
        }
    }

    /// Read the feed from a different location
    #[must_use]
    pub fn with_feed_url(mut self, feed_url: impl Into<String>) -> Self {
        self.feed_url = feed_url.into();
        self
    }
}

#[async_trait]
impl Signal for WikiChange {
    type Value = WikiEdit;

    fn name(&self) -> &'static str {
        "wiki-change"
    }

    async fn fetch(&self) -> Result<Option<WikiEdit>> {
        let response = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("wiki feed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::SourceUnavailable(format!(
                "wiki feed returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("wiki feed: {e}")))?;

        latest_edit(&body, &self.base)
    }

    fn render(&self, value: &WikiEdit, _previous: Option<&WikiEdit>) -> Option<String> {
        Some(render_edit(value, &self.base))
    }
}
