//! "Czy mamy w spejsie ...?" - links questions about hackerspace inventory
//! to the inventory search

use async_trait::async_trait;

use crate::Result;
use crate::channels::IncomingMessage;
use crate::router::{Action, Context, Handler};

/// Inventory search endpoint
pub const SEARCH_URL: &str = "https://g.hs-ldz.pl/search?query=";

/// Question openers that make the router consider a message
pub const TRIGGERS: &[&str] = &[
    "jest moze",
    "jest może",
    "czy jest",
    "czy mamy",
    "mamy może",
    "mamy moze",
    "może mamy",
    "moze mamy",
];

/// Ways of saying "at the hackerspace"
const PLACE_PHRASES: &[&str] = &[
    "w spejse",
    "w spejsie",
    "w hackerspejsie",
    "w hs-ie",
    "w hs",
    "w hsie",
];

/// Filler words stripped from the search query
const FILLER: &[&str] = &["jakiś", "jakis", "może", "moze", "mamy"];

/// Build a search link for a question, or `None` if the message is not a
/// question about the hackerspace
#[must_use]
pub fn search_link(message: &str) -> Option<String> {
    if !message.contains('?') {
        return None;
    }

    let lower = message.to_lowercase();
    let mut query = lower.split('?').next().unwrap_or_default().trim().to_string();
    if !PLACE_PHRASES.iter().any(|p| query.contains(p)) {
        return None;
    }

    for phrase in TRIGGERS.iter().chain(PLACE_PHRASES).chain(FILLER) {
        query = query.replace(phrase, "");
    }

    Some(format!("{SEARCH_URL}{}", urlencoding::encode(query.trim())))
}

/// Replies with an inventory search link
#[derive(Debug, Clone, Copy, Default)]
pub struct InventorySearch;

#[async_trait]
impl Handler for InventorySearch {
    fn description(&self) -> &str {
        "Szuka rzeczy w inwentarzu spejsu"
    }

    async fn react(
        &self,
        _ctx: &Context<'_>,
        _message: &IncomingMessage,
        text: &str,
    ) -> Result<Vec<Action>> {
        Ok(search_link(text).map(Action::Reply).into_iter().collect())
    }
}
