//! Built-in reaction table
//!
//! Registration order below is the dispatch priority.

pub mod inventory;
pub mod magic_ball;
pub mod version;

use async_trait::async_trait;

use crate::Result;
use crate::channels::IncomingMessage;
use crate::router::{Action, Context, Handler, Pattern, PatternRouter, StaticReply};

pub use inventory::InventorySearch;
pub use magic_ball::MagicBall;
pub use version::{BuildInfo, VersionReply};

const LODZ_URL: &str = "https://www.youtube.com/watch?v=IJ2kvZpJ_BU";
const JESZCZE_JAK_URL: &str = "https://www.youtube.com/watch?v=_jX3qsyIlHc";
const PAN_JEZUS_URL: &str = "https://www.youtube.com/watch?v=aWJ8X3mt8Io";
const CO_ROBIC_URL: &str = "https://www.youtube.com/watch?v=6NR-Lq-hhSw";
const CO_URL: &str = "https://www.youtube.com/watch?v=YeIGdcSM5NY";

/// Replace Polish diacritic letters with their Latin counterparts
#[must_use]
pub fn strip_diacritics(word: &str) -> String {
    word.chars()
        .map(|c| match c {
            'ą' => 'a',
            'Ą' => 'A',
            'ć' => 'c',
            'Ć' => 'C',
            'ę' => 'e',
            'Ę' => 'E',
            'ł' => 'l',
            'Ł' => 'L',
            'ń' => 'n',
            'Ń' => 'N',
            'ó' => 'o',
            'Ó' => 'O',
            'ś' => 's',
            'Ś' => 'S',
            'ź' | 'ż' => 'z',
            'Ź' | 'Ż' => 'Z',
            other => other,
        })
        .collect()
}

/// Each word followed by its diacritic-free spelling (when it differs)
#[must_use]
pub fn with_diacritic_variants(words: &[&str]) -> Vec<String> {
    let mut out = Vec::with_capacity(words.len() * 2);
    for word in words {
        out.push((*word).to_string());
        let stripped = strip_diacritics(word);
        if stripped != *word {
            out.push(stripped);
        }
    }
    out
}

/// Lists every registered reaction
#[derive(Debug, Clone, Copy, Default)]
pub struct Help;

#[async_trait]
impl Handler for Help {
    fn description(&self) -> &str {
        "Wyświetla pomoc"
    }

    async fn react(
        &self,
        ctx: &Context<'_>,
        _message: &IncomingMessage,
        _text: &str,
    ) -> Result<Vec<Action>> {
        Ok(vec![Action::Reply(ctx.router.help_text())])
    }
}

/// Build the bot's reaction table
///
/// # Errors
///
/// Returns error if a pattern fails to compile
pub fn default_router(build: BuildInfo) -> Result<PatternRouter> {
    let mut router = PatternRouter::new();

    router
        .register(
            Pattern::from_words(with_diacritic_variants(&["Łódź", "Łodzi", "łódzkie"]))?,
            StaticReply::new(LODZ_URL),
        )
        .register(Pattern::from_words([".wersja"])?, VersionReply::new(build))
        .register(
            Pattern::from_words(["jeszcze jak"])?,
            StaticReply::new(JESZCZE_JAK_URL),
        )
        .register(Pattern::from_words(inventory::TRIGGERS)?, InventorySearch)
        .register(Pattern::from_words([".panjezus"])?, StaticReply::new(PAN_JEZUS_URL))
        .register(Pattern::from_words([".corobic"])?, StaticReply::new(CO_ROBIC_URL))
        .register(Pattern::from_words([".co"])?, StaticReply::new(CO_URL))
        .register(Pattern::from_words([".help", ".pomoc", ".komendy"])?, Help)
        .register(Pattern::from_words([".czy"])?, MagicBall)
        .register(
            Pattern::from_words([".covid", ".coronavirus"])?,
            StaticReply::new("Komenda wyłączona."),
        );

    tracing::info!(reactions = router.len(), "reaction table ready");
    Ok(router)
}
