//! Pattern router
//!
//! Holds the ordered reaction table and picks the handler for an incoming
//! message. Registration order is priority: when several patterns accept the
//! same text, only the first registered one fires.

use std::sync::Arc;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use crate::channels::IncomingMessage;
use crate::{Error, Result};

/// A single trigger string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    text: String,
    anchored: bool,
}

impl Trigger {
    /// Trigger that matches anywhere in the message
    #[must_use]
    pub fn anywhere(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            anchored: false,
        }
    }

    /// Trigger that only matches at the very start of the message
    #[must_use]
    pub fn anchored(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            anchored: true,
        }
    }

    /// Parse a trigger using the command convention: words starting with
    /// `.` are commands and therefore anchored
    #[must_use]
    pub fn parse(word: &str) -> Self {
        if word.starts_with('.') {
            Self::anchored(word)
        } else {
            Self::anywhere(word)
        }
    }

    /// Trigger text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the trigger is anchored at the start of the message
    #[must_use]
    pub const fn is_anchored(&self) -> bool {
        self.anchored
    }

    fn fragment(&self) -> String {
        let escaped = regex::escape(&self.text);
        if self.anchored {
            format!("^{escaped}")
        } else {
            escaped
        }
    }
}

/// Ordered set of triggers combined into one case-insensitive matcher
///
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct Pattern {
    triggers: Vec<Trigger>,
    regex: Regex,
}

impl Pattern {
    /// Build a pattern from triggers
    ///
    /// Triggers equal up to case are collapsed, keeping the first one.
    ///
    /// # Errors
    ///
    /// Returns error if no non-empty trigger is given
    pub fn new(triggers: impl IntoIterator<Item = Trigger>) -> Result<Self> {
        let mut unique: Vec<Trigger> = Vec::new();
        for trigger in triggers {
            if trigger.text.is_empty() {
                continue;
            }
            let duplicate = unique.iter().any(|t| {
                t.anchored == trigger.anchored && t.text.to_lowercase() == trigger.text.to_lowercase()
            });
            if !duplicate {
                unique.push(trigger);
            }
        }

        if unique.is_empty() {
            return Err(Error::Config("pattern needs at least one trigger".to_string()));
        }

        let source = unique
            .iter()
            .map(Trigger::fragment)
            .collect::<Vec<_>>()
            .join("|");
        let regex = RegexBuilder::new(&source).case_insensitive(true).build()?;

        Ok(Self {
            triggers: unique,
            regex,
        })
    }

    /// Build a pattern from words using [`Trigger::parse`]
    ///
    /// # Errors
    ///
    /// Returns error if no non-empty word is given
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(words.into_iter().map(|w| Trigger::parse(w.as_ref())))
    }

    /// Regular-expression source of the combined matcher
    #[must_use]
    pub fn source(&self) -> &str {
        self.regex.as_str()
    }

    /// Triggers in the order they were given
    #[must_use]
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Whether the pattern accepts `text`
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        !text.is_empty() && self.regex.is_match(text)
    }
}

/// Something a handler wants done in response to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Reply in the conversation the message came from
    Reply(String),
    /// Send to every known conversation except the home one
    Broadcast(String),
}

/// Data available to a handler while it reacts
pub struct Context<'a> {
    /// The router that dispatched the message, for self-documentation
    pub router: &'a PatternRouter,
}

/// A reaction to a matched message
#[async_trait]
pub trait Handler: Send + Sync {
    /// Human-readable description used by the help listing
    fn description(&self) -> &str;

    /// Compute the actions for a message whose text matched
    ///
    /// # Errors
    ///
    /// Returns error if a live lookup fails
    async fn react(&self, ctx: &Context<'_>, message: &IncomingMessage, text: &str)
    -> Result<Vec<Action>>;
}

/// Always replies with the same text
#[derive(Debug, Clone)]
pub struct StaticReply {
    reply: String,
    description: String,
}

impl StaticReply {
    /// Create a static reply
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        let description = format!("mówi `{reply}`");
        Self { reply, description }
    }
}

#[async_trait]
impl Handler for StaticReply {
    fn description(&self) -> &str {
        &self.description
    }

    async fn react(
        &self,
        _ctx: &Context<'_>,
        _message: &IncomingMessage,
        _text: &str,
    ) -> Result<Vec<Action>> {
        Ok(vec![Action::Reply(self.reply.clone())])
    }
}

/// Handler computed by a synchronous closure over the message text
pub struct FnHandler<F> {
    description: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Context<'_>, &str) -> Vec<Action> + Send + Sync,
{
    /// Wrap a closure with its description
    pub fn new(description: impl Into<String>, f: F) -> Self {
        Self {
            description: description.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Context<'_>, &str) -> Vec<Action> + Send + Sync,
{
    fn description(&self) -> &str {
        &self.description
    }

    async fn react(
        &self,
        ctx: &Context<'_>,
        _message: &IncomingMessage,
        text: &str,
    ) -> Result<Vec<Action>> {
        Ok((self.f)(ctx, text))
    }
}

struct Route {
    pattern: Pattern,
    handler: Arc<dyn Handler>,
}

/// Ordered (pattern, handler) table with first-match-wins dispatch
#[derive(Default)]
pub struct PatternRouter {
    routes: Vec<Route>,
}

impl PatternRouter {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route; earlier routes take precedence
    pub fn register(&mut self, pattern: Pattern, handler: impl Handler + 'static) -> &mut Self {
        self.register_shared(pattern, Arc::new(handler))
    }

    /// Append a route with a shared handler
    ///
    /// Registering the same handler twice under an identical pattern is a no-op.
    pub fn register_shared(&mut self, pattern: Pattern, handler: Arc<dyn Handler>) -> &mut Self {
        let duplicate = self.routes.iter().any(|r| {
            r.pattern.source() == pattern.source() && Arc::ptr_eq(&r.handler, &handler)
        });
        if duplicate {
            tracing::debug!(pattern = pattern.source(), "ignoring duplicate route");
            return self;
        }

        tracing::debug!(
            pattern = pattern.source(),
            description = handler.description(),
            "registered reaction"
        );
        self.routes.push(Route { pattern, handler });
        self
    }

    /// First handler whose pattern accepts `text`
    #[must_use]
    pub fn route(&self, text: &str) -> Option<&Arc<dyn Handler>> {
        if text.is_empty() {
            return None;
        }
        self.routes
            .iter()
            .find(|r| r.pattern.matches(text))
            .map(|r| &r.handler)
    }

    /// (pattern source, description) pairs in registration order
    pub fn describe(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.pattern.source(), r.handler.description()))
    }

    /// Help listing, one `pattern => description` line per route
    #[must_use]
    pub fn help_text(&self) -> String {
        self.describe()
            .map(|(source, description)| format!("{source} => {description}\n"))
            .collect()
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_of(actions: &[Action]) -> &str {
        match actions {
            [Action::Reply(text)] => text,
            other => panic!("expected a single reply, got {other:?}"),
        }
    }

    async fn dispatch(router: &PatternRouter, text: &str) -> Option<Vec<Action>> {
        let handler = router.route(text)?;
        let message = IncomingMessage::text(1, -1, text);
        let ctx = Context { router };
        Some(handler.react(&ctx, &message, text).await.unwrap())
    }

    #[test]
    fn anywhere_trigger_matches_mid_text() {
        let pattern = Pattern::from_words(["jeszcze jak"]).unwrap();
        assert!(pattern.matches("no jeszcze jak!"));
        assert!(pattern.matches("JESZCZE JAK"));
        assert!(!pattern.matches("jeszcze nie"));
    }

    #[test]
    fn dot_words_are_anchored() {
        let pattern = Pattern::from_words([".help"]).unwrap();
        assert!(pattern.matches(".help"));
        assert!(pattern.matches(".HELP me"));
        assert!(!pattern.matches("try .help"));
        assert_eq!(pattern.source(), r"^\.help");
    }

    #[test]
    fn trigger_text_is_literal() {
        let pattern = Pattern::from_words([".co"]).unwrap();
        assert!(!pattern.matches("xco"));
        assert!(pattern.matches(".corobic"));
    }

    #[test]
    fn empty_text_never_matches() {
        let pattern = Pattern::new([Trigger::anywhere("a")]).unwrap();
        assert!(!pattern.matches(""));

        let mut router = PatternRouter::new();
        router.register(pattern, StaticReply::new("x"));
        assert!(router.route("").is_none());
    }

    #[test]
    fn duplicate_triggers_collapse() {
        let pattern = Pattern::from_words(["Łódź", "łódź", "Lodz"]).unwrap();
        assert_eq!(pattern.triggers().len(), 2);
    }

    #[test]
    fn pattern_without_triggers_is_rejected() {
        assert!(Pattern::from_words(Vec::<String>::new()).is_err());
        assert!(Pattern::from_words([""]).is_err());
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let mut router = PatternRouter::new();
        router
            .register(Pattern::from_words([".co"]).unwrap(), StaticReply::new("co"))
            .register(Pattern::from_words([".corobic"]).unwrap(), StaticReply::new("corobic"));

        let actions = dispatch(&router, ".corobic").await.unwrap();
        assert_eq!(reply_of(&actions), "co");
    }

    #[tokio::test]
    async fn no_match_routes_nowhere() {
        let mut router = PatternRouter::new();
        router.register(Pattern::from_words(["foo"]).unwrap(), StaticReply::new("bar"));
        assert!(dispatch(&router, "nothing here").await.is_none());
    }

    #[tokio::test]
    async fn fn_handler_sees_text() {
        let mut router = PatternRouter::new();
        router.register(
            Pattern::from_words([".echo"]).unwrap(),
            FnHandler::new("powtarza", |_, text: &str| vec![Action::Reply(text.to_uppercase())]),
        );

        let actions = dispatch(&router, ".echo hi").await.unwrap();
        assert_eq!(reply_of(&actions), ".ECHO HI");
    }

    #[test]
    fn describe_in_registration_order() {
        let mut router = PatternRouter::new();
        router
            .register(Pattern::from_words(["b"]).unwrap(), StaticReply::new("2"))
            .register(Pattern::from_words(["a"]).unwrap(), StaticReply::new("1"));

        let listing: Vec<_> = router.describe().collect();
        assert_eq!(listing, vec![("b", "mówi `2`"), ("a", "mówi `1`")]);
        assert_eq!(router.help_text(), "b => mówi `2`\na => mówi `1`\n");
    }

    #[test]
    fn same_handler_same_pattern_registers_once() {
        let handler: Arc<dyn Handler> = Arc::new(StaticReply::new("x"));
        let mut router = PatternRouter::new();
        router
            .register_shared(Pattern::from_words(["x"]).unwrap(), Arc::clone(&handler))
            .register_shared(Pattern::from_words(["x"]).unwrap(), handler);
        assert_eq!(router.len(), 1);
    }
}
