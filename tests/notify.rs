//! Notification check integration tests
//!
//! Drives `NotificationCheck` with a scripted signal and the mock transport

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mariusz::notify::{
    Check, CheckTiming, Delivery, NotificationCheck, Occupancy, Recipients, Signal, TickOutcome,
};
use mariusz::{Broadcaster, Error, Result};

mod common;
use common::{MockTransport, registry_with};

/// Signal replaying a script of fetch results, then reporting nothing
struct Scripted {
    script: Mutex<VecDeque<Result<Option<String>>>>,
}

impl Scripted {
    fn new(script: Vec<Result<Option<String>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    fn values(values: &[&str]) -> Self {
        Self::new(values.iter().map(|v| Ok(Some((*v).to_string()))).collect())
    }
}

#[async_trait]
impl Signal for Scripted {
    type Value = String;

    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self) -> Result<Option<String>> {
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    fn render(&self, value: &String, _previous: Option<&String>) -> Option<String> {
        Some(value.clone())
    }
}

const MINUTE: Duration = Duration::from_secs(60);

fn timing(check_interval: Duration, debounce: Duration) -> CheckTiming {
    CheckTiming {
        check_interval,
        debounce,
    }
}

fn unavailable() -> Error {
    Error::SourceUnavailable("offline".to_string())
}

#[tokio::test]
async fn identical_candidates_announce_once() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1, 5], Some(5));
    let mut check = NotificationCheck::new(
        Scripted::values(&["a", "a"]),
        timing(MINUTE, Duration::ZERO),
        Recipients::AllExceptHome,
    );

    let t0 = Instant::now();
    let first = check.tick(t0, &broadcaster, &registry).await.unwrap();
    assert!(matches!(first, TickOutcome::Announced(_)));

    let second = check.tick(t0 + MINUTE, &broadcaster, &registry).await.unwrap();
    assert_eq!(second, TickOutcome::Unchanged);

    assert_eq!(transport.recipients_of("a").await, vec![-1]);
}

#[tokio::test]
async fn check_interval_limits_fetches() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["a", "b"]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    );

    let t0 = Instant::now();
    check.tick(t0, &broadcaster, &registry).await.unwrap();
    let early = check
        .tick(t0 + Duration::from_secs(30), &broadcaster, &registry)
        .await
        .unwrap();
    assert_eq!(early, TickOutcome::NotDue);

    let due = check.tick(t0 + MINUTE, &broadcaster, &registry).await.unwrap();
    assert!(matches!(due, TickOutcome::Announced(_)));
    assert_eq!(transport.sent_messages().await.len(), 2);
}

#[tokio::test]
async fn change_within_debounce_is_held_back() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["a", "b", "b"]),
        timing(Duration::from_secs(10), MINUTE),
        Recipients::Groups,
    );

    let t0 = Instant::now();
    check.tick(t0, &broadcaster, &registry).await.unwrap();

    let held = check
        .tick(t0 + Duration::from_secs(20), &broadcaster, &registry)
        .await
        .unwrap();
    assert_eq!(held, TickOutcome::Debounced);
    assert!(transport.recipients_of("b").await.is_empty());

    let released = check
        .tick(t0 + Duration::from_secs(70), &broadcaster, &registry)
        .await
        .unwrap();
    assert!(matches!(released, TickOutcome::Announced(_)));
    assert_eq!(transport.recipients_of("b").await, vec![-1]);
}

#[tokio::test]
async fn source_failure_is_not_a_change() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Scripted::new(vec![
            Ok(Some("a".to_string())),
            Err(unavailable()),
            Ok(Some("a".to_string())),
        ]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    );

    let t0 = Instant::now();
    check.tick(t0, &broadcaster, &registry).await.unwrap();
    let failed = check.tick(t0 + MINUTE, &broadcaster, &registry).await.unwrap();
    assert_eq!(failed, TickOutcome::Failed);
    assert_eq!(check.state().last_message.as_deref(), Some("a"));

    let after = check.tick(t0 + 2 * MINUTE, &broadcaster, &registry).await.unwrap();
    assert_eq!(after, TickOutcome::Unchanged);
    assert_eq!(transport.sent_messages().await.len(), 1);
}

#[tokio::test]
async fn repeated_failures_escalate_to_fatal() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Scripted::new((0..4).map(|_| Err(unavailable())).collect()),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    )
    .failure_limit(2)
    .retry_interval(Duration::from_secs(10));

    let t0 = Instant::now();
    let step = Duration::from_secs(10);
    assert_eq!(
        check.tick(t0, &broadcaster, &registry).await.unwrap(),
        TickOutcome::Failed
    );
    assert_eq!(
        check.tick(t0 + step, &broadcaster, &registry).await.unwrap(),
        TickOutcome::Failed
    );

    let err = check
        .tick(t0 + 2 * step, &broadcaster, &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Fatal(_)));
}

#[tokio::test]
async fn success_resets_failure_count() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Scripted::new(vec![
            Err(unavailable()),
            Ok(Some("a".to_string())),
            Err(unavailable()),
        ]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    )
    .failure_limit(1);

    let t0 = Instant::now();
    for i in 0..3 {
        check.tick(t0 + i * MINUTE, &broadcaster, &registry).await.unwrap();
    }
    assert_eq!(check.state().consecutive_failures, 1);
}

#[tokio::test]
async fn quiet_baseline_records_first_value() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1, 3], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["a", "b"]),
        timing(MINUTE, MINUTE),
        Recipients::AllExceptHome,
    )
    .quiet_baseline();

    let t0 = Instant::now();
    assert_eq!(
        check.tick(t0, &broadcaster, &registry).await.unwrap(),
        TickOutcome::Baseline
    );
    assert!(transport.sent_messages().await.is_empty());

    check.tick(t0 + MINUTE, &broadcaster, &registry).await.unwrap();
    assert_eq!(transport.recipients_of("b").await, vec![-1, 3]);
}

#[tokio::test]
async fn pinned_reminder_replaces_old_pin_in_groups_only() {
    let transport = MockTransport::new();
    transport.set_pinned(-1, "stare").await;
    transport.set_pinned(-2, "nowe").await;
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1, -2, -3, 9], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["nowe"]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    )
    .delivery(Delivery::ReplacePinned);

    let outcome = check.tick(Instant::now(), &broadcaster, &registry).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Announced(r) if r.delivered == 3 && r.failed == 0));

    // -2 already had it pinned; 9 is a private chat
    assert_eq!(transport.recipients_of("nowe").await, vec![-3, -1]);
    assert_eq!(transport.pinned(-1).await.as_deref(), Some("nowe"));
    assert_eq!(transport.pinned(-3).await.as_deref(), Some("nowe"));
    assert_eq!(transport.pins.lock().await.len(), 2);
}

#[tokio::test]
async fn revoked_group_does_not_stop_pinning_elsewhere() {
    let transport = MockTransport::new();
    transport.revoke(-1).await;
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1, -2], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["x"]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    )
    .delivery(Delivery::ReplacePinned);

    let outcome = check.tick(Instant::now(), &broadcaster, &registry).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Announced(r) if r.delivered == 1 && r.failed == 1));
    assert_eq!(transport.pinned(-2).await.as_deref(), Some("x"));
}

#[tokio::test]
async fn unchanged_pin_reaches_group_that_joined_later() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["x", "x", "x"]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    )
    .delivery(Delivery::ReplacePinned);

    let t0 = Instant::now();
    check.tick(t0, &broadcaster, &registry).await.unwrap();
    registry.register(-2).unwrap();

    let second = check.tick(t0 + MINUTE, &broadcaster, &registry).await.unwrap();
    assert!(matches!(second, TickOutcome::Refreshed(r) if r.delivered == 2 && r.failed == 0));
    assert_eq!(transport.pinned(-2).await.as_deref(), Some("x"));

    // Both already show it, nothing is resent
    check.tick(t0 + 2 * MINUTE, &broadcaster, &registry).await.unwrap();
    assert_eq!(transport.recipients_of("x").await, vec![-2, -1]);
    assert_eq!(transport.pins.lock().await.len(), 2);
}

#[tokio::test]
async fn failed_pin_is_retried_on_next_check() {
    let transport = MockTransport::new();
    transport.revoke(-1).await;
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1, -2], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["x", "x"]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    )
    .delivery(Delivery::ReplacePinned);

    let t0 = Instant::now();
    let first = check.tick(t0, &broadcaster, &registry).await.unwrap();
    assert!(matches!(first, TickOutcome::Announced(r) if r.failed == 1));
    assert_eq!(transport.pinned(-1).await, None);

    transport.restore(-1).await;
    let second = check.tick(t0 + MINUTE, &broadcaster, &registry).await.unwrap();
    assert!(matches!(second, TickOutcome::Refreshed(r) if r.delivered == 2 && r.failed == 0));
    assert_eq!(transport.pinned(-1).await.as_deref(), Some("x"));
}

#[tokio::test]
async fn unchanged_plain_message_is_not_resent() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Scripted::values(&["x", "x"]),
        timing(MINUTE, Duration::ZERO),
        Recipients::Groups,
    );

    let t0 = Instant::now();
    check.tick(t0, &broadcaster, &registry).await.unwrap();
    registry.register(-2).unwrap();
    let second = check.tick(t0 + MINUTE, &broadcaster, &registry).await.unwrap();

    assert_eq!(second, TickOutcome::Unchanged);
    assert_eq!(transport.recipients_of("x").await, vec![-1]);
}

/// Occupancy rendering through the generic check
struct Counts(Mutex<VecDeque<u32>>);

#[async_trait]
impl Signal for Counts {
    type Value = u32;

    fn name(&self) -> &'static str {
        "counts"
    }

    async fn fetch(&self) -> Result<Option<u32>> {
        Ok(self.0.lock().unwrap().pop_front())
    }

    fn render(&self, value: &u32, previous: Option<&u32>) -> Option<String> {
        Occupancy::default().render(value, previous)
    }
}

#[tokio::test]
async fn occupancy_direction_follows_delta() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-1], None);
    let mut check = NotificationCheck::new(
        Counts(Mutex::new(VecDeque::from([2, 5, 2]))),
        timing(MINUTE, MINUTE),
        Recipients::Groups,
    )
    .quiet_baseline();

    let t0 = Instant::now();
    for i in 0..3 {
        check.tick(t0 + i * MINUTE, &broadcaster, &registry).await.unwrap();
    }

    let sent: Vec<String> = transport
        .sent_messages()
        .await
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("pojawił") && sent[0].ends_with('5'));
    assert!(sent[1].contains("opuścił") && sent[1].ends_with('2'));
}
