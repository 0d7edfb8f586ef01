//! Broadcaster integration tests

use std::time::Duration;

use async_trait::async_trait;
use mariusz::channels::{ChatId, IncomingMessage, SentMessage, Transport};
use mariusz::{Broadcaster, Error, Result};

mod common;
use common::{MockTransport, registry_with};

#[tokio::test]
async fn broadcast_except_skips_home() {
    let transport = MockTransport::new();
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-100, -200, 7, 42], Some(-100));

    let report = broadcaster
        .broadcast_except(&registry, "hej", registry.home())
        .await
        .unwrap();

    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(transport.recipients_of("hej").await, vec![-200, 7, 42]);
}

#[tokio::test]
async fn failing_recipient_does_not_block_others() {
    let transport = MockTransport::new();
    transport.revoke(7).await;
    let broadcaster = Broadcaster::new(transport.clone());
    let registry = registry_with(&[-200, 7, 42], None);

    let report = broadcaster
        .broadcast_except(&registry, "hej", None)
        .await
        .unwrap();

    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(transport.recipients_of("hej").await, vec![-200, 42]);
}

#[tokio::test]
async fn try_send_swallows_recipient_errors() {
    let transport = MockTransport::new();
    transport.revoke(7).await;
    let broadcaster = Broadcaster::new(transport.clone());

    assert!(broadcaster.try_send(7, "x").await.unwrap().is_none());
    let sent = tokio_test::assert_ok!(broadcaster.try_send(8, "x").await).unwrap();
    assert_eq!(sent.chat_id, 8);
}

/// Transport whose sends never complete
struct StuckTransport;

#[async_trait]
impl Transport for StuckTransport {
    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn get_updates(&self, _offset: Option<i64>, _timeout: u64) -> Result<Vec<IncomingMessage>> {
        Ok(Vec::new())
    }

    async fn send_message(&self, _chat_id: ChatId, _text: &str) -> Result<SentMessage> {
        std::future::pending().await
    }

    async fn pin_message(&self, _chat_id: ChatId, _message_id: i64) -> Result<()> {
        Ok(())
    }

    async fn unpin_message(&self, _chat_id: ChatId, _message_id: Option<i64>) -> Result<()> {
        Ok(())
    }

    async fn pinned_message_text(&self, _chat_id: ChatId) -> Result<Option<String>> {
        Ok(None)
    }
}

#[tokio::test]
async fn slow_recipient_times_out_as_transient() {
    let broadcaster = Broadcaster::new(std::sync::Arc::new(StuckTransport))
        .with_send_timeout(Duration::from_millis(20));

    let err = broadcaster.try_send(1, "x").await.unwrap_err();
    assert!(matches!(err, Error::TransientNetwork { .. }));

    let report = broadcaster.broadcast(&[1, 2], "x").await;
    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed, 2);
}
