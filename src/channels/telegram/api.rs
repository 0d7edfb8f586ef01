//! Raw Telegram Bot API calls

use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::retry::classify;
use super::types::*;
use super::{CALL_TIMEOUT, POLL_GRACE};
use crate::{Error, Result};

impl super::TelegramTransport {
    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}{}/{method}", self.token.expose_secret())
    }

    /// POST a Bot API method and unwrap the `result` field
    ///
    /// # Errors
    ///
    /// Returns a classified error (transient, revoked, rejected, fatal)
    async fn call<Req, Resp>(
        &self,
        method: &str,
        chat_id: Option<i64>,
        request: &Req,
        timeout: std::time::Duration,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::transient(format!("Telegram {method} error: {}", e.without_url())))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transient(format!("Telegram {method} read error: {}", e.without_url())))?;

        if !(200..300).contains(&status) {
            return Err(classify(method, chat_id, status, &body));
        }

        let parsed: TelegramResponse<Resp> = serde_json::from_str(&body)?;
        if !parsed.ok {
            let code = parsed.error_code.unwrap_or(status);
            let description = parsed.description.unwrap_or_default();
            if let Some(secs) = parsed.parameters.and_then(|p| p.retry_after) {
                return Err(Error::TransientNetwork {
                    message: format!("Telegram {method}: {description}"),
                    retry_after: Some(std::time::Duration::from_secs(secs)),
                });
            }
            return Err(classify(method, chat_id, code, &description));
        }

        parsed
            .result
            .ok_or_else(|| Error::Fatal(format!("Telegram {method}: response without result")))
    }

    /// Long-poll for updates
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub(super) async fn fetch_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message".to_string()],
        };

        let timeout = std::time::Duration::from_secs(timeout_secs) + POLL_GRACE;
        let updates: Vec<Update> = self.call("getUpdates", None, &request, timeout).await?;

        tracing::trace!(?offset, count = updates.len(), "Telegram getUpdates");
        Ok(updates)
    }

    /// Send a plain-text message and return its message id
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub(super) async fn send_text(&self, chat_id: i64, text: &str) -> Result<i64> {
        let request = SendMessageRequest {
            chat_id,
            text,
        };

        let sent: Message = self
            .call("sendMessage", Some(chat_id), &request, CALL_TIMEOUT)
            .await?;
        Ok(sent.message_id)
    }

    /// Pin a message in a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub(super) async fn pin_chat_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let request = PinChatMessageRequest {
            chat_id,
            message_id,
            disable_notification: false,
        };

        let _: bool = self
            .call("pinChatMessage", Some(chat_id), &request, CALL_TIMEOUT)
            .await?;
        tracing::debug!(chat_id, message_id, "Telegram message pinned");
        Ok(())
    }

    /// Unpin a message (or the most recent pin when `message_id` is `None`)
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub(super) async fn unpin_chat_message(
        &self,
        chat_id: i64,
        message_id: Option<i64>,
    ) -> Result<()> {
        let request = UnpinChatMessageRequest {
            chat_id,
            message_id,
        };

        let _: bool = self
            .call("unpinChatMessage", Some(chat_id), &request, CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Fetch chat info, including the pinned message
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub(super) async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo> {
        self.call("getChat", Some(chat_id), &GetChatRequest { chat_id }, CALL_TIMEOUT)
            .await
    }
}
