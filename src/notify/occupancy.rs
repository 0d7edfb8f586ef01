//! Voice-server occupancy changes
//!
//! Pings a Mumble server over UDP and reports when the number of connected
//! users goes up or down.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::Signal;
use crate::{Error, Result};

pub const DEFAULT_HOST: &str = "hs-ldz.pl";
pub const DEFAULT_PORT: u16 = 64738;

/// Clients that stay connected around the clock and are not counted
pub const RESIDENT_CLIENTS: u32 = 1;

/// How long to wait for a ping reply
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Request type 0 followed by an 8-byte identifier echoed back by the server
const PING: [u8; 12] = *b"\0\0\0\0abcdefgh";

/// version(4) + ident(8) + users(4) + max users(4) + bandwidth(4)
const REPLY_LEN: usize = 24;

/// Decode the user count from a ping reply
///
/// # Errors
///
/// Returns `MalformedFeed` for short replies or a mismatched identifier
pub fn parse_reply(reply: &[u8]) -> Result<u32> {
    if reply.len() < REPLY_LEN {
        return Err(Error::MalformedFeed(format!(
            "mumble reply too short: {} bytes",
            reply.len()
        )));
    }
    if reply[4..12] != PING[4..12] {
        return Err(Error::MalformedFeed("mumble reply ident mismatch".to_string()));
    }

    let mut users = [0u8; 4];
    users.copy_from_slice(&reply[12..16]);
    Ok(u32::from_be_bytes(users))
}

/// Announcement for a change from `previous` to `current`
#[must_use]
pub fn render_change(current: u32, previous: u32) -> Option<String> {
    match current.cmp(&previous) {
        std::cmp::Ordering::Greater => Some(format!(
            "Ktoś się pojawił na Mumble. Liczba userów: {current}"
        )),
        std::cmp::Ordering::Less => Some(format!("Ktoś opuścił Mumble. Liczba userów: {current}")),
        std::cmp::Ordering::Equal => None,
    }
}

/// Mumble occupancy watcher
#[derive(Debug, Clone)]
pub struct Occupancy {
    host: String,
    port: u16,
    timeout: Duration,
    resident: u32,
}

impl Occupancy {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: PING_TIMEOUT,
            resident: RESIDENT_CLIENTS,
        }
    }

    /// Override how many always-connected clients are left out of the count
    #[must_use]
    pub const fn with_resident_clients(mut self, resident: u32) -> Self {
        self.resident = resident;
        self
    }

    /// Override the reply timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ping the server once and return the number of connected users
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` if the server cannot be reached in time
    pub async fn ping(&self) -> Result<u32> {
        let unavailable = |e: std::io::Error| Error::SourceUnavailable(format!("mumble ping: {e}"));

        let socket = UdpSocket::bind(("0.0.0.0", 0)).await.map_err(unavailable)?;
        socket
            .connect((self.host.as_str(), self.port))
            .await
            .map_err(unavailable)?;
        socket.send(&PING).await.map_err(unavailable)?;

        let mut buf = [0u8; 64];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::SourceUnavailable("mumble ping timed out".to_string()))?
            .map_err(unavailable)?;

        parse_reply(&buf[..len])
    }
}

impl Default for Occupancy {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

#[async_trait]
impl Signal for Occupancy {
    type Value = u32;

    fn name(&self) -> &'static str {
        "occupancy"
    }

    async fn fetch(&self) -> Result<Option<u32>> {
        let users = self.ping().await?;
        Ok(Some(users.saturating_sub(self.resident)))
    }

    fn render(&self, value: &u32, previous: Option<&u32>) -> Option<String> {
        previous.and_then(|&previous| render_change(*value, previous))
    }
}
