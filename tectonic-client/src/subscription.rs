//! Pull-based event feed over a subscribed session.
//!
//! After `SUBSCRIBE <db>`, each empty command asks the server for the next
//! new row. The server answers with the row, or with the body `NONE` when
//! nothing new has arrived. The caller decides how long to wait between polls.

use crate::client::Client;
use crate::error::ClientError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tectonic_protocol::Response;
use tokio::io::{AsyncRead, AsyncWrite};

/// Default wait between polls that returned no data.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Classified reply to a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// The server has no new event.
    NoData,
    /// A new event body.
    Event(Bytes),
    /// The server reported failure, e.g. the session is not subscribed.
    Rejected(Bytes),
}

impl From<Response> for PollResult {
    fn from(response: Response) -> Self {
        if response.is_none() {
            PollResult::NoData
        } else if response.success {
            PollResult::Event(response.body)
        } else {
            PollResult::Rejected(response.body)
        }
    }
}

/// Polls a subscribed session until events arrive.
///
/// Holds a shared reference to the session. Other commands may still be sent
/// between polls; each is its own round trip.
pub struct Subscription<'a, S> {
    client: &'a Client<S>,
    poll_interval: Duration,
}

impl<'a, S> Subscription<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(client: &'a Client<S>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Polls once without waiting.
    pub async fn try_next(&self) -> Result<PollResult, ClientError> {
        self.client.poll_event().await
    }

    /// Polls until an event arrives, sleeping between empty polls.
    ///
    /// Returns `None` if the server rejects a poll.
    pub async fn next_raw(&self) -> Result<Option<Bytes>, ClientError> {
        loop {
            match self.try_next().await? {
                PollResult::Event(body) => return Ok(Some(body)),
                PollResult::Rejected(body) => {
                    tracing::warn!("Poll rejected: {}", String::from_utf8_lossy(&body));
                    return Ok(None);
                }
                PollResult::NoData => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    /// Like [`Subscription::next_raw`], with the event decoded from JSON.
    pub async fn next_event<T: DeserializeOwned>(&self) -> Result<Option<T>, ClientError> {
        match self.next_raw().await? {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }

    /// Unsubscribes and releases the session.
    pub async fn finish(self) -> Result<Response, ClientError> {
        self.client.unsubscribe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionConfig};
    use tectonic_protocol::Update;
    use tokio_test::io::Builder;

    #[test]
    fn test_classification() {
        assert_eq!(PollResult::from(Response::ok("NONE")), PollResult::NoData);
        assert_eq!(
            PollResult::from(Response::ok("{}")),
            PollResult::Event(Bytes::from_static(b"{}"))
        );
        assert_eq!(
            PollResult::from(Response::error("ERR")),
            PollResult::Rejected(Bytes::from_static(b"ERR"))
        );
    }

    #[tokio::test]
    async fn test_next_event_skips_empty_polls() {
        let event = r#"{"ts":5,"seq":9,"is_trade":true,"is_bid":false,"price":10.0,"size":0.5}"#;
        let mock = Builder::new()
            .write(b"SUBSCRIBE default\n")
            .read(&Response::ok("").encode())
            .write(b"\n")
            .read(&Response::ok("NONE").encode())
            .write(b"\n")
            .read(&Response::ok("NONE").encode())
            .write(b"\n")
            .read(&Response::ok(event).encode())
            .write(b"UNSUBSCRIBE\n")
            .read(&Response::ok("").encode())
            .build();
        let client =
            Client::from_connection(Connection::from_stream(mock, &ConnectionConfig::default()));

        let sub = client
            .subscription("default")
            .await
            .unwrap()
            .unwrap()
            .with_poll_interval(Duration::from_millis(1));
        assert!(client.is_subscribed());

        let update: Update = sub.next_event().await.unwrap().unwrap();
        assert_eq!(update.seq, 9);
        assert!(update.is_trade);

        sub.finish().await.unwrap();
        assert!(!client.is_subscribed());
    }

    #[tokio::test]
    async fn test_rejected_subscribe_yields_no_subscription() {
        let mock = Builder::new()
            .write(b"SUBSCRIBE missing\n")
            .read(&Response::error("ERR: no db named missing").encode())
            .build();
        let client =
            Client::from_connection(Connection::from_stream(mock, &ConnectionConfig::default()));

        assert!(client.subscription("missing").await.unwrap().is_none());
        assert!(!client.is_subscribed());
    }

    #[tokio::test]
    async fn test_rejected_poll_ends_feed() {
        let mock = Builder::new()
            .write(b"SUBSCRIBE default\n")
            .read(&Response::ok("").encode())
            .write(b"\n")
            .read(&Response::error("ERR: not subscribed").encode())
            .build();
        let client =
            Client::from_connection(Connection::from_stream(mock, &ConnectionConfig::default()));

        let sub = client.subscription("default").await.unwrap().unwrap();
        assert!(sub.next_raw().await.unwrap().is_none());
    }
}
