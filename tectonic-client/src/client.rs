//! High-level session API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use crate::subscription::{PollResult, Subscription};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tectonic_protocol::{Command, Response, Update};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Outcome of a bulk insert.
#[derive(Debug, Clone)]
pub struct BulkAddResult {
    /// Rows sent between `BULKADD` and `DDAKLUB`.
    pub rows: usize,
    /// Rows the server answered with a failure flag.
    pub rejected: usize,
    /// Response to the closing `DDAKLUB`.
    pub response: Response,
}

/// A session with a tectonic server.
///
/// The session owns exactly one connection. Responses carry no request ID and
/// are matched to commands by position, so every round trip holds the
/// connection lock from the moment the command is written until its response
/// has been read in full. Multi-frame sequences (`bulk_add`, `range`) hold it
/// for the whole sequence.
pub struct Client<S = TcpStream> {
    /// `None` once the session is closed or broken.
    conn: Mutex<Option<Connection<S>>>,
    subscribed: AtomicBool,
}

impl Client<TcpStream> {
    /// Connects to the server described by `config`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let conn = Connection::connect(config).await?;
        Ok(Self::from_connection(conn))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a session over an established connection.
    pub fn from_connection(conn: Connection<S>) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            subscribed: AtomicBool::new(false),
        }
    }

    /// Returns whether the session still has a usable connection.
    pub fn is_connected(&self) -> bool {
        // A held lock means a round trip is in flight on a live connection.
        self.conn.try_lock().map(|c| c.is_some()).unwrap_or(true)
    }

    /// Returns whether the last subscribe succeeded and no unsubscribe followed.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Closes the connection. Closing an already closed session is a no-op.
    pub async fn close(&self) -> Result<(), ClientError> {
        let conn = self.conn.lock().await.take();
        self.subscribed.store(false, Ordering::SeqCst);
        match conn {
            Some(mut conn) => {
                tracing::debug!("Closing connection");
                conn.shutdown().await
            }
            None => Ok(()),
        }
    }

    // =========================================================================
    // Raw round trips
    // =========================================================================

    /// Sends raw command text and returns the server's response.
    pub async fn execute(&self, text: &str) -> Result<Response, ClientError> {
        let mut guard = self.conn.lock().await;
        round_trip(&mut *guard, text).await
    }

    /// Sends a typed command and returns the server's response.
    pub async fn execute_command(&self, cmd: &Command) -> Result<Response, ClientError> {
        tracing::debug!("Sending {}", cmd.verb());
        self.execute(&cmd.to_string()).await
    }

    // =========================================================================
    // Server queries
    // =========================================================================

    /// Returns server information.
    pub async fn info(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::Info).await
    }

    /// Pings the server.
    pub async fn ping(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::Ping).await
    }

    /// Returns the server's command help.
    pub async fn help(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::Help).await
    }

    /// Counts rows across all databases.
    pub async fn count_all(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::CountAll).await
    }

    /// Counts rows held in memory across all databases.
    pub async fn count_all_in_mem(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::CountAllInMem).await
    }

    // =========================================================================
    // Database management
    // =========================================================================

    /// Creates a database.
    pub async fn create(&self, db: &str) -> Result<Response, ClientError> {
        self.execute_command(&Command::Create(db.to_string())).await
    }

    /// Switches the database the session operates on.
    pub async fn use_db(&self, db: &str) -> Result<Response, ClientError> {
        self.execute_command(&Command::Use(db.to_string())).await
    }

    /// Clears in-memory rows of the database in use.
    pub async fn clear(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::Clear).await
    }

    /// Clears in-memory rows of every database.
    pub async fn clear_all(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::ClearAll).await
    }

    /// Flushes the database in use to disk.
    pub async fn flush(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::Flush).await
    }

    /// Flushes every database to disk.
    pub async fn flush_all(&self) -> Result<Response, ClientError> {
        self.execute_command(&Command::FlushAll).await
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    /// Inserts one row into `db`.
    pub async fn insert(&self, update: &Update, db: &str) -> Result<Response, ClientError> {
        self.execute_command(&Command::Insert {
            update: *update,
            db: db.to_string(),
        })
        .await
    }

    /// Inserts one row into the database in use.
    pub async fn add(&self, update: &Update) -> Result<Response, ClientError> {
        self.execute_command(&Command::Add(*update)).await
    }

    /// Streams rows between `BULKADD` and `DDAKLUB`, one frame per row.
    ///
    /// This is not a transaction on the client side. Each row is acknowledged
    /// on its own before the next one is sent; if the connection fails midway,
    /// the rows already acknowledged stay acknowledged and the error is
    /// returned. Whatever atomicity the bracket implies is the server's.
    pub async fn bulk_add<I>(&self, rows: I) -> Result<BulkAddResult, ClientError>
    where
        I: IntoIterator<Item = Update>,
    {
        let mut guard = self.conn.lock().await;

        let open = round_trip(&mut *guard, &Command::BulkAdd.to_string()).await?;
        if !open.success {
            tracing::warn!("BULKADD rejected: {}", String::from_utf8_lossy(&open.body));
        }

        let mut sent = 0;
        let mut rejected = 0;
        for update in rows {
            let response = round_trip(&mut *guard, &Command::BulkRow(update).to_string()).await?;
            sent += 1;
            if !response.success {
                rejected += 1;
            }
        }

        let response = round_trip(&mut *guard, &Command::BulkEnd.to_string()).await?;
        tracing::debug!("Bulk add sent {} rows ({} rejected)", sent, rejected);

        Ok(BulkAddResult {
            rows: sent,
            rejected,
            response,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetches every row of the database in use, as JSON.
    ///
    /// Returns `None` when the server reports failure.
    pub async fn get_all(&self) -> Result<Option<Value>, ClientError> {
        let response = self.execute_command(&Command::GetAllJson).await?;
        parse_json(&response)
    }

    /// Fetches the latest `n` rows of the database in use, as JSON.
    ///
    /// Returns `None` when the server has nothing to return.
    pub async fn get(&self, n: u64) -> Result<Option<Value>, ClientError> {
        let response = self.execute_command(&Command::GetJson(n)).await?;
        parse_json(&response)
    }

    /// Like [`Client::get`], decoded into rows.
    pub async fn get_updates(&self, n: u64) -> Result<Option<Vec<Update>>, ClientError> {
        let response = self.execute_command(&Command::GetJson(n)).await?;
        parse_json(&response)
    }

    /// Exports rows of `db` with timestamps in `[start, finish]` as CSV.
    ///
    /// `USE` and the export are separate frames; the session lock is held
    /// across both so no other command can slip in between. If `USE` fails,
    /// its response is returned and the export is not attempted.
    pub async fn range(&self, db: &str, start: u64, finish: u64) -> Result<Response, ClientError> {
        let mut guard = self.conn.lock().await;

        let switched = round_trip(&mut *guard, &Command::Use(db.to_string()).to_string()).await?;
        if !switched.success {
            return Ok(switched);
        }

        round_trip(
            &mut *guard,
            &Command::GetRangeCsv { start, finish }.to_string(),
        )
        .await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes the session to new rows of `db`.
    ///
    /// On success the session is marked subscribed; a failed subscribe leaves
    /// the flag unchanged. No background task is started: events are pulled
    /// with [`Client::poll`].
    pub async fn subscribe(&self, db: &str) -> Result<Response, ClientError> {
        let response = self.execute_command(&Command::Subscribe(db.to_string())).await?;
        if response.success {
            self.subscribed.store(true, Ordering::SeqCst);
            tracing::debug!("Subscribed to {}", db);
        }
        Ok(response)
    }

    /// Ends the subscription. The session is marked unsubscribed whatever the
    /// server answers.
    pub async fn unsubscribe(&self) -> Result<Response, ClientError> {
        let result = self.execute_command(&Command::Unsubscribe).await;
        self.subscribed.store(false, Ordering::SeqCst);
        result
    }

    /// Sends the empty command and returns the raw reply.
    pub async fn poll(&self) -> Result<Response, ClientError> {
        if !self.is_subscribed() {
            tracing::debug!("Polling an unsubscribed session");
        }
        self.execute_command(&Command::Poll).await
    }

    /// Polls once and classifies the reply.
    pub async fn poll_event(&self) -> Result<PollResult, ClientError> {
        Ok(PollResult::from(self.poll().await?))
    }

    /// Subscribes to `db` and returns a poller over its events.
    ///
    /// Returns `None` if the server refused the subscription.
    pub async fn subscription(&self, db: &str) -> Result<Option<Subscription<'_, S>>, ClientError> {
        let response = self.subscribe(db).await?;
        if !response.success {
            tracing::warn!(
                "SUBSCRIBE {} rejected: {}",
                db,
                String::from_utf8_lossy(&response.body)
            );
            return Ok(None);
        }
        Ok(Some(Subscription::new(self)))
    }
}

/// One round trip on a locked connection.
///
/// The connection is taken out of its slot for the duration and only put back
/// once the response has been read in full. A fatal error, or the future being
/// dropped midway, leaves the slot empty so nothing reads from a
/// desynchronized stream again.
async fn round_trip<S>(
    slot: &mut Option<Connection<S>>,
    text: &str,
) -> Result<Response, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = slot.take().ok_or(ClientError::NotConnected)?;
    match conn.request(text).await {
        Ok(response) => {
            *slot = Some(conn);
            tracing::debug!(
                "Response ok={} ({} bytes)",
                response.success,
                response.body.len()
            );
            Ok(response)
        }
        Err(e) => {
            if e.is_fatal() {
                tracing::warn!("Session broken: {}", e);
            } else {
                *slot = Some(conn);
            }
            Err(e)
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    response: &Response,
) -> Result<Option<T>, ClientError> {
    if !response.success {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&response.body)?))
}
