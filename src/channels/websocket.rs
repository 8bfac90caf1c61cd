//! WebSocket transport for pushed job events.
//!
//! The server sends one JSON [`JobResult`] per text frame. The connection is
//! kept for the life of the process and re-established with a capped backoff.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use super::push::JobEventSource;
use crate::state_machine::JobResult;

const CHANNEL_CAPACITY: usize = 256;

/// How often to send ping frames
const PING_INTERVAL_SECS: u64 = 30;

/// Maximum reconnection delay
const MAX_RECONNECT_DELAY_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct WebSocketEventSource {
    url: String,
    tx: broadcast::Sender<JobResult>,
    reconnect_delay: Duration,
}

impl WebSocketEventSource {
    pub fn new(url: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            url: url.into(),
            tx,
            reconnect_delay: Duration::from_secs(1),
        }
    }

    /// Runs the connection loop in the background.
    pub fn spawn(&self) -> JoinHandle<()> {
        let source = self.clone();
        tokio::spawn(async move { source.run().await })
    }

    pub async fn run(&self) {
        let mut attempt: u32 = 0;
        let max_delay = Duration::from_secs(MAX_RECONNECT_DELAY_SECS);

        loop {
            match self.connect_and_stream().await {
                Ok(()) => {
                    info!(url = %self.url, "job event stream closed");
                    attempt = 0;
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    error!(url = %self.url, attempt, "job event stream error: {e}");
                }
            }

            let delay = (self.reconnect_delay * attempt.clamp(1, 10)).min(max_delay);
            debug!(?delay, "reconnecting job event stream");
            sleep(delay).await;
        }
    }

    async fn connect_and_stream(&self) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let (stream, _) = match timeout(Duration::from_secs(10), connect_async(self.url.as_str())).await {
            Ok(connected) => connected?,
            Err(_) => {
                return Err(tokio_tungstenite::tungstenite::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "websocket connect timed out",
                )));
            }
        };
        info!(url = %self.url, "connected to job event stream");

        let (mut write, mut read) = stream.split();
        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_message(&text),
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                error!("failed to send pong: {e}");
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => return Err(e),
                        _ => {}
                    }
                }
                _ = ping_interval.tick() => {
                    if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                        error!("failed to send ping: {e}");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_message(&self, text: &str) {
        match serde_json::from_str::<JobResult>(text) {
            Ok(result) => {
                debug!(job_id = %result.job_id, status = %result.status(), "job event received");
                let _ = self.tx.send(result);
            }
            Err(_) => {
                let preview: String = text.chars().take(120).collect();
                debug!("unrecognized job event: {preview}");
            }
        }
    }
}

impl JobEventSource for WebSocketEventSource {
    fn subscribe(&self) -> broadcast::Receiver<JobResult> {
        self.tx.subscribe()
    }
}
