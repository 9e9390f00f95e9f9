//! WebSocket dispatch channel with offline backlog and automatic reconnect.
//!
//! State machine: `Disconnected → Connecting → Connected`, back to
//! `Connecting` when the transport drops, and `Failed` once a connect cycle
//! exhausts its attempts. Publishing never waits on a reconnect: while not
//! connected, frames go to the backlog or fail fast per [`OfflinePolicy`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::{ConnectionState, Envelope, EventSink, PublishOutcome};
use crate::config::{DispatchConfig, OfflinePolicy};
use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How often `drain` re-checks the backlog while a connect cycle runs.
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Process-wide publisher to the event bus. Cheap to clone.
#[derive(Clone)]
pub struct DispatchChannel {
    shared: Arc<Shared>,
}

struct Shared {
    config: DispatchConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectionState,
    sink: Option<WsSink>,
    backlog: VecDeque<Envelope>,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    /// Bumped on every attach/loss so stale readers can be ignored.
    generation: u64,
    /// Attempts spent by the cycle that ended in `Failed`.
    failed_attempts: u32,
    dropped: u64,
}

impl DispatchChannel {
    /// Create a disconnected channel. Nothing happens until `connect()`.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    sink: None,
                    backlog: VecDeque::new(),
                    reader: None,
                    reconnect: None,
                    generation: 0,
                    failed_attempts: 0,
                    dropped: 0,
                }),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.config.endpoint
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.inner.lock().await.state
    }

    /// Frames waiting for a connection.
    pub async fn backlog_len(&self) -> usize {
        self.shared.inner.lock().await.backlog.len()
    }

    /// Frames discarded because the backlog was full.
    pub async fn dropped_count(&self) -> u64 {
        self.shared.inner.lock().await.dropped
    }

    /// Connect with backoff, then replay the backlog in order.
    ///
    /// Cancels any reconnect already in flight. Returns
    /// `TransportError::ConnectFailed` once the attempt budget is spent,
    /// leaving the channel in `Failed`.
    pub async fn connect(&self) -> Result<(), TransportError> {
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.state == ConnectionState::Connected {
                return Ok(());
            }
            if let Some(handle) = inner.reconnect.take() {
                handle.abort();
            }
            inner.state = ConnectionState::Connecting;
        }
        info!(endpoint = %self.endpoint(), "Connecting dispatch channel");
        Shared::establish(&self.shared).await
    }

    /// Give the backlog up to `within` to reach the bus, connecting once if
    /// no connect cycle is running. Returns the number of events still queued.
    pub async fn drain(&self, within: Duration) -> usize {
        let deadline = Instant::now() + within;
        let mut dialed = false;
        loop {
            let (state, pending) = {
                let inner = self.shared.inner.lock().await;
                (inner.state, inner.backlog.len())
            };
            if pending == 0 {
                return 0;
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(pending, "Backlog not drained in time");
                return pending;
            }

            match state {
                ConnectionState::Disconnected | ConnectionState::Failed if !dialed => {
                    dialed = true;
                    match tokio::time::timeout(deadline - now, self.connect()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(pending, error = %e, "Could not reconnect to drain backlog");
                            return self.backlog_len().await;
                        }
                        Err(_) => return self.backlog_len().await,
                    }
                }
                ConnectionState::Disconnected | ConnectionState::Failed => return pending,
                ConnectionState::Connecting | ConnectionState::Connected => {
                    tokio::time::sleep(DRAIN_POLL.min(deadline - now)).await;
                }
            }
        }
    }

    /// Close the connection and stop reconnecting. The backlog is kept for
    /// the next `connect()`.
    pub async fn disconnect(&self) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(handle) = inner.reconnect.take() {
            handle.abort();
        }
        if let Some(handle) = inner.reader.take() {
            handle.abort();
        }
        inner.generation += 1;
        inner.state = ConnectionState::Disconnected;
        if let Some(mut sink) = inner.sink.take()
            && let Err(e) = sink.close().await
        {
            debug!(error = %e, "Error closing dispatch socket");
        }
        info!(
            endpoint = %self.endpoint(),
            backlog = inner.backlog.len(),
            "Dispatch channel disconnected"
        );
    }
}

#[async_trait]
impl EventSink for DispatchChannel {
    async fn publish(&self, envelope: Envelope) -> Result<PublishOutcome, TransportError> {
        let frame = serde_json::to_string(&envelope)?;
        let mut inner = self.shared.inner.lock().await;

        match inner.state {
            ConnectionState::Connected => {}
            ConnectionState::Failed => {
                return Err(TransportError::RetriesExhausted {
                    attempts: inner.failed_attempts,
                });
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                return self.shared.hold(&mut inner, envelope);
            }
        }

        match self.shared.send_frame(&mut inner, frame).await {
            Ok(()) => {
                debug!(topic = %envelope.event, event_id = %envelope.event_id, "Published event");
                Ok(PublishOutcome::Ack)
            }
            Err(e) => {
                warn!(
                    topic = %envelope.event,
                    event_id = %envelope.event_id,
                    error = %e,
                    "Publish failed; treating connection as lost"
                );
                inner.sink = None;
                inner.generation += 1;
                if let Some(handle) = inner.reader.take() {
                    handle.abort();
                }
                Shared::spawn_reconnect(&self.shared, &mut inner);
                match self.shared.config.offline_policy {
                    OfflinePolicy::FailFast => Err(e),
                    OfflinePolicy::Queue { .. } => self.shared.hold(&mut inner, envelope),
                }
            }
        }
    }
}

impl Shared {
    /// Apply the offline policy to a frame that cannot be sent now.
    fn hold(&self, inner: &mut Inner, envelope: Envelope) -> Result<PublishOutcome, TransportError> {
        let OfflinePolicy::Queue { capacity } = self.config.offline_policy else {
            debug!(topic = %envelope.event, "Channel offline; failing fast");
            return Err(TransportError::Offline);
        };
        if capacity == 0 {
            return Err(TransportError::Offline);
        }
        while inner.backlog.len() >= capacity {
            if let Some(oldest) = inner.backlog.pop_front() {
                inner.dropped += 1;
                warn!(
                    topic = %oldest.event,
                    event_id = %oldest.event_id,
                    capacity,
                    "Offline backlog full; dropped oldest event"
                );
            }
        }
        debug!(
            topic = %envelope.event,
            event_id = %envelope.event_id,
            backlog = inner.backlog.len() + 1,
            "Channel offline; queued event"
        );
        inner.backlog.push_back(envelope);
        Ok(PublishOutcome::QueuedOffline)
    }

    async fn send_frame(&self, inner: &mut Inner, frame: String) -> Result<(), TransportError> {
        let Some(sink) = inner.sink.as_mut() else {
            return Err(TransportError::SendFailed("no open connection".into()));
        };
        let timeout = self.config.send_timeout;
        match tokio::time::timeout(timeout, sink.send(Message::Text(frame.into()))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::SendFailed(e.to_string())),
            Err(_) => Err(TransportError::SendFailed(format!(
                "transport did not accept frame within {timeout:?}"
            ))),
        }
    }

    /// Run one connect cycle. The caller must have set `Connecting`.
    async fn establish(shared: &Arc<Shared>) -> Result<(), TransportError> {
        let endpoint = shared.config.endpoint.as_str();
        let mut backoff = Backoff::new(&shared.config.reconnect);

        loop {
            match shared.inner.lock().await.state {
                ConnectionState::Connecting => {}
                ConnectionState::Connected => return Ok(()),
                _ => {
                    return Err(TransportError::ConnectFailed {
                        endpoint: endpoint.to_string(),
                        attempts: backoff.attempts(),
                        reason: "cancelled by disconnect".into(),
                    });
                }
            }

            let limit = shared.config.connect_timeout;
            let reason = match tokio::time::timeout(limit, connect_async(endpoint)).await {
                Ok(Ok((stream, _response))) => match Shared::attach(shared, stream).await {
                    Ok(()) => return Ok(()),
                    Err(e) => e.to_string(),
                },
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("handshake did not complete within {limit:?}"),
            };

            match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        endpoint,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Dispatch connect attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let attempts = backoff.attempts();
                    let mut inner = shared.inner.lock().await;
                    if inner.state == ConnectionState::Connecting {
                        inner.state = ConnectionState::Failed;
                        inner.failed_attempts = attempts;
                    }
                    error!(endpoint, attempts, error = %reason, "Dispatch channel gave up connecting");
                    return Err(TransportError::ConnectFailed {
                        endpoint: endpoint.to_string(),
                        attempts,
                        reason,
                    });
                }
            }
        }
    }

    /// Install a fresh socket, replay the backlog, and start the reader.
    async fn attach(shared: &Arc<Shared>, stream: WsStream) -> Result<(), TransportError> {
        let (sink, mut incoming) = stream.split();
        let mut inner = shared.inner.lock().await;
        if inner.state != ConnectionState::Connecting {
            return Err(TransportError::SendFailed("connect cancelled".into()));
        }

        inner.sink = Some(sink);
        let mut replayed = 0usize;
        while let Some(envelope) = inner.backlog.pop_front() {
            let sent = match serde_json::to_string(&envelope) {
                Ok(frame) => shared.send_frame(&mut inner, frame).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = sent {
                inner.backlog.push_front(envelope);
                inner.sink = None;
                return Err(e);
            }
            replayed += 1;
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.state = ConnectionState::Connected;
        inner.failed_attempts = 0;

        let reader_shared = Arc::clone(shared);
        let reader = tokio::spawn(async move {
            while let Some(msg) = incoming.next().await {
                match msg {
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Event bus closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Dispatch socket error");
                        break;
                    }
                }
            }
            Shared::connection_lost(&reader_shared, generation).await;
        });
        if let Some(old) = inner.reader.replace(reader) {
            old.abort();
        }

        info!(endpoint = %shared.config.endpoint, replayed, "Dispatch channel connected");
        Ok(())
    }

    async fn connection_lost(shared: &Arc<Shared>, generation: u64) {
        let mut inner = shared.inner.lock().await;
        if inner.generation != generation || inner.state != ConnectionState::Connected {
            return;
        }
        warn!(endpoint = %shared.config.endpoint, "Dispatch connection lost; reconnecting");
        inner.sink = None;
        inner.reader = None;
        inner.generation += 1;
        Shared::spawn_reconnect(shared, &mut inner);
    }

    fn spawn_reconnect(shared: &Arc<Shared>, inner: &mut Inner) {
        inner.state = ConnectionState::Connecting;
        let task_shared = Arc::clone(shared);
        let handle = tokio::spawn(async move {
            if let Err(e) = Shared::establish(&task_shared).await {
                error!(error = %e, "Dispatch reconnect abandoned");
            }
        });
        if let Some(old) = inner.reconnect.replace(handle) {
            old.abort();
        }
    }
}
