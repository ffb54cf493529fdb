//! WebSocket server: accept loop, per-connection sessions, and the event loop.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections and assigning each a [`ConnectionId`].
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Forwarding every session event into one `mpsc` channel.
//! 5. Running a single event loop that owns the [`Relay`] and handles those
//!    events one at a time.
//! 6. Shutting everything down when [`Server::stop`] is called.
//!
//! # Task layout
//!
//! ```text
//!  accept loop ──spawn──► session reader (one per client) ─┐
//!                         session writer (one per client)  │ RelayEvent
//!  Server::broadcast ──────────────────────────────────────┤
//!                                                          ▼
//!                                              event loop (owns Relay)
//! ```
//!
//! The event loop is the only place the registry is touched, so no lock
//! guards it.  Each reader forwards its frames in arrival order and sends its
//! `Closed` event last, which gives per-connection FIFO dispatch and
//! guarantees no frame is dispatched after the close is observed.
//!
//! Sends are fire-and-forget: the relay pushes text onto an unbounded
//! per-connection queue and the writer task drains it into the socket.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::application::{BroadcastReport, Connection, HostSink, Relay, RelayError, SendError};
use crate::domain::{ConnectionId, RelayConfig};

/// How often the accept loop re-checks the running flag while idle.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Capacity of the queue feeding the event loop.
const EVENT_QUEUE_DEPTH: usize = 256;

// ── Events ────────────────────────────────────────────────────────────────────

/// Everything the event loop reacts to.
enum RelayEvent {
    Opened {
        id: ConnectionId,
        connection: WsConnection,
    },
    Frame {
        id: ConnectionId,
        payload: Vec<u8>,
    },
    Closed {
        id: ConnectionId,
    },
    Broadcast {
        codes: Vec<String>,
        reply: oneshot::Sender<Result<BroadcastReport, RelayError>>,
    },
    ClientCount {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

// ── WebSocket connection handle ───────────────────────────────────────────────

enum Outgoing {
    Frame(String),
    Close,
}

/// The relay's handle to one WebSocket session.
///
/// Holds the sending end of the session's writer queue.  Dropping it ends the
/// writer task, which closes the socket.
pub struct WsConnection {
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl Connection for WsConnection {
    fn send(&self, frame: &str) -> Result<(), SendError> {
        self.outgoing
            .send(Outgoing::Frame(frame.to_owned()))
            .map_err(|_| SendError::Closed)
    }

    fn close(&self) {
        // A writer that is already gone has nothing left to close.
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// A running relay server.
///
/// Created by [`Server::start`], shut down by [`Server::stop`].  Dropping a
/// `Server` without stopping it also stops accepting and tears down the event
/// loop, but without closing client sockets gracefully.
pub struct Server {
    local_addr: SocketAddr,
    events: mpsc::Sender<RelayEvent>,
    running: Arc<AtomicBool>,
    accept_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
}

impl Server {
    /// Binds the listener and starts the accept loop and event loop.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bind`] if the address cannot be bound (e.g. the
    /// port is already in use).
    pub async fn start(config: &RelayConfig, host: Arc<dyn HostSink>) -> Result<Self, RelayError> {
        let bind_error = |source| RelayError::Bind {
            addr: config.bind_addr,
            source,
        };
        // Bind before spawning anything, so a busy port is reported to the
        // caller instead of surfacing later inside a task.
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(bind_error)?;
        // With port 0 the OS picks the port; ask the listener which one.
        let local_addr = listener.local_addr().map_err(bind_error)?;

        info!("relay listening on {local_addr}");
        host.debug(&format!(
            "WebSocket Server listening on port {}",
            local_addr.port()
        ));

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let running = Arc::new(AtomicBool::new(true));

        // The event loop owns the relay.  Every other task only holds a
        // sender into `events_rx`.
        let event_task = tokio::spawn(run_event_loop(Relay::new(host), events_rx));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            events_tx.clone(),
            Arc::clone(&running),
        ));

        Ok(Self {
            local_addr,
            events: events_tx,
            running,
            accept_task,
            event_task,
        })
    }

    /// The address actually bound (useful when the configured port was `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends `codes` as one `run_luas` frame to every connected client.
    ///
    /// # Errors
    ///
    /// [`RelayError::NoClients`] or [`RelayError::Encode`] from the relay, or
    /// [`RelayError::NotRunning`] if the event loop has stopped.
    pub async fn broadcast(&self, codes: Vec<String>) -> Result<BroadcastReport, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(RelayEvent::Broadcast { codes, reply })
            .await
            .map_err(|_| RelayError::NotRunning)?;
        rx.await.map_err(|_| RelayError::NotRunning)?
    }

    /// Number of open connections, identified or not.
    ///
    /// # Errors
    ///
    /// [`RelayError::NotRunning`] if the event loop has stopped.
    pub async fn client_count(&self) -> Result<usize, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(RelayEvent::ClientCount { reply })
            .await
            .map_err(|_| RelayError::NotRunning)?;
        rx.await.map_err(|_| RelayError::NotRunning)
    }

    /// Closes every client connection, then unbinds the listener.
    ///
    /// Client closes are not awaited.  Returns once the listener is dropped.
    pub async fn stop(mut self) {
        // Step 1: let the event loop close every client and exit.  Waiting for
        // its reply guarantees the registry is empty before the listener goes.
        let (reply, rx) = oneshot::channel();
        if self.events.send(RelayEvent::Shutdown { reply }).await.is_ok() {
            if let Ok(closed) = rx.await {
                info!("closed {closed} client connection(s)");
            }
        }

        // Step 2: stop accepting.  The accept loop notices the flag within one
        // poll interval and drops the listener, which frees the port.
        self.running.store(false, Ordering::Relaxed);
        if let Err(e) = (&mut self.accept_task).await {
            error!("accept loop ended abnormally: {e}");
        }
        if let Err(e) = (&mut self.event_task).await {
            error!("event loop ended abnormally: {e}");
        }
        info!("relay on {} stopped", self.local_addr);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.event_task.abort();
    }
}

// ── Event loop ────────────────────────────────────────────────────────────────

/// Applies events to the relay, one at a time, until shutdown.
async fn run_event_loop(mut relay: Relay<WsConnection>, mut events: mpsc::Receiver<RelayEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RelayEvent::Opened { id, connection } => relay.connection_opened(id, connection),
            RelayEvent::Frame { id, payload } => {
                if let Err(e) = relay.handle_frame(id, &payload) {
                    warn!("connection {id}: dropping malformed frame: {e}");
                }
            }
            RelayEvent::Closed { id } => {
                relay.connection_closed(id);
            }
            RelayEvent::Broadcast { codes, reply } => {
                // The requester may have given up; the broadcast still happened.
                let _ = reply.send(relay.broadcast(&codes));
            }
            RelayEvent::ClientCount { reply } => {
                let _ = reply.send(relay.client_count());
            }
            RelayEvent::Shutdown { reply } => {
                let _ = reply.send(relay.close_all());
                // Leaving the loop drops the receiver.  Sessions still running
                // then fail to send their `Closed` event and exit quietly.
                break;
            }
        }
    }
    debug!("relay event loop finished");
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Accepts connections until `running` is cleared, then drops the listener.
async fn accept_loop(
    listener: TcpListener,
    events: mpsc::Sender<RelayEvent>,
    running: Arc<AtomicBool>,
) {
    let mut next_id: u64 = 0;

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout on `accept()` lets the loop notice the flag even
        // when no client is connecting.
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                next_id += 1;
                let id = ConnectionId(next_id);
                debug!("connection {id}: accepted from {peer_addr}");
                tokio::spawn(handle_client_session(stream, peer_addr, id, events.clone()));
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g. too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout: nobody connected in the last poll interval.
                // Loop back to check the `running` flag.
            }
        }
    }
}

// ── Per-connection session ────────────────────────────────────────────────────

/// Top-level handler for one client session.  Logs the outcome.
async fn handle_client_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    id: ConnectionId,
    events: mpsc::Sender<RelayEvent>,
) {
    match run_session(raw_stream, peer_addr, id, events).await {
        Ok(()) => debug!("session {id} ({peer_addr}) closed normally"),
        Err(e) => warn!("session {id} ({peer_addr}) closed with error: {e:#}"),
    }
}

/// Runs one session: handshake, register, read until close, unregister.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.  The connection never
/// reaches the registry in that case.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    id: ConnectionId,
    events: mpsc::Sender<RelayEvent>,
) -> anyhow::Result<()> {
    // ── Step 1: Complete the WebSocket handshake ───────────────────────────────
    //
    // Until this succeeds the connection is not a client: a failed handshake
    // never reaches the registry and produces no host output.
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // ── Step 2: Split into reader and writer ──────────────────────────────────
    //
    // The writer task owns the sink.  The relay only ever sees the queue in
    // front of it, so a broadcast never waits on a slow socket.
    let (ws_tx, mut ws_rx) = ws_stream.split();
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_frames(id, ws_tx, outgoing_rx));

    // ── Step 3: Register with the relay ───────────────────────────────────────
    //
    // `Opened` goes out before the first frame is read.  The events channel is
    // FIFO, so the relay always knows the connection by the time its first
    // frame (usually `connect`) is dispatched.
    let connection = WsConnection {
        outgoing: outgoing_tx,
    };
    if events
        .send(RelayEvent::Opened { id, connection })
        .await
        .is_err()
    {
        // The relay is shutting down; dropping the connection closes the writer.
        debug!("session {id}: relay stopped before registration");
        return Ok(());
    }

    // ── Step 4: Forward frames until the client goes away ─────────────────────
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("session {id}: WebSocket closed");
                break;
            }
            Some(Err(e)) => {
                warn!("session {id}: WebSocket error: {e}");
                break;
            }
            None => {
                debug!("session {id}: stream ended");
                break;
            }
        };

        let payload = match ws_msg {
            WsMessage::Text(text) => text.into_bytes(),
            WsMessage::Binary(data) => data,
            WsMessage::Close(_) => {
                debug!("session {id}: Close frame received");
                break;
            }
            // Pong replies are queued by tungstenite itself.
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
        };

        if events
            .send(RelayEvent::Frame { id, payload })
            .await
            .is_err()
        {
            break;
        }
    }

    // ── Step 5: Unregister ────────────────────────────────────────────────────
    //
    // Sent last on the same channel as the frames, so no frame from this
    // connection can be dispatched after its close.
    let _ = events.send(RelayEvent::Closed { id }).await;
    Ok(())
}

/// Drains the connection's queue into the socket until closed.
async fn write_frames(
    id: ConnectionId,
    mut sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(item) = outgoing.recv().await {
        match item {
            Outgoing::Frame(text) => {
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    debug!("session {id}: send failed: {e}");
                    break;
                }
            }
            Outgoing::Close => break,
        }
    }
    // Reached on an explicit close, on a failed send, or when the relay drops
    // the `WsConnection` (queue closed).  `close()` sends a Close frame and
    // flushes it; on a socket that is already gone it just returns an error.
    let _ = sink.close().await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
