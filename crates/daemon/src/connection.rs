// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launcher connection wrapper.
//!
//! Every operation on a connection (outbound send, inbound delivery, close)
//! goes through one bounded queue drained by a single task, so frames hit
//! the wire in call order and handlers see one message at a time. The first
//! failing operation reports to [`MessageHandler::on_error`] and discards
//! the rest of the queue.

use crate::config::DEFAULT_PING_INTERVAL;
use async_trait::async_trait;
use fh_wire::{LauncherMessage, ProtocolError, WorkerMessage};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

/// Error returned by a message handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("handler for {kind} failed: {source}")]
    Handler {
        kind: &'static str,
        #[source]
        source: HandlerError,
    },
}

/// Receives the inbound messages of a connection.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one inbound message. A returned reply is written before the
    /// next queued operation runs.
    async fn handle(&self, msg: LauncherMessage, conn: &ConnectionHandle) -> Result<Option<WorkerMessage>, HandlerError>;

    /// Called at most once per connection, with the first failure.
    async fn on_error(&self, conn: &ConnectionHandle, error: &ConnectionError);
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub ping_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { ping_interval: DEFAULT_PING_INTERVAL, queue_capacity: DEFAULT_QUEUE_CAPACITY }
    }
}

/// Operation queued on a connection.
#[derive(Debug)]
pub(crate) enum Op {
    Send(WorkerMessage),
    Deliver(LauncherMessage),
    /// Inbound frame that could not be turned into a message
    Reject(ConnectionError),
    /// Peer closed the connection
    Closed,
}

/// Cheap, cloneable handle to a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    ops: mpsc::Sender<Op>,
    closing: CancellationToken,
    terminate: CancellationToken,
}

impl ConnectionHandle {
    fn new(ops: mpsc::Sender<Op>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ops,
            closing: CancellationToken::new(),
            terminate: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a message for the launcher. Returns once it is queued, not
    /// once it is written. Messages queued on a dead connection are dropped.
    pub async fn send(&self, msg: WorkerMessage) {
        if let Err(mpsc::error::SendError(op)) = self.ops.send(Op::Send(msg)).await {
            tracing::debug!(connection = self.id, ?op, "connection gone, dropping message");
        }
    }

    /// Close with a close frame once every queued send has been written.
    pub fn close(&self) {
        self.closing.cancel();
    }

    /// Drop the socket without a close frame.
    pub fn terminate(&self) {
        self.terminate.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.terminate.is_cancelled() || self.ops.is_closed()
    }

    /// Whether a graceful close has been requested.
    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }
}

/// Handle whose queued operations land in the returned receiver instead of
/// on a socket.
#[cfg(test)]
pub(crate) fn capture(capacity: usize) -> (ConnectionHandle, mpsc::Receiver<Op>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ConnectionHandle::new(tx), rx)
}

/// Start serving an accepted WebSocket. The returned task finishes once the
/// connection is closed, failed, or terminated.
pub fn spawn<S, H>(ws: WebSocketStream<S>, handler: Arc<H>, config: ConnectionConfig) -> (ConnectionHandle, JoinHandle<()>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: MessageHandler,
{
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let handle = ConnectionHandle::new(tx.clone());
    let (sink, stream) = ws.split();
    let awaiting_pong = Arc::new(AtomicBool::new(false));

    let drain = Drain {
        handle: handle.clone(),
        handler,
        sink,
        ops: rx,
        ping_interval: config.ping_interval,
        awaiting_pong: Arc::clone(&awaiting_pong),
    };
    let reader = read_loop(stream, tx, handle.terminate.clone(), awaiting_pong, handle.id);

    let task = tokio::spawn(async move {
        tokio::join!(drain.run(), reader);
    });
    (handle, task)
}

struct Drain<S, H> {
    handle: ConnectionHandle,
    handler: Arc<H>,
    sink: SplitSink<WebSocketStream<S>, Message>,
    ops: mpsc::Receiver<Op>,
    ping_interval: Duration,
    awaiting_pong: Arc<AtomicBool>,
}

impl<S, H> Drain<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: MessageHandler,
{
    async fn run(mut self) {
        let id = self.handle.id;
        let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + self.ping_interval, self.ping_interval);

        loop {
            tokio::select! {
                biased;
                _ = self.handle.terminate.cancelled() => {
                    tracing::info!(connection = id, "connection terminated");
                    break;
                }
                op = self.ops.recv() => {
                    let Some(op) = op else { break };
                    match self.apply(op).await {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::info!(connection = id, "launcher closed the connection");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(connection = id, error = %e, "connection operation failed, discarding queue");
                            self.handler.on_error(&self.handle, &e).await;
                            break;
                        }
                    }
                }
                _ = self.handle.closing.cancelled() => {
                    tracing::info!(connection = id, "closing connection");
                    if let Err(e) = self.sink.send(Message::Close(None)).await {
                        tracing::debug!(connection = id, error = %e, "failed to send close frame");
                    }
                    break;
                }
                _ = ping.tick() => {
                    if self.awaiting_pong.swap(true, Ordering::AcqRel) {
                        tracing::warn!(connection = id, "no pong since last ping, terminating connection");
                        break;
                    }
                    if let Err(e) = self.sink.send(Message::Ping(Default::default())).await {
                        let e = ConnectionError::from(e);
                        tracing::warn!(connection = id, error = %e, "failed to send ping");
                        self.handler.on_error(&self.handle, &e).await;
                        break;
                    }
                }
            }
        }

        // Stops the reader and the keepalive; anything still queued is dropped
        self.handle.terminate.cancel();
        self.ops.close();
        let discarded = std::iter::from_fn(|| self.ops.try_recv().ok()).count();
        if discarded > 0 {
            tracing::debug!(connection = id, discarded, "discarded queued operations");
        }
    }

    /// Returns `Ok(false)` when the peer has closed the connection.
    async fn apply(&mut self, op: Op) -> Result<bool, ConnectionError> {
        match op {
            Op::Send(msg) => {
                self.write(&msg).await?;
                Ok(true)
            }
            Op::Deliver(msg) => {
                let kind = msg.kind();
                tracing::debug!(connection = self.handle.id, kind, "handling launcher message");
                match self.handler.handle(msg, &self.handle).await {
                    Ok(Some(reply)) => self.write(&reply).await?,
                    Ok(None) => {}
                    Err(source) => {
                        tracing::error!(connection = self.handle.id, kind, error = %source, "message handler failed");
                        return Err(ConnectionError::Handler { kind, source });
                    }
                }
                Ok(true)
            }
            Op::Reject(e) => Err(e),
            Op::Closed => Ok(false),
        }
    }

    async fn write(&mut self, msg: &WorkerMessage) -> Result<(), ConnectionError> {
        let text = fh_wire::encode(msg)?;
        self.sink.send(Message::Text(text.into())).await?;
        tracing::debug!(connection = self.handle.id, kind = msg.kind(), "sent message");
        Ok(())
    }
}

async fn read_loop<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    ops: mpsc::Sender<Op>,
    terminate: CancellationToken,
    awaiting_pong: Arc<AtomicBool>,
    id: u64,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = terminate.cancelled() => return,
            frame = stream.next() => frame,
        };
        let op = match frame {
            Some(Ok(Message::Text(text))) => match fh_wire::decode::<LauncherMessage>(text.as_str()) {
                Ok(msg) => Op::Deliver(msg),
                Err(e) => Op::Reject(e.into()),
            },
            Some(Ok(Message::Binary(data))) => Op::Reject(ProtocolError::Binary(data.len()).into()),
            Some(Ok(Message::Pong(_))) => {
                awaiting_pong.store(false, Ordering::Release);
                continue;
            }
            Some(Ok(Message::Close(_))) | None => Op::Closed,
            Some(Ok(_)) => continue,
            Some(Err(e)) => Op::Reject(e.into()),
        };
        let last = matches!(op, Op::Closed | Op::Reject(_));
        if ops.send(op).await.is_err() || last {
            tracing::trace!(connection = id, "reader stopped");
            return;
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
