// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launcher-facing WebSocket listener.
//!
//! Admits one connection at a time. Each handshake runs on its own task, so
//! a peer that stalls mid-handshake never holds up the next launcher. A
//! launcher that connects while another connection is live gets a policy
//! close frame right after the handshake. Reconnects are accepted once the
//! previous connection is gone.

use crate::connection::{self, ConnectionConfig, ConnectionHandle, MessageHandler};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner of the single connection slot.
#[async_trait]
pub trait ConnectionOwner: MessageHandler {
    fn is_connected(&self) -> bool;

    fn attach(&self, conn: ConnectionHandle);

    /// Release the slot if `id` still holds it.
    fn detach(&self, id: u64);

    /// Resolves once the process may exit and no connection is live.
    async fn wait_for_exit(&self);
}

pub struct Listener {
    tcp: TcpListener,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(addr).await?;
        Ok(Self { tcp })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Accept connections until the owner allows exit.
    pub async fn run<H: ConnectionOwner>(self, owner: Arc<H>, config: ConnectionConfig) {
        if let Ok(addr) = self.tcp.local_addr() {
            info!(%addr, "waiting for launcher");
        }
        let admission = Arc::new(Mutex::new(()));
        loop {
            tokio::select! {
                _ = owner.wait_for_exit() => {
                    info!("launcher released the worker, stopping listener");
                    return;
                }
                accepted = self.tcp.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "accepted connection");
                        tokio::spawn(admit(stream, peer, Arc::clone(&owner), config, Arc::clone(&admission)));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
    }
}

/// Handshake one accepted socket, then claim the slot or reject.
///
/// The slot check and `attach` happen under `admission`, so two handshakes
/// finishing together cannot both take the slot.
async fn admit<H: ConnectionOwner>(
    stream: TcpStream,
    peer: SocketAddr,
    owner: Arc<H>,
    config: ConnectionConfig,
    admission: Arc<Mutex<()>>,
) {
    let ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            warn!(%peer, error = %e, "websocket handshake failed");
            return;
        }
        Err(_) => {
            warn!(%peer, "websocket handshake timed out");
            return;
        }
    };

    let claimed = {
        let _admission = admission.lock();
        if owner.is_connected() {
            Err(ws)
        } else {
            let (handle, task) = connection::spawn(ws, Arc::clone(&owner), config);
            let id = handle.id();
            owner.attach(handle);
            Ok((id, task))
        }
    };
    let (id, task) = match claimed {
        Ok(claimed) => claimed,
        Err(ws) => {
            warn!(%peer, "launcher already connected, rejecting connection");
            reject(ws).await;
            return;
        }
    };

    info!(%peer, connection = id, "launcher connected");
    if let Err(e) = task.await {
        warn!(connection = id, error = %e, "connection task failed");
    }
    info!(connection = id, "launcher disconnected");
    owner.detach(id);
}

async fn reject(mut ws: WebSocketStream<TcpStream>) {
    let frame = CloseFrame { code: CloseCode::Policy, reason: "another launcher connection is live".into() };
    if let Err(e) = ws.close(Some(frame)).await {
        debug!(error = %e, "failed to close rejected connection");
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
