//! Plain-TCP server surface, matching the original design's `raw.createServer`
//! (spec.md §6 external interfaces): HTTP/2 in the clear, no ALPN
//! negotiation, no HTTP/1.1 fallback. Unlike [`super::ServerCore`], this
//! never touches `rustls`, so it's available regardless of the `tls`
//! feature.

use std::future::Future;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::common::exec::{BoxSendFuture, Exec};
use crate::error::{Error, Result};
use crate::message::{IncomingRequest, OutgoingResponse};
use crate::proto::h2::server::{self, Pusher};
use crate::rt::Executor;

/// A bound, listening plain-TCP HTTP/2 server.
pub struct RawServerCore {
    exec: Exec,
}

impl Default for RawServerCore {
    fn default() -> Self {
        RawServerCore { exec: Exec::default() }
    }
}

impl RawServerCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs this server's background connection/stream tasks on `exec`
    /// instead of `tokio::spawn`.
    pub fn with_executor<E>(mut self, exec: E) -> Self
    where
        E: Executor<BoxSendFuture> + Send + Sync + 'static,
    {
        self.exec = Exec::Executor(std::sync::Arc::new(exec));
        self
    }

    /// Binds `addr` and starts accepting plain-TCP HTTP/2 connections.
    pub async fn listen<F, Fut>(&self, addr: SocketAddr, handler: F) -> Result<RawServerHandle>
    where
        F: Fn(IncomingRequest, Pusher) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<OutgoingResponse>> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await.map_err(Error::new_io)?;
        let local_addr = listener.local_addr().map_err(Error::new_io)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let exec = self.exec.clone();
        exec.execute(accept_loop(listener, exec.clone(), handler, shutdown_rx));

        Ok(RawServerHandle {
            local_addr,
            shutdown: shutdown_tx,
        })
    }
}

/// A running listener returned by [`RawServerCore::listen`]. `close` is
/// graceful, matching [`super::ServerHandle::close`].
pub struct RawServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl RawServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn accept_loop<F, Fut>(
    listener: TcpListener,
    exec: Exec,
    handler: F,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    F: Fn(IncomingRequest, Pusher) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<OutgoingResponse>> + Send + 'static,
{
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (socket, _peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::debug!(error = %e, "accept failed");
                        continue;
                    }
                };

                let handler = handler.clone();
                let exec2 = exec.clone();
                let shutdown_rx2 = shutdown_rx.clone();
                exec.execute(run_connection(socket, exec2, handler, shutdown_rx2));
            }
        }
    }
}

async fn run_connection<IO, F, Fut>(
    io: IO,
    exec: Exec,
    handler: F,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: Fn(IncomingRequest, Pusher) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<OutgoingResponse>> + Send + 'static,
{
    let mut connection = match server::handshake(io, h2::server::Builder::new()).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::debug!(error = %e, "raw h2 handshake failed");
            return;
        }
    };

    if *shutdown_rx.borrow() {
        connection.graceful_shutdown();
    }

    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_ok() && *shutdown_rx.borrow() {
                    connection.graceful_shutdown();
                }
            }
            next = connection.accept() => {
                match next {
                    Some(Ok((request, respond))) => {
                        let handler = handler.clone();
                        exec.execute(async move {
                            if let Err(e) = server::handle_one(request, respond, handler).await {
                                tracing::debug!(error = %e, "raw h2 stream ended with an error");
                            }
                        });
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "raw h2 connection error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
