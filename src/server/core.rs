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

use super::builder::ServerBuilder;

/// A bound, listening HTTP/2 server (spec.md §4.4).
///
/// Negotiates ALPN per accepted TCP connection unless built with
/// [`ServerBuilder::plain`]. `ServerHandle::close` is graceful: accepting
/// stops and every in-flight connection is allowed to finish its open
/// streams, matching `h2::server::Connection::graceful_shutdown` (spec.md
/// Open Question — resolved as graceful).
pub struct ServerCore {
    builder: ServerBuilder,
    exec: Exec,
}

impl ServerCore {
    pub fn new(builder: ServerBuilder) -> Result<Self> {
        builder.validate()?;
        Ok(ServerCore {
            builder,
            exec: Exec::default(),
        })
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

    /// Binds `addr` and starts accepting HTTP/2 connections, dispatching
    /// each stream to `handler`.
    pub async fn listen<F, Fut>(&self, addr: SocketAddr, handler: F) -> Result<ServerHandle>
    where
        F: Fn(IncomingRequest, Pusher) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<OutgoingResponse>> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await.map_err(Error::new_io)?;
        let local_addr = listener.local_addr().map_err(Error::new_io)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tls_acceptor = if self.builder.is_plain() {
            None
        } else {
            Some(tokio_rustls::TlsAcceptor::from(self.builder.tls_config()?))
        };

        let exec = self.exec.clone();
        let h2_builder = self.builder.h2_builder();
        #[cfg(feature = "fallback-http1")]
        let fallback = self.builder.http1_handler();

        exec.execute(accept_loop(
            listener,
            tls_acceptor,
            h2_builder,
            exec.clone(),
            handler,
            shutdown_rx,
            #[cfg(feature = "fallback-http1")]
            fallback,
        ));

        Ok(ServerHandle {
            local_addr,
            shutdown: shutdown_tx,
        })
    }
}

/// A running listener returned by [`ServerCore::listen`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections and lets every in-flight connection
    /// finish its open streams before closing.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn accept_loop<F, Fut>(
    listener: TcpListener,
    tls_acceptor: Option<tokio_rustls::TlsAcceptor>,
    h2_builder: h2::server::Builder,
    exec: Exec,
    handler: F,
    mut shutdown_rx: watch::Receiver<bool>,
    #[cfg(feature = "fallback-http1")] fallback: Option<super::builder::Http1Handler>,
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
                let h2_builder2 = h2_builder.clone();
                let shutdown_rx2 = shutdown_rx.clone();
                let tls_acceptor2 = tls_acceptor.clone();
                #[cfg(feature = "fallback-http1")]
                let fallback2 = fallback.clone();

                exec.execute(async move {
                    match tls_acceptor2 {
                        Some(acceptor) => match acceptor.accept(socket).await {
                            Ok(stream) => {
                                // spec.md §4.4: only an exact `h2` ALPN match with SNI
                                // present takes the HTTP/2 path; everything else
                                // (chose `http/1.1`, or no SNI at all) falls back.
                                let (_, conn) = stream.get_ref();
                                let negotiated_h2 = conn.alpn_protocol() == Some(b"h2");
                                let sni_present = conn.sni_hostname().is_some();

                                if negotiated_h2 && sni_present {
                                    run_connection(stream, h2_builder2, exec2, handler, shutdown_rx2).await
                                } else {
                                    #[cfg(feature = "fallback-http1")]
                                    match fallback2 {
                                        Some(h1) => run_http1_fallback(stream, h1).await,
                                        None => tracing::debug!(
                                            "ALPN did not negotiate h2 and no fallback_http1 handler is configured; closing connection"
                                        ),
                                    }
                                    #[cfg(not(feature = "fallback-http1"))]
                                    tracing::debug!("ALPN did not negotiate h2; closing connection");
                                }
                            }
                            Err(e) => tracing::debug!(error = %e, "TLS handshake failed"),
                        },
                        None => run_connection(socket, h2_builder2, exec2, handler, shutdown_rx2).await,
                    }
                });
            }
        }
    }
}

#[cfg(feature = "fallback-http1")]
async fn run_http1_fallback<IO>(io: IO, handler: super::builder::Http1Handler)
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |req| handler(req));
    if let Err(e) = hyper::server::conn::Http::new().serve_connection(io, service).await {
        tracing::debug!(error = %e, "http/1.1 fallback connection closed");
    }
}

async fn run_connection<IO, F, Fut>(
    io: IO,
    h2_builder: h2::server::Builder,
    exec: Exec,
    handler: F,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: Fn(IncomingRequest, Pusher) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<OutgoingResponse>> + Send + 'static,
{
    let mut connection = match server::handshake(io, h2_builder).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::debug!(error = %e, "h2 handshake failed");
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
                                tracing::debug!(error = %e, "h2 stream ended with an error");
                            }
                        });
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "h2 connection error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
