//! Drives a single accepted server-side `h2` connection: accepts streams,
//! validates and wraps each one into an `IncomingRequest`, hands it to a
//! handler, and sends back whatever `OutgoingResponse` the handler builds.

use std::future::Future;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::common::exec::Exec;
use crate::error::{Error, Result};
use crate::message::{IncomingRequest, OutgoingResponse};

/// Lets a handler push extra resources alongside the response it is
/// building for the triggering request (spec.md §6, "Server push
/// origination"). Pushing is a one-shot convenience: the pushed bytes must
/// already be available, which covers the common case of pushing a static
/// sub-resource discovered while handling the main request.
pub struct Pusher {
    send_response: h2::server::SendResponse<Bytes>,
}

impl Pusher {
    pub async fn push(&mut self, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Result<()> {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }
        let promised = builder
            .body(())
            .map_err(|e| Error::new_protocol(h2::Reason::PROTOCOL_ERROR).with(e))?;

        let mut pushed = self
            .send_response
            .push_request(promised)
            .map_err(Error::new_h2)?;

        let mut response = OutgoingResponse::new(http::StatusCode::OK);
        response.message_mut().write(body)?;
        response.message_mut().end(None)?;

        let h2_response = response.build_h2_response()?;
        let send_stream = pushed
            .send_response(h2_response, false)
            .map_err(Error::new_h2)?;
        response.attach(send_stream)
    }
}

/// Performs the `h2` server handshake over an accepted (and, for TLS
/// listeners, already ALPN-negotiated) connection.
pub(crate) async fn handshake<IO>(
    io: IO,
    builder: h2::server::Builder,
) -> Result<h2::server::Connection<IO, Bytes>>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    builder.handshake::<IO, Bytes>(io).await.map_err(Error::new_h2)
}

/// Runs the accept loop for one connection until the peer (or we) close it.
/// Used directly by tests and by anything that doesn't need graceful
/// shutdown; `ServerCore` drives its connections itself so it can race
/// `accept()` against a shutdown signal (spec.md Open Question — `close()`
/// is graceful).
pub(crate) async fn serve<IO, F, Fut>(
    io: IO,
    builder: h2::server::Builder,
    exec: Exec,
    handler: F,
) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: Fn(IncomingRequest, Pusher) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<OutgoingResponse>> + Send + 'static,
{
    let mut connection = handshake(io, builder).await?;

    while let Some(result) = connection.accept().await {
        let (request, respond) = result.map_err(Error::new_h2)?;
        let handler = handler.clone();

        exec.execute(async move {
            if let Err(e) = handle_one(request, respond, handler).await {
                tracing::debug!(error = %e, "h2 stream ended with an error");
            }
        });
    }

    Ok(())
}

pub(crate) async fn handle_one<F, Fut>(
    request: http::Request<h2::RecvStream>,
    mut respond: h2::server::SendResponse<Bytes>,
    handler: F,
) -> Result<()>
where
    F: Fn(IncomingRequest, Pusher) -> Fut,
    Fut: Future<Output = Result<OutgoingResponse>>,
{
    let request = match IncomingRequest::from_h2(request) {
        Ok(request) => request,
        Err(e) => {
            let reason = e.protocol_reason().unwrap_or(h2::Reason::PROTOCOL_ERROR);
            let _ = respond.send_reset(reason);
            return Err(e);
        }
    };

    let pusher = Pusher {
        send_response: respond.clone(),
    };

    let mut response = handler(request, pusher).await?;
    // A handler that forgot to call `end()` still gets a well-formed
    // (empty-body) response rather than a connection that hangs. Skip this
    // when the handler already ended the message itself, or its trailers
    // (if any) would be silently dropped.
    if !response.message().is_ended() {
        let _ = response.message_mut().end(None);
    }

    let h2_response = response.build_h2_response()?;
    let send_stream = respond
        .send_response(h2_response, false)
        .map_err(Error::new_h2)?;
    response.attach(send_stream)
}
