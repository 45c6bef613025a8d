//! Drives a single negotiated client-side `h2` connection.

use bytes::Bytes;
use futures_util::stream::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::common::exec::Exec;
use crate::error::{Error, Result};
use crate::message::{IncomingPromise, IncomingResponse, OutgoingRequest};

/// A handle to a connection's request-sending half. `h2::client::SendRequest`
/// is itself `Clone`, so every concurrent request on the same connection
/// uses its own clone and there is no dispatch queue to manage here — `h2`
/// does the multiplexing.
pub(crate) type SendRequest = h2::client::SendRequest<Bytes>;

/// Performs the `h2` client handshake over an already-connected (and, for
/// TLS endpoints, already ALPN-negotiated) transport, and spawns the task
/// that drives the connection to completion.
pub(crate) async fn handshake<T>(io: T, exec: &Exec) -> Result<SendRequest>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (send_request, connection) = h2::client::handshake(io).await.map_err(Error::new_h2)?;

    exec.execute(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "h2 client connection closed");
        }
    });

    Ok(send_request)
}

/// Sends one request to completion: waits for the connection to have a free
/// stream slot, sends the header block (plus any body already buffered on
/// `request`), attaches the resulting `SendStream` so further writes go
/// straight to the wire, and resolves once the response headers arrive.
///
/// Also returns the stream of pushes the server promised while handling
/// this request (spec.md §6, "Server push reception").
pub(crate) async fn send(
    mut send_request: SendRequest,
    request: &mut OutgoingRequest,
) -> Result<(IncomingResponse, PushPromises)> {
    futures_util::future::poll_fn(|cx| send_request.poll_ready(cx))
        .await
        .map_err(Error::new_h2)?;

    let h2_request = request.build_h2_request()?;
    let (response_future, send_stream) = send_request
        .send_request(h2_request, false)
        .map_err(Error::new_h2)?;

    request.attach(send_stream)?;

    let push_promises = PushPromises {
        inner: response_future.push_promises(),
    };

    let response = response_future.await.map_err(Error::new_h2)?;
    let response = IncomingResponse::from_h2(response)?;

    Ok((response, push_promises))
}

/// Stream of pushed resources the server promised while answering a
/// request (spec.md §6).
pub struct PushPromises {
    inner: h2::client::PushPromises,
}

impl PushPromises {
    pub async fn next(&mut self) -> Option<Result<IncomingPromise>> {
        match self.inner.next().await? {
            Ok(promise) => {
                let (request, response) = promise.into_parts();
                Some(IncomingPromise::new(request, response))
            }
            Err(e) => Some(Err(Error::new_h2(e))),
        }
    }
}
