//! Plain-TCP, one-shot client requests, matching the original design's
//! `raw.request`/`raw.get` (spec.md §6 external interfaces). Each call opens
//! its own connection — no coalescing across calls the way [`super::ClientAgent`]
//! does for repeated requests to the same authority — and speaks `h2`
//! directly with no ALPN negotiation.

use crate::common::exec::Exec;
use crate::error::{Error, Result};
use crate::message::{IncomingResponse, OutgoingRequest};
use crate::proto::h2::client as h2client;

/// Sends one request over a fresh plain-TCP `h2` connection.
///
/// Only accepts `http:`-scheme URIs (spec.md §6, "accept only
/// `http:`-scheme URLs"): this is the plain-TCP transport, so an
/// `https:` URI here would otherwise be connected over cleartext TCP as if
/// it were plaintext `h2`.
pub async fn request(mut req: OutgoingRequest) -> Result<IncomingResponse> {
    match req.uri().scheme_str() {
        Some("http") | None => {}
        Some(_) => return Err(Error::new_user_plaintext_upgrade_unsupported()),
    }

    let authority = req
        .uri()
        .authority()
        .cloned()
        .ok_or_else(Error::new_user_plaintext_upgrade_unsupported)?;
    let host = authority.host().to_owned();
    let port = authority.port_u16().unwrap_or(80);

    let stream = tokio::net::TcpStream::connect((host.as_str(), port))
        .await
        .map_err(Error::new_io)?;
    let send_request = h2client::handshake(stream, &Exec::default()).await?;
    let (response, _pushes) = h2client::send(send_request, &mut req).await?;
    Ok(response)
}

/// Convenience wrapper for a plain `GET`.
pub async fn get(uri: http::Uri) -> Result<IncomingResponse> {
    request(OutgoingRequest::new(http::Method::GET, uri)).await
}
