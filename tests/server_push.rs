//! Server push, end to end: a handler pushes a sub-resource alongside its
//! response, and the client observes it through `request_with_pushes`.

#![cfg(all(feature = "client", feature = "server"))]

use std::net::SocketAddr;

use bytes::Bytes;

use h2bridge::client::{ClientAgent, Response};
use h2bridge::message::{IncomingRequest, OutgoingRequest, OutgoingResponse};
use h2bridge::server::{ServerBuilder, ServerCore};
use h2bridge::{HeaderMap, Method, StatusCode};

#[tokio::test]
async fn client_receives_a_pushed_resource() {
    let core = ServerCore::new(ServerBuilder::new().plain(true)).expect("valid server config");

    let handle = core
        .listen(
            "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            |_req: IncomingRequest, mut pusher| async move {
                pusher
                    .push(
                        Method::GET,
                        "/style.css".parse().unwrap(),
                        HeaderMap::new(),
                        Bytes::from_static(b"body { color: red }"),
                    )
                    .await?;

                let mut response = OutgoingResponse::new(StatusCode::OK);
                response.message_mut().write(Bytes::from_static(b"<html></html>"))?;
                response.message_mut().end(None)?;
                Ok(response)
            },
        )
        .await
        .expect("listen");

    let uri: http::Uri = format!("http://{}/index.html", handle.local_addr()).parse().unwrap();

    let agent = ClientAgent::new();
    let (response, pushes) = agent
        .request_with_pushes(OutgoingRequest::new(Method::GET, uri))
        .await
        .expect("request");

    match response {
        Response::H2(resp) => assert_eq!(resp.status(), StatusCode::OK),
        #[cfg(feature = "fallback-http1")]
        Response::H1(_) => panic!("expected h2 over a plain loopback connection"),
    }

    let mut pushes = pushes.expect("h2 connection offers a push stream");
    let promise = pushes
        .next()
        .await
        .expect("at least one pushed resource")
        .expect("push promise arrived without error");

    assert_eq!(*promise.method(), Method::GET);
    assert_eq!(promise.url(), "/style.css");

    let pushed_response = promise.response().await.expect("pushed response");
    assert_eq!(pushed_response.status(), StatusCode::OK);

    handle.close();
}
