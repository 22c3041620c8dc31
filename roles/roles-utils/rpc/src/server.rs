//! HTTP front end for a [`Dispatcher`].
//!
//! Every accepted connection is served on its own task by hyper's HTTP/1 connection driver.
//! Only `POST` is answered with a JSON-RPC envelope; other verbs get `405`.
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, future::Future, io, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;

pub struct RpcServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl RpcServer {
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve(self) -> io::Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves. Connections already being served are
    /// left to finish on their own tasks.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => {
                    info!("RPC server on {:?} shutting down", self.listener.local_addr());
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| handle_request(dispatcher.clone(), req));
                // A client that went away mid-response surfaces here and nowhere else.
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("Connection with {} ended: {}", peer, e);
                }
            });
        }
    }
}

async fn handle_request(
    dispatcher: Arc<Dispatcher>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST {
        return Ok(empty(StatusCode::METHOD_NOT_ALLOWED));
    }
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            return Ok(empty(StatusCode::BAD_REQUEST));
        }
    };

    let Some(rpc_response) = dispatcher.dispatch(&body).await else {
        return Ok(empty(StatusCode::NO_CONTENT));
    };
    let payload = match serde_json::to_vec(&rpc_response) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to encode response: {}", e);
            return Ok(empty(StatusCode::INTERNAL_SERVER_ERROR));
        }
    };

    let length = payload.len();
    let mut response = Response::new(Full::new(Bytes::from(payload)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/json"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
