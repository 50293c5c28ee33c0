//! Tiny HTTP server for tests, where every request has to be anticipated up front and is answered
//! only when the test decides so.

use http_body_util::Full;
use hyper::{Request, Response, server::conn::http1, service::Service};
use hyper_util::rt::TokioIo;
use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::{Arc, Mutex},
};
use tokio::{net::TcpListener, sync::oneshot};

pub use hyper;
pub use hyper::StatusCode;
pub use hyper::body::Bytes;

type MockResponse = Response<Full<Bytes>>;

/// Channels connecting an anticipated path with the test.
struct Anticipation {
    request_tx: oneshot::Sender<Request<()>>,
    response_rx: oneshot::Receiver<MockResponse>,
}

#[derive(Default)]
struct State {
    /// Paths made known by [`Server::anticipate`], before incoming HTTP request.
    anticipated: HashMap<String, Anticipation>,

    unexpected: Vec<String>,
}

pub struct Server {
    port: u16,
    state: Arc<Mutex<State>>,
}

impl Server {
    /// Create new [`Server`], and bind it to a random port.
    pub async fn bind() -> Self {
        let state = Arc::new(Mutex::new(State::default()));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);

                let state = state_clone.clone();
                tokio::task::spawn(async move {
                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, MockRequest { state })
                        .await
                    {
                        log::debug!("Connection closed: {err}.");
                    }
                });
            }
        });

        Self { port, state }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Make the server accept a single request to the `path`.
    pub async fn anticipate(&self, path: impl Into<String>) -> AnticipatedRequest {
        let path = path.into();
        log::info!("Anticipating '{path}'.");

        let (request_tx, request_rx) = oneshot::channel();
        let (response_tx, response_rx) = oneshot::channel();

        self.state.lock().unwrap().anticipated.insert(
            path,
            Anticipation {
                request_tx,
                response_rx,
            },
        );

        AnticipatedRequest {
            request_rx: Some(request_rx),
            response_tx,
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        let state = self.state.lock().unwrap();
        if !state.unexpected.is_empty() {
            panic!("there are unexpected requests: {:?}", state.unexpected);
        }
    }
}

pub struct AnticipatedRequest {
    request_rx: Option<oneshot::Receiver<Request<()>>>,
    response_tx: oneshot::Sender<MockResponse>,
}

impl AnticipatedRequest {
    /// Wait for the request to come. Its body is not available.
    pub async fn expect(&mut self) -> Request<()> {
        let request_rx = self
            .request_rx
            .take()
            .expect("request was already expected");
        request_rx.await.expect("server is gone")
    }

    /// Respond with `200 OK` and given payload.
    pub async fn respond(self, payload: impl Into<Bytes>) {
        log::info!("Responding.");
        self.send(Response::new(Full::new(payload.into())));
    }

    /// Respond with empty body and given status code.
    pub async fn respond_with_status(self, status: StatusCode) {
        log::info!("Responding with {status}.");
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        self.send(response);
    }

    fn send(self, response: MockResponse) {
        if self.response_tx.send(response).is_err() {
            log::warn!("Request was abandoned before the response.");
        }
    }
}

struct MockRequest {
    state: Arc<Mutex<State>>,
}

impl Service<Request<hyper::body::Incoming>> for MockRequest {
    type Response = MockResponse;
    type Error = hyper::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<hyper::body::Incoming>) -> Self::Future {
        log::info!("Incoming request '{}'.", request.uri());
        let state = self.state.clone();
        Box::pin(async move {
            let path = request.uri().path().to_owned();
            let anticipation = state.lock().unwrap().anticipated.remove(&path);

            if let Some(anticipation) = anticipation {
                let (parts, _) = request.into_parts();

                // Test might not be interested in the request itself.
                let _ = anticipation.request_tx.send(Request::from_parts(parts, ()));

                match anticipation.response_rx.await {
                    Ok(response) => Ok(response),
                    Err(_) => {
                        log::warn!("'{path}' was anticipated, but never responded to.");
                        let mut response = Response::new(Full::new(Bytes::new()));
                        *response.status_mut() = StatusCode::GONE;
                        Ok(response)
                    }
                }
            } else {
                log::warn!("Unexpected '{}'.", request.uri());
                state
                    .lock()
                    .unwrap()
                    .unexpected
                    .push(request.uri().to_string());
                let mut response = Response::new(Full::new(Bytes::from_static(b"unexpected")));
                *response.status_mut() = StatusCode::IM_A_TEAPOT;
                Ok(response)
            }
        })
    }
}
