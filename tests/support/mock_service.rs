use std::{
    collections::{HashMap, VecDeque},
    convert::Infallible,
    sync::{Arc, RwLock},
    time::Duration,
};

use accountsync::AccountMetadata;
use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// One scripted reply from the metadata service: an artificial delay plus
/// either a payload or an HTTP status code.
#[derive(Clone)]
pub struct ScriptedResponse {
    pub delay: Duration,
    pub result: Result<AccountMetadata, u16>,
}

impl ScriptedResponse {
    pub fn ok(metadata: AccountMetadata) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(metadata),
        }
    }

    pub fn ok_after(delay: Duration, metadata: AccountMetadata) -> Self {
        Self {
            delay,
            result: Ok(metadata),
        }
    }

    pub fn status(code: u16) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(code),
        }
    }
}

#[derive(Default)]
struct AccountScript {
    /// One-shot responses consumed in order before `repeat` takes over.
    queue: VecDeque<ScriptedResponse>,
    repeat: Option<ScriptedResponse>,
    requests: u64,
}

/// In-memory metadata service keyed by `(chain_id, address)`. Unknown
/// accounts get a 404.
#[derive(Clone, Default)]
pub struct MockMetadataService {
    scripts: Arc<RwLock<HashMap<(String, String), AccountScript>>>,
}

impl MockMetadataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every request for the account resolve with `response`.
    pub fn set_account(&self, chain_id: &str, address: &str, response: ScriptedResponse) {
        let mut scripts = self.scripts.write().expect("mock service poisoned");
        let script = scripts.entry(script_key(chain_id, address)).or_default();
        script.repeat = Some(response);
    }

    /// Queues one-shot responses consumed before the repeating one.
    pub fn push_response(&self, chain_id: &str, address: &str, response: ScriptedResponse) {
        let mut scripts = self.scripts.write().expect("mock service poisoned");
        let script = scripts.entry(script_key(chain_id, address)).or_default();
        script.queue.push_back(response);
    }

    pub fn request_count(&self, chain_id: &str, address: &str) -> u64 {
        self.scripts
            .read()
            .expect("mock service poisoned")
            .get(&script_key(chain_id, address))
            .map(|script| script.requests)
            .unwrap_or(0)
    }

    fn next_response(&self, chain_id: &str, address: &str) -> Option<ScriptedResponse> {
        let mut scripts = self.scripts.write().expect("mock service poisoned");
        let script = scripts.get_mut(&script_key(chain_id, address))?;
        script.requests += 1;
        script.queue.pop_front().or_else(|| script.repeat.clone())
    }
}

fn script_key(chain_id: &str, address: &str) -> (String, String) {
    (chain_id.to_string(), address.to_ascii_lowercase())
}

pub struct MockServiceServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServiceServer {
    pub async fn start(service: MockMetadataService) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock service listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let service = service.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(service.clone(), req)))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock metadata service stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(
    service: MockMetadataService,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        return Ok(plain_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Unsupported method",
        ));
    }

    let path = req.uri().path().to_owned();
    let Some((chain_id, address)) = parse_account_path(&path) else {
        return Ok(plain_response(StatusCode::NOT_FOUND, "unknown path"));
    };

    let Some(scripted) = service.next_response(&chain_id, &address) else {
        return Ok(plain_response(StatusCode::NOT_FOUND, "unknown account"));
    };

    if !scripted.delay.is_zero() {
        sleep(scripted.delay).await;
    }

    match scripted.result {
        Ok(metadata) => {
            let body = serde_json::to_string(&metadata).expect("metadata must serialize");
            let mut response = Response::new(Body::from(body));
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            Ok(response)
        }
        Err(code) => Ok(plain_response(
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "scripted failure",
        )),
    }
}

/// Parses `/v1/chains/{chain_id}/accounts/{address}`.
fn parse_account_path(path: &str) -> Option<(String, String)> {
    let mut parts = path.trim_matches('/').split('/');
    if parts.next() != Some("v1") || parts.next() != Some("chains") {
        return None;
    }
    let chain_id = parts.next()?;
    if parts.next() != Some("accounts") {
        return None;
    }
    let address = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((chain_id.to_string(), address.to_ascii_lowercase()))
}

fn plain_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}
