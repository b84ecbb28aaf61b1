//! HKP Client Integration Tests
//!
//! These tests run the client against a real HTTP/1 server on the loopback
//! interface and verify:
//! - search, get and put request lines and bodies as seen by the server
//! - redirect following and its budget
//! - status classification
//! - streaming of large bodies
//! - dead host reporting after connection failures
//!
//! The host selector is given an empty static resolver, so `127.0.0.1`
//! never turns into a pool and requests go exactly where the URI says.

use std::sync::{Arc, Mutex};

use hkp_client::{ClientConfig, HkpClient, HyperTransport};
use hkp_common::{armor, escape, HkpError, KeySpec, KeyserverUri};
use hkp_pool::{HostSelector, StaticResolver};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

/// A request as received by the test server.
#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

type Handler = Arc<dyn Fn(&Seen, &str) -> Response<Full<Bytes>> + Send + Sync>;

/// Keyserver stand-in running on a separate task
struct TestKeyServer {
    addr: String,
    seen: Arc<Mutex<Vec<Seen>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestKeyServer {
    /// Starts a server on a random port; `handler` gets each request and
    /// the server's own address.
    async fn new<F>(handler: F) -> Self
    where
        F: Fn(&Seen, &str) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let server_addr = addr.clone();
        let server_seen = Arc::clone(&seen);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let handler = Arc::clone(&handler);
                                let seen = Arc::clone(&server_seen);
                                let addr = server_addr.clone();

                                tokio::spawn(async move {
                                    let service = service_fn(move |req| {
                                        let handler = Arc::clone(&handler);
                                        let seen = Arc::clone(&seen);
                                        let addr = addr.clone();
                                        async move { Self::serve(req, handler, seen, addr).await }
                                    });

                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        eprintln!("Server error: {}", err);
                                    }
                                });
                            }
                            Err(err) => {
                                eprintln!("Accept error: {}", err);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            seen,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    async fn serve(
        req: Request<Incoming>,
        handler: Handler,
        seen: Arc<Mutex<Vec<Seen>>>,
        addr: String,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();
        let request = Seen {
            method: parts.method,
            path: parts
                .uri
                .path_and_query()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            headers: parts.headers,
            body,
        };
        let response = handler(&request, &addr);
        seen.lock().unwrap().push(request);
        Ok(response)
    }

    fn uri(&self) -> KeyserverUri {
        KeyserverUri::parse(&format!("hkp://{}", self.addr)).unwrap()
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Drop for TestKeyServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn client() -> HkpClient<HyperTransport, StaticResolver> {
    HkpClient::with_parts(
        HyperTransport::default(),
        HostSelector::new(StaticResolver::new()),
        ClientConfig::default(),
    )
}

fn reply(status: u16, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::from_u16(status).unwrap())
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

fn redirect(status: u16, location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::from_u16(status).unwrap())
        .header("Location", location)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Redirects `/pks/lookup` through `hops` intermediate paths before answering.
fn redirect_chain(hops: usize) -> impl Fn(&Seen, &str) -> Response<Full<Bytes>> + Send + Sync {
    move |req, _addr| {
        let step = match req.path.strip_prefix("/hop/") {
            Some(n) => n.parse::<usize>().unwrap(),
            None => 0,
        };
        if step < hops {
            redirect(302, &format!("/hop/{}", step + 1))
        } else {
            reply(200, "info:1:1\npub:0123456789ABCDEF:1:2048:0::\n")
        }
    }
}

// ============================================================================
// Protocol Operations
// ============================================================================

#[tokio::test]
async fn test_search_request_line() {
    let server = TestKeyServer::new(|_, _| reply(200, "info:1:0\n")).await;
    let client = client();

    let mut stream = client.search(&server.uri(), "alice@example.org").await.unwrap();
    assert_eq!(&stream.read_to_end().await.unwrap()[..], b"info:1:0\n");

    let seen = server.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, Method::GET);
    assert_eq!(
        seen[0].path,
        "/pks/lookup?op=index&options=mr&search=alice%40example%2Eorg"
    );
    assert_eq!(seen[0].headers["pragma"], "no-cache");
    assert_eq!(seen[0].headers["cache-control"], "no-cache");
}

#[tokio::test]
async fn test_search_long_key_id() {
    let server = TestKeyServer::new(|_, _| reply(200, "info:1:1\n")).await;
    client()
        .search_spec(&server.uri(), &KeySpec::LongKeyId(0xDEADBEEF))
        .await
        .unwrap();
    assert_eq!(
        server.seen()[0].path,
        "/pks/lookup?op=index&options=mr&search=0x00000000DEADBEEF"
    );
}

#[tokio::test]
async fn test_search_html_is_rejected() {
    let server =
        TestKeyServer::new(|_, _| reply(200, "<!DOCTYPE html><title>Error</title>")).await;
    assert!(matches!(
        client().search(&server.uri(), "alice").await,
        Err(HkpError::UnsupportedEncoding)
    ));
}

#[tokio::test]
async fn test_get_returns_key_block() {
    const KEY: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQENBF...\n-----END PGP PUBLIC KEY BLOCK-----\n";
    let server = TestKeyServer::new(|_, _| reply(200, KEY)).await;

    let mut stream = client()
        .get(&server.uri(), "0123456789ABCDEF0123456789ABCDEF01234567")
        .await
        .unwrap();
    assert_eq!(&stream.read_to_end().await.unwrap()[..], KEY.as_bytes());
    assert_eq!(
        server.seen()[0].path,
        "/pks/lookup?op=get&options=mr&search=0x0123456789ABCDEF0123456789ABCDEF01234567"
    );
}

#[tokio::test]
async fn test_put_body_and_headers() {
    let server = TestKeyServer::new(|_, _| reply(200, "")).await;
    client().put(&server.uri(), &[0x01, 0x02, 0x03]).await.unwrap();

    let escaped = escape(&armor(&[0x01, 0x02, 0x03]));
    let seen = server.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(seen[0].path, "/pks/add");
    assert_eq!(
        seen[0].headers["content-type"],
        "application/x-www-form-urlencoded"
    );
    assert_eq!(
        seen[0].headers["content-length"].to_str().unwrap(),
        (8 + escaped.len()).to_string()
    );
    assert_eq!(seen[0].body, Bytes::from(format!("keytext={}", escaped)));
}

#[tokio::test]
async fn test_large_body_is_streamed() {
    static BODY: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    let body: &'static str = BODY.get_or_init(|| "pub:0123456789ABCDEF:1:2048:0::\n".repeat(8192));

    let server = TestKeyServer::new(move |_, _| reply(200, body)).await;
    let mut stream = client().search(&server.uri(), "alice").await.unwrap();

    let mut out: Vec<u8> = Vec::new();
    let copied = stream.copy_to(&mut out).await.unwrap();
    assert_eq!(copied as usize, body.len());
    assert_eq!(out, body.as_bytes());
}

// ============================================================================
// Redirects and Status Handling
// ============================================================================

#[tokio::test]
async fn test_one_redirect_succeeds() {
    let server = TestKeyServer::new(redirect_chain(1)).await;
    let stream = client().search(&server.uri(), "alice").await.unwrap();
    assert!(stream.source().ends_with("/hop/1"));
    assert_eq!(server.seen().len(), 2);
}

#[tokio::test]
async fn test_two_redirects_succeed() {
    let server = TestKeyServer::new(redirect_chain(2)).await;
    let mut stream = client().search(&server.uri(), "alice").await.unwrap();
    assert!(stream.read_to_end().await.unwrap().starts_with(b"info:1:1\n"));

    let paths: Vec<String> = server.seen().into_iter().map(|s| s.path).collect();
    assert_eq!(paths[1..], ["/hop/1".to_string(), "/hop/2".to_string()]);
}

#[tokio::test]
async fn test_three_redirects_fail() {
    let server = TestKeyServer::new(redirect_chain(3)).await;
    let err = client().search(&server.uri(), "alice").await.unwrap_err();
    assert!(matches!(err, HkpError::TooManyRedirects { .. }), "{}", err);
    assert_eq!(server.seen().len(), 3);
}

#[tokio::test]
async fn test_absolute_redirect() {
    let server = TestKeyServer::new(|req, addr| {
        if req.path.starts_with("/moved") {
            reply(200, "info:1:0\n")
        } else {
            redirect(301, &format!("http://{}/moved", addr))
        }
    })
    .await;
    let stream = client().get(&server.uri(), "0xDEADBEEF").await.unwrap();
    assert_eq!(stream.source(), format!("http://{}/moved", server.addr));
}

#[tokio::test]
async fn test_redirect_without_location() {
    let server = TestKeyServer::new(|_, _| reply(302, "")).await;
    assert!(matches!(
        client().get(&server.uri(), "0xDEADBEEF").await,
        Err(HkpError::MissingLocation { status: 302, .. })
    ));
}

#[tokio::test]
async fn test_not_found_is_no_data() {
    let server = TestKeyServer::new(|_, _| reply(404, "No results found")).await;
    match client().get(&server.uri(), "0xDEADBEEF").await {
        Err(HkpError::NoData { status, url }) => {
            assert_eq!(status, 404);
            assert!(url.contains("op=get"));
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// Failover
// ============================================================================

#[tokio::test]
async fn test_unreachable_host_can_be_reported_dead() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = KeyserverUri::parse(&format!("hkp://127.0.0.1:{}", port)).unwrap();
    let client = client();

    let target = match client.search(&uri, "alice").await {
        Err(HkpError::Connect { target, .. }) => target,
        other => panic!("expected connect error, got {:?}", other.map(|_| ())),
    };
    assert_eq!(target, "127.0.0.1");

    assert!(client.report_dead(&target).await);
    assert!(matches!(
        client.search(&uri, "alice").await,
        Err(HkpError::NoHost(_))
    ));
}
