//! Acceptor lifecycle against real sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ConnectInfo;
use axum::routing::get;
use axum::Router;
use http_dispatch::config::{ContextConfig, ExecutorConfig, ListenerConfig};
use http_dispatch::executor::ExecutionService;
use http_dispatch::net::{Acceptor, AcceptorState, ConnectionTracker};
use tokio::io::AsyncWriteExt;

mod common;

use common::{client, free_port};

const POLL: Duration = Duration::from_millis(200);

fn app() -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route(
            "/peer",
            get(|ConnectInfo(peer): ConnectInfo<SocketAddr>| async move { peer.ip().to_string() }),
        )
}

fn acceptor(port: u16, executor: Arc<ExecutionService>, tracker: ConnectionTracker) -> Acceptor {
    let context = ContextConfig {
        host: "127.0.0.1".to_string(),
        ..ContextConfig::new("test", port)
    };
    let listener = ListenerConfig {
        accept_poll_ms: POLL.as_millis() as u64,
        keep_alive: false,
        ..ListenerConfig::default()
    };
    Acceptor::new(context, &listener, app(), executor, tracker)
}

fn executor() -> Arc<ExecutionService> {
    let executor = Arc::new(ExecutionService::new(&ExecutorConfig { workers: 4 }));
    executor.start();
    executor
}

#[tokio::test]
async fn serves_requests_on_the_executor() {
    let executor = executor();
    let tracker = ConnectionTracker::new();
    let acceptor = acceptor(free_port(), Arc::clone(&executor), tracker.clone());
    let addr = acceptor.start().await.unwrap();
    assert_eq!(acceptor.state(), AcceptorState::Listening);

    let client = client();
    let body = client.get(format!("http://{addr}/ping")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "pong");

    let peer = client.get(format!("http://{addr}/peer")).send().await.unwrap().text().await.unwrap();
    assert_eq!(peer, "127.0.0.1");

    acceptor.stop();
    acceptor.wait_stopped().await;

    for _ in 0..100 {
        if executor.stats().completed >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(executor.stats().completed >= 2);
}

#[tokio::test]
async fn stops_within_one_poll_interval_and_releases_port() {
    let port = free_port();
    let executor = executor();
    let first = acceptor(port, Arc::clone(&executor), ConnectionTracker::new());
    first.start().await.unwrap();

    // Let the loop settle into an idle accept wait.
    tokio::time::sleep(POLL / 2).await;

    let started = Instant::now();
    first.stop();
    first.wait_stopped().await;
    assert!(
        started.elapsed() <= POLL + Duration::from_millis(100),
        "stop took {:?}",
        started.elapsed()
    );
    assert_eq!(first.state(), AcceptorState::Stopped);

    let second = acceptor(port, executor, ConnectionTracker::new());
    let addr = second.start().await.unwrap();
    assert_eq!(addr.port(), port);

    let body = client().get(format!("http://{addr}/ping")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "pong");

    second.stop();
    second.wait_stopped().await;
}

#[tokio::test]
async fn keeps_accepting_after_broken_connections() {
    let executor = executor();
    let tracker = ConnectionTracker::new();
    let acceptor = acceptor(free_port(), Arc::clone(&executor), tracker.clone());
    let addr = acceptor.start().await.unwrap();

    for _ in 0..5 {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"NOT HTTP\r\n\r\n").await.unwrap();
        drop(stream);
    }

    let client = client();
    for _ in 0..10 {
        let res = client.get(format!("http://{addr}/ping")).send().await.unwrap();
        assert!(res.status().is_success());
    }

    for _ in 0..100 {
        if tracker.active_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(tracker.active_count(), 0);

    acceptor.stop();
    acceptor.wait_stopped().await;
}
