//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http_dispatch::config::{ContextConfig, RuntimeConfig};
use http_dispatch::executor::BoxError;
use http_dispatch::jobs::{AsyncJobs, AsyncRequest, JobId, JobState};
use http_dispatch::{AppBuilder, AsyncRoute, Runtime};
use tokio::sync::watch;

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Loopback-only config with one context per port and a short accept poll.
pub fn local_config(ports: &[u16]) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.contexts = ports
        .iter()
        .enumerate()
        .map(|(i, port)| ContextConfig {
            host: "127.0.0.1".to_string(),
            ..ContextConfig::new(format!("ctx-{i}"), *port)
        })
        .collect();
    config.listener.accept_poll_ms = 50;
    config.listener.keep_alive = false;
    config.executor.workers = 64;
    config
}

/// Client without connection reuse, so every request is a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Client that keeps connections open between requests.
pub fn keep_alive_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub async fn start_runtime(config: RuntimeConfig, app: AppBuilder) -> (Arc<Runtime>, SocketAddr) {
    let runtime = Arc::new(Runtime::new(config, app).unwrap());
    let addresses = runtime.start().await.unwrap();
    (runtime, addresses[0])
}

/// An async route whose job bodies wait until the gate opens, counting runs.
pub struct BlockingJob {
    gate: Arc<watch::Sender<bool>>,
    runs: Arc<AtomicUsize>,
}

impl BlockingJob {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            gate: Arc::new(gate),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn route(&self, name: &str) -> AsyncRoute {
        let gate = Arc::clone(&self.gate);
        let runs = Arc::clone(&self.runs);
        AsyncRoute::new(name, move |_request: AsyncRequest| {
            let mut open = gate.subscribe();
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let _ = open.wait_for(|open| *open).await;
                Ok::<(), BoxError>(())
            }
        })
    }

    /// Let every current and future job body finish.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

/// Poll `jobs` until `id` reaches `expected`.
pub async fn wait_for_state(jobs: &AsyncJobs, id: JobId, expected: JobState) {
    for _ in 0..200 {
        if jobs.state(id) == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {expected:?}, last {:?}", jobs.state(id));
}
