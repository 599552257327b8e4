#![allow(dead_code)]

use std::future::{ready, Future, Ready};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use turnstile::BoxError;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared, ordered record of what ran
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Delegate that records its value and echoes it back
    pub fn recorder(&self) -> impl Fn(String) -> Ready<Result<String, BoxError>> + Send + Sync + 'static {
        let log = self.clone();
        move |value: String| {
            log.push(value.clone());
            ready(Ok(value))
        }
    }
}

/// Lets a test hold an operation mid-flight and release it later
#[derive(Clone, Default)]
pub struct Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub async fn wait_started(&self) {
        tokio::time::timeout(TIMEOUT, self.started.notified())
            .await
            .expect("gated operation never started");
    }

    pub fn open(&self) {
        self.release.notify_one();
    }

    /// Delegate that logs `<value>:start`, blocks until the gate opens, then logs `<value>:end`
    pub fn delegate(
        &self,
        log: &Log,
    ) -> impl Fn(String) -> std::pin::Pin<Box<dyn Future<Output = Result<String, BoxError>> + Send>>
           + Send
           + Sync
           + 'static {
        let gate = self.clone();
        let log = log.clone();
        move |value: String| {
            let gate = gate.clone();
            let log = log.clone();
            Box::pin(async move {
                log.push(format!("{value}:start"));
                gate.started.notify_one();
                gate.release.notified().await;
                log.push(format!("{value}:end"));
                Ok(value)
            })
        }
    }
}

/// Await `future`, failing the test if it takes too long
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(TIMEOUT, future)
        .await
        .expect("timed out")
}
