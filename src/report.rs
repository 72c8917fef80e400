// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error reporting collaborators.
//!
//! Reporting never blocks the caller and never fails from the caller's point
//! of view: [`HttpReporter`] hands the upload to the runtime and swallows any
//! error it runs into.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::locks::resilient_lock;

/// Timeout for a single report upload.
const REPORT_TIMEOUT_SECS: u64 = 10;

/// Sink for errors worth escalating (transport and storage failures, failing
/// scheduled callbacks).
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &anyhow::Error);
}

/// Reporter that only writes the error to the log.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &anyhow::Error) {
        tracing::error!("{:#}", error);
    }
}

/// Payload sent to the diagnostics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    /// Top-level error message
    pub message: String,
    /// Underlying causes, outermost first
    pub causes: Vec<String>,
    /// Host the error happened on, if known
    pub host: Option<String>,
    /// Crate version
    pub version: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn from_error(error: &anyhow::Error) -> Self {
        Self {
            message: error.to_string(),
            causes: error.chain().skip(1).map(|cause| cause.to_string()).collect(),
            host: hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// Reporter that logs the error and POSTs an [`ErrorReport`] as JSON.
///
/// Uploads run on the captured runtime. Call [`HttpReporter::flush`] before
/// that runtime is dropped, or uploads still in flight are cancelled.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
    runtime: Handle,
    uploads: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HttpReporter {
    /// Create a reporter that uploads on `runtime`.
    ///
    /// The runtime handle is captured so reports can be issued from threads
    /// that are not part of the runtime, such as the presentation thread.
    pub fn new(endpoint: impl Into<String>, runtime: Handle) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REPORT_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, endpoint, runtime))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>, runtime: Handle) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            runtime,
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of uploads that have not finished yet.
    pub fn pending(&self) -> usize {
        resilient_lock(&self.uploads)
            .iter()
            .filter(|upload| !upload.is_finished())
            .count()
    }

    /// Wait for every upload started so far, up to `limit`.
    ///
    /// Returns `false` if the limit was hit; the remaining uploads keep
    /// running for as long as the runtime does.
    pub async fn flush(&self, limit: Duration) -> bool {
        let uploads = std::mem::take(&mut *resilient_lock(&self.uploads));
        let finished = tokio::time::timeout(limit, async {
            for upload in uploads {
                let _ = upload.await;
            }
        })
        .await
        .is_ok();

        if !finished {
            tracing::warn!("Gave up waiting for error reports after {:?}", limit);
        }
        finished
    }
}

impl ErrorReporter for HttpReporter {
    fn report(&self, error: &anyhow::Error) {
        tracing::error!("{:#}", error);

        let report = ErrorReport::from_error(error);
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let upload = self.runtime.spawn(async move {
            match client.post(&endpoint).json(&report).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(status = %response.status(), "Error report rejected");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Failed to send error report: {}", e),
            }
        });

        let mut uploads = resilient_lock(&self.uploads);
        uploads.retain(|upload| !upload.is_finished());
        uploads.push(upload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    #[test]
    fn test_report_from_error_chain() {
        let err = std::fs::read("/definitely/not/here")
            .context("Failed to persist entry")
            .unwrap_err();
        let report = ErrorReport::from_error(&err);
        assert_eq!(report.message, "Failed to persist entry");
        assert_eq!(report.causes.len(), 1);
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_http_reporter_posts_json() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ErrorReport>();
        let app = Router::new().route(
            "/report",
            post(move |Json(report): Json<ErrorReport>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(report);
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let reporter = HttpReporter::with_client(
            client,
            format!("http://{}/report", addr),
            Handle::current(),
        );
        reporter.report(&anyhow::anyhow!("transport failed"));

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.message, "transport failed");
    }

    #[tokio::test]
    async fn test_http_reporter_swallows_failures() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let reporter = HttpReporter::with_client(
            client,
            format!("http://{}/report", addr),
            Handle::current(),
        );
        // Returns immediately; the failed upload is only logged.
        reporter.report(&anyhow::anyhow!("nobody is listening"));
        assert!(reporter.flush(Duration::from_secs(5)).await);
        assert_eq!(reporter.pending(), 0);
    }

    #[test]
    fn test_flush_delivers_before_runtime_shutdown() {
        let received = Arc::new(AtomicUsize::new(0));
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();

        // Endpoint on its own runtime, outliving the reporter's
        let counter = received.clone();
        std::thread::spawn(move || {
            let server = tokio::runtime::Runtime::new().unwrap();
            server.block_on(async move {
                let app = Router::new().route(
                    "/report",
                    post(move |Json(_report): Json<ErrorReport>| {
                        let counter = counter.clone();
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                        }
                    }),
                );
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();
                let _ = axum::serve(listener, app).await;
            });
        });
        let addr = addr_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let reporter = HttpReporter::with_client(
            client,
            format!("http://{}/report", addr),
            runtime.handle().clone(),
        );

        // Reported from outside the runtime, like the presentation thread
        reporter.report(&anyhow::anyhow!("late download failure"));
        reporter.report(&anyhow::anyhow!("callback failed"));
        assert!(runtime.block_on(reporter.flush(Duration::from_secs(5))));
        drop(runtime);

        assert_eq!(received.load(Ordering::SeqCst), 2);
    }
}
