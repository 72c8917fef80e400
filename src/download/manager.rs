// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download manager for remote assets.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tokio::task::JoinHandle;

use super::error::FetchError;
use super::types::{AssetKind, DownloadTask, FetchOutcome};
use crate::cache::{AssetStore, CacheKey, Partition};
use crate::config::Settings;
use crate::handoff::{ApplicationQueue, ResourceHost, ResourceId};
use crate::report::ErrorReporter;

/// Content types accepted for image assets.
pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// True if `content_type` names an accepted image type. Parameters such as
/// `; charset=...` are ignored.
pub fn is_accepted_image(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or("").trim();
    ACCEPTED_IMAGE_TYPES
        .iter()
        .any(|accepted| essence.eq_ignore_ascii_case(accepted))
}

/// Fetches assets into the [`AssetStore`] and schedules binds on the
/// [`ApplicationQueue`].
///
/// Cloning is cheap; clones share the HTTP connection pool, the store and
/// the queue.
#[derive(Clone)]
pub struct DownloadManager {
    client: reqwest::Client,
    store: AssetStore,
    queue: ApplicationQueue,
    reporter: Arc<dyn ErrorReporter>,
    max_attempts: u32,
    max_payload_bytes: u64,
}

impl DownloadManager {
    /// Create a manager with default settings.
    pub fn new(store: AssetStore, queue: ApplicationQueue, reporter: Arc<dyn ErrorReporter>) -> Result<Self> {
        Self::from_settings(&Settings::default(), store, queue, reporter)
    }

    pub fn from_settings(
        settings: &Settings,
        store: AssetStore,
        queue: ApplicationQueue,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            store,
            queue,
            reporter,
            max_attempts: settings.max_attempts,
            max_payload_bytes: settings.max_payload_bytes,
        })
    }

    /// Replace the HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// New task for `locator` using the configured attempt ceiling.
    pub fn task(&self, locator: impl Into<String>, kind: AssetKind) -> DownloadTask {
        DownloadTask::with_max_attempts(locator, kind, self.max_attempts)
    }

    /// Make sure the asset behind `task` is on disk and schedule a bind for it.
    ///
    /// Returns without doing anything if a fetch for this task is already
    /// running. An existing entry short-circuits the network and does not use
    /// up an attempt. Otherwise one attempt is consumed and the asset is
    /// downloaded; transport and storage failures go to the error reporter,
    /// protocol rejections are only logged.
    pub async fn fetch(&self, task: &DownloadTask) -> FetchOutcome {
        let Some(in_flight) = task.try_begin() else {
            tracing::debug!(locator = task.locator(), "Fetch already in progress");
            return FetchOutcome::AlreadyInFlight;
        };

        let key = CacheKey::from_locator(task.locator());
        let partition = task.kind().partition();
        let id = self.store.resource_id(partition, &key);

        if self.store.exists(partition, &key) {
            let path = self.store.entry_path(partition, &key);
            tracing::debug!(locator = task.locator(), key = %key, "Cache hit");
            self.schedule_bind(path.clone(), id.clone());
            return FetchOutcome::Cached { path, id };
        }

        if task.is_exhausted() {
            tracing::debug!(locator = task.locator(), "Attempt ceiling reached");
            return FetchOutcome::Exhausted;
        }

        let attempt = in_flight.consume_attempt();
        match self.download(task, &key, partition).await {
            Ok(path) => {
                tracing::info!(
                    locator = task.locator(),
                    attempt,
                    path = %path.display(),
                    "Saved asset"
                );
                self.schedule_bind(path.clone(), id.clone());
                FetchOutcome::Downloaded { path, id }
            }
            Err(e) => {
                if e.is_reportable() {
                    self.reporter.report(&anyhow!(
                        "Failed to fetch `{}` (attempt {}/{}): {}",
                        task.locator(),
                        attempt,
                        task.max_attempts(),
                        e
                    ));
                } else {
                    tracing::warn!(
                        locator = task.locator(),
                        attempt,
                        "Can't save asset: {}",
                        e
                    );
                }
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Run [`DownloadManager::fetch`] on the worker pool.
    pub fn spawn(&self, task: Arc<DownloadTask>) -> JoinHandle<FetchOutcome> {
        let manager = self.clone();
        tokio::spawn(async move { manager.fetch(&task).await })
    }

    /// Request a batch of assets of one kind.
    ///
    /// Each locator gets its own task on the worker pool. The resource ids are
    /// returned right away, in input order; binds arrive through the queue as
    /// downloads complete.
    pub fn request_all<I, S>(&self, locators: I, kind: AssetKind) -> Vec<ResourceId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Err(e) = self.store.ensure_layout() {
            self.reporter.report(&e);
        }

        locators
            .into_iter()
            .map(|locator| {
                let task = Arc::new(self.task(locator, kind));
                let key = CacheKey::from_locator(task.locator());
                let id = self.store.resource_id(kind.partition(), &key);
                drop(self.spawn(task));
                id
            })
            .collect()
    }

    async fn download(
        &self,
        task: &DownloadTask,
        key: &CacheKey,
        partition: Partition,
    ) -> Result<PathBuf, FetchError> {
        let url = Url::parse(task.locator()).map_err(|e| FetchError::InvalidLocator {
            locator: task.locator().to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        if task.kind().expects_image() {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            if !is_accepted_image(content_type.as_deref()) {
                return Err(FetchError::ContentType(content_type));
            }
        }

        let limit = self.max_payload_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchError::Transport)?;
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        let store = self.store.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || store.persist(partition, &key, &body))
            .await
            .map_err(|e| FetchError::Worker(e.to_string()))?
            .map_err(FetchError::Storage)
    }

    fn schedule_bind(&self, path: PathBuf, id: ResourceId) {
        self.queue.enqueue(move |host: &mut dyn ResourceHost| {
            // The entry may have been swept since the bind was scheduled
            if !path.is_file() {
                tracing::debug!(resource = %id, "Skipping bind, entry is gone");
                return Ok(());
            }
            host.bind_resource(&path, &id)
        });
    }
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("store", &self.store)
            .field("max_attempts", &self.max_attempts)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .finish()
    }
}
