//! Usage reporting sink.
//!
//! After every successful export the session sends one [`UsageEvent`] to the
//! configured [`UsageReporter`]. The call is fire-and-forget: it runs on its
//! own task, and a failure is logged at `warn` and otherwise ignored. It can
//! never delay, fail or roll back the export it describes.

use crate::error::UsageError;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Entries kept by [`LocalUsageLog`].
pub const LOCAL_LOG_CAPACITY: usize = 100;

/// One completed export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub tool_id: String,
    pub file_count: u32,
    /// Size of the original input, in bytes.
    pub byte_size: u64,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl UsageEvent {
    /// Event for one exported file, stamped now.
    pub fn single_file(tool_id: &str, session_id: &str, byte_size: u64) -> Self {
        Self {
            tool_id: tool_id.to_string(),
            file_count: 1,
            byte_size,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Receives [`UsageEvent`]s.
///
/// Returns a `'static` future so the session can spawn it and move on.
pub trait UsageReporter: Send + Sync {
    fn report(&self, event: UsageEvent) -> BoxFuture<'static, Result<(), UsageError>>;
}

/// Drops every event. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageReporter;

impl UsageReporter for NoopUsageReporter {
    fn report(&self, _event: UsageEvent) -> BoxFuture<'static, Result<(), UsageError>> {
        futures::future::ready(Ok(())).boxed()
    }
}

/// Keeps the last [`LOCAL_LOG_CAPACITY`] events in memory and, if a path is
/// set, rewrites them to disk as a JSON array after each event.
///
/// Writes are serialised and each one takes its snapshot under the write
/// lock, so the file always ends up holding the newest entries no matter in
/// which order the report futures run.
#[derive(Debug, Clone, Default)]
pub struct LocalUsageLog {
    entries: Arc<Mutex<VecDeque<UsageEvent>>>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    path: Option<PathBuf>,
}

impl LocalUsageLog {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Persist to `path`, seeding from it if it already holds a valid log.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let seeded: VecDeque<UsageEvent> = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self {
            entries: Arc::new(Mutex::new(seeded)),
            write_lock: Arc::default(),
            path: Some(path),
        }
    }

    /// Logged events, oldest first.
    pub fn entries(&self) -> Vec<UsageEvent> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn push(&self, event: UsageEvent) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push_back(event);
        while guard.len() > LOCAL_LOG_CAPACITY {
            guard.pop_front();
        }
    }
}

impl UsageReporter for LocalUsageLog {
    fn report(&self, event: UsageEvent) -> BoxFuture<'static, Result<(), UsageError>> {
        self.push(event);
        let log = self.clone();
        async move {
            let Some(path) = log.path.as_deref() else {
                return Ok(());
            };
            let _write = log.write_lock.lock().await;
            let snapshot = log.entries();
            let json = serde_json::to_vec_pretty(&snapshot)?;
            tokio::fs::write(path, json).await?;
            debug!("Usage log: {} entries → {}", snapshot.len(), path.display());
            Ok(())
        }
        .boxed()
    }
}

/// POSTs each event as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpUsageReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUsageReporter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, UsageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| UsageError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl UsageReporter for HttpUsageReporter {
    fn report(&self, event: UsageEvent) -> BoxFuture<'static, Result<(), UsageError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        async move {
            let body = serde_json::to_vec(&event)?;
            let response = client
                .post(&endpoint)
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| UsageError::Transport(e.to_string()))?;
            if !response.status().is_success() {
                return Err(UsageError::Status(response.status().as_u16()));
            }
            debug!("Usage event sent to {}", endpoint);
            Ok(())
        }
        .boxed()
    }
}
