//! Retrying, bounded-concurrency artifact downloads.
//!
//! Each attempt streams into `<dest>.part` from the first byte, hashing as
//! it writes, and renames to `dest` only after the whole body arrived and
//! matched its digest. Any failure removes the partial file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use pywhl_schema::Sha256Digest;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::transport::{ArtifactTransport, FetchError};
use crate::Reporter;
use crate::cache::PARTIAL_SUFFIX;

#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
    /// Shown in progress output.
    pub filename: String,
    pub sha256: Option<Sha256Digest>,
    /// Used as the total when the server sends no length.
    pub size_hint: Option<u64>,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            filename: filename.into(),
            sha256: None,
            size_hint: None,
        }
    }

    pub fn with_sha256(mut self, digest: Option<Sha256Digest>) -> Self {
        self.sha256 = digest;
        self
    }

    pub fn with_size_hint(mut self, size: Option<u64>) -> Self {
        self.size_hint = size;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub filename: String,
    pub url: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub attempts: u32,
}

#[derive(Error, Debug)]
#[error("failed to download {filename} after {attempts} attempt(s): {cause}")]
pub struct DownloadError {
    pub filename: String,
    pub url: String,
    pub attempts: u32,
    #[source]
    pub cause: FetchError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<DownloadResult>,
    pub errors: Vec<DownloadError>,
}

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Total attempts per task, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each one after.
    pub base_delay: Duration,
    pub concurrency: usize,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            concurrency: 3,
        }
    }
}

impl DownloadOptions {
    /// Sleep before attempt `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp)
    }
}

pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

pub struct Downloader<T: ArtifactTransport> {
    transport: T,
    options: DownloadOptions,
}

impl<T: ArtifactTransport> Downloader<T> {
    pub fn new(transport: T, options: DownloadOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Download one task, retrying transient failures with backoff.
    ///
    /// # Errors
    ///
    /// Terminal failures return at once; transient ones once
    /// `max_attempts` is used up.
    pub async fn fetch_one(
        &self,
        slot: usize,
        task: &DownloadTask,
        reporter: &dyn Reporter,
    ) -> Result<DownloadResult, DownloadError> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(slot, task, reporter).await {
                Ok(bytes) => {
                    tracing::debug!(file = %task.filename, bytes, attempt, "downloaded");
                    reporter.done(slot, "downloaded", Some(bytes));
                    return Ok(DownloadResult {
                        filename: task.filename.clone(),
                        url: task.url.clone(),
                        path: task.dest.clone(),
                        bytes,
                        attempts: attempt,
                    });
                }
                Err(cause) if cause.is_retryable() && attempt < max_attempts => {
                    let delay = self.options.backoff(attempt);
                    tracing::warn!(file = %task.filename, attempt, ?delay, error = %cause, "retrying download");
                    attempt += 1;
                    reporter.retrying(slot, attempt, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(cause) => {
                    tracing::warn!(file = %task.filename, attempt, error = %cause, "download failed");
                    reporter.failed(slot, &cause.to_string());
                    return Err(DownloadError {
                        filename: task.filename.clone(),
                        url: task.url.clone(),
                        attempts: attempt,
                        cause,
                    });
                }
            }
        }
    }

    /// Run every task, at most `concurrency` at a time. One task failing
    /// never stops the others. Results and errors keep submission order.
    ///
    /// Callers must not submit two tasks with the same `dest`.
    pub async fn fetch_many(&self, tasks: &[DownloadTask], reporter: &dyn Reporter) -> BatchOutcome {
        let files: Vec<String> = tasks.iter().map(|t| t.filename.clone()).collect();
        reporter.prepare(&files);

        let mut finished: Vec<(usize, Result<DownloadResult, DownloadError>)> =
            stream::iter(tasks.iter().enumerate())
                .map(|(slot, task)| async move { (slot, self.fetch_one(slot, task, reporter).await) })
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;
        finished.sort_by_key(|(slot, _)| *slot);

        let mut outcome = BatchOutcome::default();
        for (_, result) in finished {
            match result {
                Ok(r) => outcome.results.push(r),
                Err(e) => outcome.errors.push(e),
            }
        }
        outcome
    }

    async fn attempt(&self, slot: usize, task: &DownloadTask, reporter: &dyn Reporter) -> Result<u64, FetchError> {
        let part = partial_path(&task.dest);
        let result = async {
            let bytes = self.stream_to(&part, slot, task, reporter).await?;
            tokio::fs::rename(&part, &task.dest).await?;
            Ok::<u64, FetchError>(bytes)
        }
        .await;
        if result.is_err() {
            tokio::fs::remove_file(&part).await.ok();
        }
        result
    }

    async fn stream_to(
        &self,
        part: &Path,
        slot: usize,
        task: &DownloadTask,
        reporter: &dyn Reporter,
    ) -> Result<u64, FetchError> {
        if let Some(parent) = part.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = self.transport.open(&task.url).await?;
        let total = body.total.or(task.size_hint);
        reporter.downloading(slot, 0, total);

        let mut file = File::create(part).await?;
        let mut stream = body.stream;
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            reporter.downloading(slot, downloaded, total);
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = &task.sha256 {
            let actual = hex::encode(hasher.finalize());
            if actual != expected.as_str() {
                return Err(FetchError::HashMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tempfile::TempDir;

    use crate::io::transport::Body;

    #[derive(Clone)]
    enum Step {
        Body(&'static [u8]),
        /// Sends the bytes, then drops the connection.
        Truncated(&'static [u8]),
        Transient,
        Status(u16),
    }

    /// Plays back a script of outcomes per URL; the last step repeats.
    #[derive(Default)]
    struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Step>>>,
        opened: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedTransport {
        fn script(self, url: &str, steps: &[Step]) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(url.to_string(), steps.iter().cloned().collect());
            self
        }

        fn opened(&self, url: &str) -> usize {
            self.opened.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ArtifactTransport for ScriptedTransport {
        async fn open(&self, url: &str) -> Result<Body, FetchError> {
            *self.opened.lock().unwrap().entry(url.to_string()).or_default() += 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let step = {
                let mut scripts = self.scripts.lock().unwrap();
                let queue = scripts.get_mut(url).expect("unscripted url");
                if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().cloned().unwrap()
                }
            };
            match step {
                Step::Body(data) => Ok(Body {
                    total: Some(data.len() as u64),
                    stream: futures::stream::iter(vec![Ok(Bytes::from_static(data))]).boxed(),
                }),
                Step::Truncated(data) => Ok(Body {
                    total: Some(data.len() as u64 * 2),
                    stream: futures::stream::iter(vec![
                        Ok(Bytes::from_static(data)),
                        Err(FetchError::Transient("connection reset".into())),
                    ])
                    .boxed(),
                }),
                Step::Transient => Err(FetchError::Transient("connection refused".into())),
                Step::Status(status) => Err(FetchError::Status { status }),
            }
        }
    }

    fn fast() -> DownloadOptions {
        DownloadOptions {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            concurrency: 3,
        }
    }

    fn task(dir: &TempDir, name: &str) -> DownloadTask {
        DownloadTask::new(format!("mem://{name}"), dir.path().join(name), name)
    }

    #[test]
    fn test_backoff_doubles() {
        let opts = DownloadOptions::default();
        assert_eq!(opts.backoff(1), Duration::from_secs(1));
        assert_eq!(opts.backoff(2), Duration::from_secs(2));
        assert_eq!(opts.backoff(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_terminal_and_success_partition() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::default()
            .script("mem://bad.whl", &[Step::Status(500)])
            .script("mem://good.whl", &[Step::Body(b"ok")]);
        let downloader = Downloader::new(transport, fast());

        for order in [["bad.whl", "good.whl"], ["good.whl", "bad.whl"]] {
            let tasks: Vec<DownloadTask> = order.iter().map(|n| task(&dir, n)).collect();
            let outcome = downloader.fetch_many(&tasks, &NullReporter).await;
            assert_eq!(outcome.results.len(), 1);
            assert_eq!(outcome.errors.len(), 1);
            assert_eq!(outcome.results[0].filename, "good.whl");
            assert_eq!(outcome.errors[0].attempts, 1);
            assert!(matches!(outcome.errors[0].cause, FetchError::Status { status: 500 }));
        }
        assert_eq!(downloader.transport.opened("mem://bad.whl"), 2);
        assert!(!dir.path().join("bad.whl").exists());
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let dir = TempDir::new().unwrap();
        let transport =
            ScriptedTransport::default().script("mem://flaky.whl", &[Step::Transient, Step::Body(b"wheel")]);
        let downloader = Downloader::new(transport, fast());

        let started = Instant::now();
        let outcome = downloader.fetch_many(&[task(&dir, "flaky.whl")], &NullReporter).await;
        assert!(started.elapsed() >= Duration::from_millis(50));

        assert!(outcome.errors.is_empty());
        let result = &outcome.results[0];
        assert_eq!(result.attempts, 2);
        assert_eq!(result.bytes, 5);
        assert_eq!(std::fs::read(dir.path().join("flaky.whl")).unwrap(), b"wheel");
        assert!(!partial_path(&dir.path().join("flaky.whl")).exists());
    }

    #[tokio::test]
    async fn test_retry_restarts_from_first_byte() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::default()
            .script("mem://cut.whl", &[Step::Truncated(b"abc"), Step::Body(b"abcdef")]);
        let downloader = Downloader::new(transport, fast());

        let result = downloader
            .fetch_one(0, &task(&dir, "cut.whl"), &NullReporter)
            .await
            .unwrap();
        assert_eq!(result.attempts, 2);
        assert_eq!(std::fs::read(dir.path().join("cut.whl")).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::default().script("mem://down.whl", &[Step::Transient]);
        let downloader = Downloader::new(transport, fast());

        let err = downloader
            .fetch_one(0, &task(&dir, "down.whl"), &NullReporter)
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(err.cause.is_retryable());
        assert_eq!(downloader.transport.opened("mem://down.whl"), 3);
        assert!(!dir.path().join("down.whl").exists());
        assert!(!partial_path(&dir.path().join("down.whl")).exists());
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_terminal() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::default().script("mem://h.whl", &[Step::Body(b"data")]);
        let downloader = Downloader::new(transport, fast());

        let wrong = Sha256Digest::compute(b"other");
        let t = task(&dir, "h.whl").with_sha256(Some(wrong));
        let err = downloader.fetch_one(0, &t, &NullReporter).await.unwrap_err();
        assert!(matches!(err.cause, FetchError::HashMismatch { .. }));
        assert_eq!(err.attempts, 1);
        assert!(!dir.path().join("h.whl").exists());

        let right = task(&dir, "h.whl").with_sha256(Some(Sha256Digest::compute(b"data")));
        assert!(downloader.fetch_one(0, &right, &NullReporter).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_gate() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("w{i}.whl")).collect();
        let mut transport = ScriptedTransport::default();
        for name in &names {
            transport = transport.script(&format!("mem://{name}"), &[Step::Body(b"x")]);
        }
        let downloader = Downloader::new(
            transport,
            DownloadOptions {
                concurrency: 2,
                ..fast()
            },
        );

        let tasks: Vec<DownloadTask> = names.iter().map(|n| task(&dir, n)).collect();
        let outcome = downloader.fetch_many(&tasks, &NullReporter).await;
        assert_eq!(outcome.results.len(), 8);
        assert!(downloader.transport.peak.load(Ordering::SeqCst) <= 2);
        let order: Vec<&str> = outcome.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(order, names.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
