//! Effect executor for the document job: upload, bounded status polling,
//! result download, save, and the delayed reset back to idle.
//!
//! Polls are strictly sequential with a flat interval. Once the upload has
//! been accepted nothing here tells the server to cancel. Dropping the
//! `start` future stops watching the job and moves it to `Error`, which
//! re-enables the trigger.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn, Instrument};

use super::machine::{JobSnapshot, JobStateMachine};
use super::phase::{JobEvent, JobPhase, ServerPhase};
use super::sink::ResultSink;
use super::upload::{check_configuration, check_file, result_file_name, JobRequest};
use crate::backend::{JobHandle, TranslationBackend, UploadRequest};
use crate::config::ClientConfig;
use crate::error::{BackendError, JobError};
use crate::metrics::{metric_names, JobIds, MetricsRegistry};

/// Error detail left behind when the caller stops watching a job.
pub const ABANDONED: &str = "job abandoned";

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub upload_timeout: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub reset_delay: Duration,
    pub max_upload_bytes: u64,
}

impl From<&ClientConfig> for PollSettings {
    fn from(c: &ClientConfig) -> Self {
        Self {
            upload_timeout: c.upload_timeout,
            poll_interval: c.poll_interval,
            max_attempts: c.max_poll_attempts,
            reset_delay: c.reset_delay,
            max_upload_bytes: c.max_upload_bytes,
        }
    }
}

/// Result of a completed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub document_id: String,
    pub saved_to: PathBuf,
    pub size: usize,
}

pub struct JobPoller {
    backend: Arc<dyn TranslationBackend>,
    sink: Arc<dyn ResultSink>,
    machine: Arc<JobStateMachine>,
    metrics: Arc<MetricsRegistry>,
    settings: PollSettings,
}

impl JobPoller {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        sink: Arc<dyn ResultSink>,
        metrics: Arc<MetricsRegistry>,
        settings: PollSettings,
    ) -> Self {
        Self {
            backend,
            sink,
            machine: Arc::new(JobStateMachine::new()),
            metrics,
            settings,
        }
    }

    pub fn machine(&self) -> &Arc<JobStateMachine> {
        &self.machine
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<JobSnapshot> {
        self.machine.subscribe()
    }

    /// Whether the "translate document" trigger is enabled.
    pub fn can_start(&self) -> bool {
        self.machine.current().accepts_new_job()
    }

    /// Run one job to completion. Every error leaves the machine in `Error`.
    pub async fn start(&self, request: JobRequest) -> Result<JobOutcome, JobError> {
        let max_bytes = self.settings.max_upload_bytes;
        let serial = self.machine.begin(|| {
            check_configuration(&request)?;
            check_file(&request.file, max_bytes)
        })?;

        let mut watch = WatchGuard {
            machine: Arc::clone(&self.machine),
            serial,
            armed: true,
        };
        let ids = JobIds::new(serial);
        let span = tracing::info_span!("job", trace_id = %ids.trace_id, serial = ids.serial);
        let result = self.drive(&request).instrument(span).await;
        watch.armed = false;

        match result {
            Ok(outcome) => {
                info!(
                    document_id = %outcome.document_id,
                    size = outcome.size,
                    path = %outcome.saved_to.display(),
                    "job completed"
                );
                self.schedule_reset(serial);
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, serial, "job failed");
                if self.machine.current() != JobPhase::Error {
                    self.machine.apply(JobEvent::Failed {
                        message: e.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn drive(&self, request: &JobRequest) -> Result<JobOutcome, JobError> {
        let upload = UploadRequest {
            file: request.file.clone(),
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
            use_glossary: request.use_glossary,
        };

        let span = self.metrics.span(metric_names::UPLOAD_DONE);
        let receipt = match tokio::time::timeout(
            self.settings.upload_timeout,
            self.backend.upload(&upload),
        )
        .await
        {
            Err(_) => return Err(JobError::Upload("upload timed out".into())),
            Ok(Err(BackendError::TimedOut)) => {
                return Err(JobError::Upload("upload timed out".into()))
            }
            Ok(Err(e)) => return Err(JobError::Upload(describe(e))),
            Ok(Ok(receipt)) => receipt,
        };
        span.finish();

        info!(
            document_id = %receipt.document_id,
            has_glossary = receipt.has_glossary,
            "upload accepted"
        );
        let job = JobHandle::from(&receipt);
        self.machine.update(|s| {
            s.document_id = Some(receipt.document_id.clone());
            s.has_glossary = receipt.has_glossary;
        });
        self.machine.apply(JobEvent::Uploaded);

        self.poll_until_done(&job).await?;
        let bytes = self.download(&job).await?;

        let path = self
            .sink
            .save(&result_file_name(&request.file.name), &bytes)
            .await?;
        self.machine.apply(JobEvent::Downloaded);

        Ok(JobOutcome {
            document_id: job.document_id,
            saved_to: path,
            size: bytes.len(),
        })
    }

    async fn poll_until_done(&self, job: &JobHandle) -> Result<(), JobError> {
        let max = self.settings.max_attempts;
        for attempt in 1..=max {
            let span = self.metrics.span(metric_names::STATUS_POLL);
            let report = self
                .backend
                .status(job)
                .await
                .map_err(|e| JobError::StatusCheck(describe(e)))?;
            span.finish();

            debug!(
                attempt,
                status = %report.status,
                seconds_remaining = ?report.seconds_remaining,
                "status polled"
            );
            self.machine.update(|s| {
                s.attempts = attempt;
                s.seconds_remaining = report.seconds_remaining;
            });

            let server = ServerPhase::from_report(&report);
            if let ServerPhase::Unknown(raw) = &server {
                debug!(status = %raw, "unrecognised server phase, keeping current phase");
            }
            self.machine.apply(JobEvent::Status(server.clone()));

            match server {
                ServerPhase::Done => return Ok(()),
                ServerPhase::Error { message } => {
                    return Err(JobError::JobFailed(
                        message.unwrap_or_else(|| "translation failed".into()),
                    ))
                }
                _ => {}
            }

            if attempt < max {
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        }
        Err(JobError::Timeout { attempts: max })
    }

    async fn download(&self, job: &JobHandle) -> Result<Vec<u8>, JobError> {
        let span = self.metrics.span(metric_names::DOWNLOAD_DONE);
        let bytes = self
            .backend
            .result(job)
            .await
            .map_err(|e| JobError::Download(describe(e)))?;
        span.finish();
        if bytes.is_empty() {
            return Err(JobError::EmptyResult);
        }
        Ok(bytes)
    }

    fn schedule_reset(&self, serial: u64) {
        let machine = Arc::clone(&self.machine);
        let delay = self.settings.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            machine.reset_if_current(serial);
        });
    }
}

/// Lives for the duration of `start`; firing means the caller dropped the future.
struct WatchGuard {
    machine: Arc<JobStateMachine>,
    serial: u64,
    armed: bool,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if self.armed && self.machine.abandon_if_current(self.serial, ABANDONED) {
            warn!(serial = self.serial, "job abandoned before completion");
        }
    }
}

/// Backend message without the transport prefix when the server supplied one.
fn describe(e: BackendError) -> String {
    match e {
        BackendError::Status { message, .. } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::DocumentFile;
    use crate::job::sink::DirectorySink;
    use std::sync::atomic::Ordering;
    use tokio::time::Instant;

    fn settings() -> PollSettings {
        PollSettings::from(&ClientConfig::default())
    }

    fn poller(backend: Arc<MockBackend>, dir: &std::path::Path) -> JobPoller {
        JobPoller::new(
            backend,
            Arc::new(DirectorySink::new(dir)),
            Arc::new(MetricsRegistry::new()),
            settings(),
        )
    }

    fn handle(id: &str, key: &str) -> JobHandle {
        JobHandle {
            document_id: id.into(),
            document_key: key.into(),
        }
    }

    fn request(source: &str, use_glossary: bool) -> JobRequest {
        JobRequest {
            file: DocumentFile::new("report.pdf", vec![1; 64]),
            source_lang: source.into(),
            target_lang: "ZH".into(),
            use_glossary,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn glossary_with_auto_source_fails_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let p = poller(Arc::clone(&backend), tmp.path());

        let err = p.start(request("AUTO", true)).await.unwrap_err();
        assert!(matches!(err, JobError::Configuration(_)));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
        assert_eq!(p.machine().current(), JobPhase::Error);
        assert!(p.can_start());
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_file_is_rejected_before_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let p = poller(Arc::clone(&backend), tmp.path());

        let mut req = request("EN", false);
        req.file = DocumentFile::new("notes.txt", vec![1; 8]);
        let err = p.start(req).await.unwrap_err();
        assert!(matches!(err, JobError::Upload(_)));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_max_attempts() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let p = poller(Arc::clone(&backend), tmp.path());

        let started = Instant::now();
        let err = p.start(request("EN", false)).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, JobError::Timeout { attempts: 30 }));
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 30);
        assert_eq!(backend.result_calls.load(Ordering::SeqCst), 0);
        // 29 gaps of 2s between 30 polls.
        assert!(elapsed >= Duration::from_secs(58) && elapsed < Duration::from_secs(60));
        let snap = p.machine().snapshot();
        assert_eq!(snap.phase, JobPhase::Error);
        assert_eq!(snap.attempts, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_result_is_an_error_not_completion() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_statuses(&["done"]).with_result(Vec::new()));
        let p = poller(Arc::clone(&backend), tmp.path());

        let err = p.start(request("EN", false)).await.unwrap_err();
        assert!(matches!(err, JobError::EmptyResult));
        assert_eq!(backend.result_calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.machine().current(), JobPhase::Error);
        assert!(!tmp.path().join("translated_report.pdf").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn full_job_completes_then_resets_to_idle() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            MockBackend::new()
                .with_statuses(&["processing_document", "extracting_terms", "translating", "done"])
                .with_result(vec![9u8; 1024]),
        );
        let p = poller(Arc::clone(&backend), tmp.path());

        let outcome = p.start(request("EN", true)).await.unwrap();
        assert_eq!(outcome.size, 1024);
        assert_eq!(outcome.document_id, "doc-1");
        assert_eq!(outcome.saved_to, tmp.path().join("translated_report.pdf"));
        assert_eq!(std::fs::read(&outcome.saved_to).unwrap().len(), 1024);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 4);

        let snap = p.machine().snapshot();
        assert_eq!(snap.phase, JobPhase::Completed);
        assert_eq!(snap.attempts, 4);

        let first = handle("doc-1", "key-1");
        assert!(backend.status_handles.lock().iter().all(|h| *h == first));
        assert_eq!(*backend.result_handles.lock(), vec![first]);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(p.machine().current(), JobPhase::Completed);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(p.machine().current(), JobPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn each_job_polls_with_its_own_key() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_statuses(&["translating", "done"]));
        let p = poller(Arc::clone(&backend), tmp.path());

        p.start(request("EN", false)).await.unwrap();
        backend.push_status(Ok(crate::backend::StatusReport::new("done")));
        let second = p.start(request("EN", false)).await.unwrap();
        assert_eq!(second.document_id, "doc-2");

        assert_eq!(
            *backend.status_handles.lock(),
            vec![
                handle("doc-1", "key-1"),
                handle("doc-1", "key-1"),
                handle("doc-2", "key-2"),
            ]
        );
        assert_eq!(
            *backend.result_handles.lock(),
            vec![handle("doc-1", "key-1"), handle("doc-2", "key-2")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_start_reenables_trigger() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let p = Arc::new(poller(Arc::clone(&backend), tmp.path()));

        let runner = Arc::clone(&p);
        let watcher = tokio::spawn(async move { runner.start(request("EN", false)).await });
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(p.machine().current(), JobPhase::Translating);

        watcher.abort();
        assert!(watcher.await.unwrap_err().is_cancelled());

        let snap = p.machine().snapshot();
        assert_eq!(snap.phase, JobPhase::Error);
        assert_eq!(snap.error_detail.as_deref(), Some(ABANDONED));
        assert!(p.can_start());

        backend.push_status(Ok(crate::backend::StatusReport::new("done")));
        let outcome = p.start(request("EN", false)).await.unwrap();
        assert_eq!(outcome.document_id, "doc-2");
        assert_eq!(p.machine().current(), JobPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_phase_counts_as_attempt_and_keeps_phase() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_statuses(&["extracting_terms", "queued"]));
        backend.push_status(Err(BackendError::Status {
            code: 500,
            message: "Status check failed".into(),
        }));
        let p = Arc::new(poller(Arc::clone(&backend), tmp.path()));
        let mut rx = p.subscribe();

        let runner = Arc::clone(&p);
        let join = tokio::spawn(async move { runner.start(request("EN", false)).await });

        // After the second poll ("queued") the phase is still Extracting.
        loop {
            rx.changed().await.unwrap();
            let snap = rx.borrow().clone();
            if snap.attempts == 2 {
                assert_eq!(snap.phase, JobPhase::Extracting);
                break;
            }
        }

        let err = join.await.unwrap().unwrap_err();
        assert!(matches!(err, JobError::StatusCheck(ref m) if m == "Status check failed"));
        assert_eq!(p.machine().current(), JobPhase::Error);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_phase_carries_message() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        backend.push_status(Ok(crate::backend::StatusReport {
            status: "error".into(),
            message: Some("Character limit reached".into()),
            seconds_remaining: None,
        }));
        let p = poller(Arc::clone(&backend), tmp.path());

        let err = p.start(request("EN", false)).await.unwrap_err();
        assert!(matches!(err, JobError::JobFailed(ref m) if m == "Character limit reached"));
        let snap = p.machine().snapshot();
        assert_eq!(snap.phase, JobPhase::Error);
        assert_eq!(snap.error_detail.as_deref(), Some("Character limit reached"));
    }

    #[tokio::test(start_paused = true)]
    async fn upload_is_aborted_after_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_upload_delay(Duration::from_secs(600)));
        let p = poller(Arc::clone(&backend), tmp.path());

        let started = Instant::now();
        let err = p.start(request("EN", false)).await.unwrap_err();
        assert!(matches!(err, JobError::Upload(ref m) if m == "upload timed out"));
        assert_eq!(started.elapsed(), Duration::from_secs(180));
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_rejection_surfaces_server_message() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_upload_error(BackendError::Status {
            code: 413,
            message: "file too large".into(),
        }));
        let p = poller(Arc::clone(&backend), tmp.path());

        let err = p.start(request("EN", false)).await.unwrap_err();
        assert!(matches!(err, JobError::Upload(ref m) if m == "file too large"));
        assert_eq!(p.machine().snapshot().error_detail.as_deref(), Some("upload failed: file too large"));
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_while_running_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let p = Arc::new(poller(Arc::clone(&backend), tmp.path()));

        let runner = Arc::clone(&p);
        let first = tokio::spawn(async move { runner.start(request("EN", false)).await });
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(!p.can_start());
        let err = p.start(request("EN", false)).await.unwrap_err();
        assert!(matches!(err, JobError::Busy));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 1);

        // The first job keeps running to its own timeout.
        assert!(matches!(first.await.unwrap(), Err(JobError::Timeout { .. })));
    }
}
