//! Scripted in-process backend for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{JobHandle, StatusReport, TranslationBackend, UploadReceipt, UploadRequest};
use crate::error::BackendError;

pub(crate) struct MockBackend {
    pub upload_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
    pub translate_calls: Mutex<Vec<(String, String)>>,
    /// Handles received by `status` and `result`, in call order.
    pub status_handles: Mutex<Vec<JobHandle>>,
    pub result_handles: Mutex<Vec<JobHandle>>,
    upload_error: Mutex<Option<BackendError>>,
    upload_delay: Mutex<Duration>,
    statuses: Mutex<VecDeque<Result<StatusReport, BackendError>>>,
    result_body: Mutex<Vec<u8>>,
    translate_delays: Mutex<HashMap<String, Duration>>,
    translate_fails: AtomicBool,
    ignore_cancel: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            upload_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            result_calls: AtomicUsize::new(0),
            translate_calls: Mutex::new(Vec::new()),
            status_handles: Mutex::new(Vec::new()),
            result_handles: Mutex::new(Vec::new()),
            upload_error: Mutex::new(None),
            upload_delay: Mutex::new(Duration::ZERO),
            statuses: Mutex::new(VecDeque::new()),
            result_body: Mutex::new(vec![0u8; 16]),
            translate_delays: Mutex::new(HashMap::new()),
            translate_fails: AtomicBool::new(false),
            ignore_cancel: AtomicBool::new(false),
        }
    }

    /// Status replies in order; once exhausted every poll answers `translating`.
    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        *self.statuses.lock() = statuses.iter().map(|s| Ok(StatusReport::new(*s))).collect();
        self
    }

    pub fn push_status(&self, reply: Result<StatusReport, BackendError>) {
        self.statuses.lock().push_back(reply);
    }

    pub fn with_result(self, body: Vec<u8>) -> Self {
        *self.result_body.lock() = body;
        self
    }

    pub fn with_upload_error(self, err: BackendError) -> Self {
        *self.upload_error.lock() = Some(err);
        self
    }

    pub fn with_upload_delay(self, delay: Duration) -> Self {
        *self.upload_delay.lock() = delay;
        self
    }

    pub fn with_translate_delay(self, text: &str, delay: Duration) -> Self {
        self.translate_delays.lock().insert(text.to_string(), delay);
        self
    }

    /// Keep answering after cancellation, like a transport that cannot abort.
    pub fn ignoring_cancel(self) -> Self {
        self.ignore_cancel.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_translations(&self, fail: bool) {
        self.translate_fails.store(fail, Ordering::SeqCst);
    }

    pub fn translate_count(&self) -> usize {
        self.translate_calls.lock().len()
    }

    pub fn translated(text: &str, target_lang: &str) -> String {
        format!("[{target_lang}] {text}")
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn upload(&self, _request: &UploadRequest) -> Result<UploadReceipt, BackendError> {
        let n = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.upload_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.upload_error.lock().take() {
            return Err(err);
        }
        Ok(UploadReceipt {
            document_id: format!("doc-{n}"),
            document_key: format!("key-{n}"),
            has_glossary: false,
        })
    }

    async fn status(&self, job: &JobHandle) -> Result<StatusReport, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status_handles.lock().push(job.clone());
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusReport::new("translating")))
    }

    async fn result(&self, job: &JobHandle) -> Result<Vec<u8>, BackendError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        self.result_handles.lock().push(job.clone());
        Ok(self.result_body.lock().clone())
    }

    async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        self.translate_calls
            .lock()
            .push((text.to_string(), target_lang.to_string()));
        let delay = self.translate_delays.lock().get(text).copied();
        if let Some(delay) = delay {
            if self.ignore_cancel.load(Ordering::SeqCst) {
                tokio::time::sleep(delay).await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                }
            }
        }
        if self.translate_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                code: 500,
                message: "mock failure".into(),
            });
        }
        Ok(Self::translated(text, target_lang))
    }
}
