//! reqwest client for the translation REST backend.
//! Connection pooling via a shared `reqwest::Client`, per-call timeouts,
//! error bodies decoded from `{detail: {code, message}}` / `{detail: "..."}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    JobHandle, StatusReport, TextTranslationResponse, TranslationBackend, UploadReceipt,
    UploadRequest,
};
use crate::config::ClientConfig;
use crate::error::BackendError;

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    upload_timeout: Duration,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            upload_timeout: config.upload_timeout,
            request_timeout: config.request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_job(&self, job: &JobHandle, action: &str) -> Result<reqwest::Response, BackendError> {
        let resp = self
            .http
            .post(self.url(&format!("/api/translate/{}/{}", job.document_id, action)))
            .query(&[("document_key", job.document_key.as_str())])
            .timeout(self.request_timeout)
            .send()
            .await?;
        ensure_success(resp).await
    }
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, BackendError> {
        let start = Instant::now();
        let part = Part::bytes(request.file.bytes.clone()).file_name(request.file.name.clone());
        let form = Form::new()
            .part("file", part)
            .text("source_lang", request.source_lang.clone())
            .text("target_lang", request.target_lang.clone())
            .text("use_glossary", request.use_glossary.to_string());

        let resp = self
            .http
            .post(self.url("/api/translate"))
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let receipt: UploadReceipt = resp.json().await.map_err(|e| BackendError::Decode(e.to_string()))?;

        debug!(
            document_id = %receipt.document_id,
            has_glossary = receipt.has_glossary,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upload accepted"
        );
        Ok(receipt)
    }

    async fn status(&self, job: &JobHandle) -> Result<StatusReport, BackendError> {
        let resp = self.post_job(job, "status").await?;
        resp.json::<StatusReport>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn result(&self, job: &JobHandle) -> Result<Vec<u8>, BackendError> {
        let resp = self.post_job(job, "download").await?;
        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }

    async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        let form = Form::new()
            .text("text", text.to_string())
            .text("target_lang", target_lang.to_string());

        let send = self
            .http
            .post(self.url("/api/translate/text"))
            .multipart(form)
            .timeout(self.request_timeout)
            .send();

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            resp = send => resp?,
        };
        let resp = ensure_success(resp).await?;

        let parsed: TextTranslationResponse = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            parsed = resp.json() => parsed.map_err(|e| BackendError::Decode(e.to_string()))?,
        };
        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| BackendError::Decode("empty translations array".into()))
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let code = status.as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(code, &body);
    warn!(status = code, message = %message, "backend call rejected");
    Err(BackendError::Status { code, message })
}

/// Pull a human-readable message out of a backend error body.
fn error_message(code: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let detail = value.get("detail");
        let found = detail
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .or_else(|| detail.and_then(|d| d.as_str()))
            .or_else(|| value.get("error").and_then(|e| e.as_str()))
            .or_else(|| value.get("message").and_then(|m| m.as_str()));
        if let Some(msg) = found {
            return msg.to_string();
        }
    }
    if code == 413 {
        return "file too large".to_string();
    }
    if body.trim().is_empty() {
        format!("HTTP {code}")
    } else {
        body.chars().take(200).collect()
    }
}
