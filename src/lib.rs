//! LingoFlow: client core for a document and text translation service.
//! Wires the REST backend, the document job poller, the debounced text
//! translator and persisted session choices behind one handle.

pub mod backend;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod job;
pub mod language;
pub mod metrics;
pub mod session;
pub mod translate;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use backend::http::HttpBackend;
use backend::{DocumentFile, TranslationBackend};
use config::ClientConfig;
use error::{JobError, SessionError, StartupError};
use job::{DirectorySink, JobOutcome, JobPoller, JobRequest, PollSettings};
use metrics::{MetricSummary, MetricsRegistry};
use session::{SessionState, SessionStore};
use translate::{DebouncedTranslator, TranslatorSettings};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter and `LINGOFLOW_LOG_FORMAT=json` selects JSON lines. Calling it twice
/// is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lingoflow=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let json = std::env::var("LINGOFLOW_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub struct LingoClient {
    poller: JobPoller,
    translator: DebouncedTranslator,
    metrics: Arc<MetricsRegistry>,
    store: SessionStore,
    document_target_lang: Mutex<String>,
}

impl LingoClient {
    /// Connect to the configured backend and restore the previous session.
    pub fn from_config(config: &ClientConfig) -> Result<Self, StartupError> {
        let backend = Arc::new(HttpBackend::new(config)?);
        let store = SessionStore::open(&config.session_db)?;
        info!(base_url = %config.base_url, "lingoflow client starting");
        Self::with_backend(config, backend, store)
    }

    pub fn with_backend(
        config: &ClientConfig,
        backend: Arc<dyn TranslationBackend>,
        store: SessionStore,
    ) -> Result<Self, StartupError> {
        let session = SessionState::load(&store)?;
        let metrics = Arc::new(MetricsRegistry::new());

        let poller = JobPoller::new(
            Arc::clone(&backend),
            Arc::new(DirectorySink::new(&config.download_dir)),
            Arc::clone(&metrics),
            PollSettings::from(config),
        );
        let translator = DebouncedTranslator::new(
            backend,
            Arc::clone(&metrics),
            &session,
            TranslatorSettings::from(config),
        );

        Ok(Self {
            poller,
            translator,
            metrics,
            store,
            document_target_lang: Mutex::new(session.document_target_lang),
        })
    }

    pub fn text(&self) -> &DebouncedTranslator {
        &self.translator
    }

    pub fn documents(&self) -> &JobPoller {
        &self.poller
    }

    pub fn document_target_language(&self) -> String {
        self.document_target_lang.lock().clone()
    }

    pub fn set_document_target_language(&self, lang: &str) -> Result<(), JobError> {
        if language::is_auto(lang) {
            return Err(JobError::Configuration(
                "target language cannot be auto-detect".into(),
            ));
        }
        *self.document_target_lang.lock() = lang.to_string();
        Ok(())
    }

    /// Translate a document into the current document target language.
    pub async fn translate_document(
        &self,
        file: DocumentFile,
        source_lang: &str,
        use_glossary: bool,
    ) -> Result<JobOutcome, JobError> {
        let request = JobRequest {
            file,
            source_lang: source_lang.to_string(),
            target_lang: self.document_target_language(),
            use_glossary,
        };
        self.poller.start(request).await
    }

    pub fn session(&self) -> SessionState {
        SessionState {
            document_target_lang: self.document_target_language(),
            ..self.translator.session()
        }
    }

    pub fn save_session(&self) -> Result<(), SessionError> {
        let state = self.session();
        state.save(&self.store)?;
        info!(
            source = %state.source_lang,
            target = %state.target_lang,
            document_target = %state.document_target_lang,
            "session saved"
        );
        Ok(())
    }

    pub fn metrics_summary(&self) -> HashMap<String, MetricSummary> {
        self.metrics.summary()
    }
}
