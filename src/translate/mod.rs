//! Interactive text translation.
//!
//! Edits are coalesced over a quiet window; language changes and swaps
//! translate immediately. Every request takes a new issuance generation, and
//! a response is applied only while its generation is still the latest, so
//! the display follows issuance order rather than arrival order.

pub mod cache;
pub mod history;
pub mod normalize;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::TranslationBackend;
use crate::cancellation::{GenerationGuard, TaskGeneration};
use crate::config::ClientConfig;
use crate::error::TranslateError;
use crate::language;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::session::SessionState;

use cache::TranslationCache;
use history::EditHistory;
use normalize::{ends_mid_word_break, is_translatable, normalize};

/// Message shown for any failure on the text path.
pub const FAILURE_MESSAGE: &str = "translation failed";

#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    /// Quiet window; earlier product revisions used 2-3 s.
    pub debounce: Duration,
    pub cache_capacity: usize,
}

impl From<&ClientConfig> for TranslatorSettings {
    fn from(c: &ClientConfig) -> Self {
        Self {
            debounce: c.debounce,
            cache_capacity: c.cache_capacity,
        }
    }
}

/// Everything the text panel renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslatorView {
    pub source_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub is_translating: bool,
    pub error: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub can_swap: bool,
}

/// How a scheduled translation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// The result was displayed.
    Applied { text: String, cached: bool },
    /// A newer request was issued first; nothing was displayed.
    Superseded,
    /// The backend call failed and the failure message was shown.
    Failed,
}

/// Handle to a scheduled or in-flight translation.
pub struct PendingTranslation {
    generation: u64,
    handle: JoinHandle<Settled>,
}

impl PendingTranslation {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn settled(self) -> Settled {
        self.handle.await.unwrap_or(Settled::Failed)
    }
}

struct EditorState {
    source_text: String,
    translated_text: String,
    source_lang: String,
    target_lang: String,
    is_translating: bool,
    error: Option<String>,
    history: EditHistory,
}

impl EditorState {
    fn view(&self) -> TranslatorView {
        TranslatorView {
            source_text: self.source_text.clone(),
            translated_text: self.translated_text.clone(),
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            is_translating: self.is_translating,
            error: self.error.clone(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            can_swap: !self.translated_text.is_empty() && !self.is_translating,
        }
    }
}

struct Inner {
    backend: Arc<dyn TranslationBackend>,
    cache: TranslationCache,
    generation: TaskGeneration,
    state: Mutex<EditorState>,
    settings: TranslatorSettings,
    metrics: Arc<MetricsRegistry>,
    tx: watch::Sender<TranslatorView>,
}

impl Inner {
    fn publish(&self, state: &EditorState) {
        let _ = self.tx.send(state.view());
    }
}

#[derive(Clone)]
pub struct DebouncedTranslator {
    inner: Arc<Inner>,
}

impl DebouncedTranslator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        metrics: Arc<MetricsRegistry>,
        session: &SessionState,
        settings: TranslatorSettings,
    ) -> Self {
        let state = EditorState {
            source_text: String::new(),
            translated_text: String::new(),
            source_lang: session.source_lang.clone(),
            target_lang: session.target_lang.clone(),
            is_translating: false,
            error: None,
            history: EditHistory::new(),
        };
        let (tx, _rx) = watch::channel(state.view());
        Self {
            inner: Arc::new(Inner {
                backend,
                cache: TranslationCache::new(settings.cache_capacity),
                generation: TaskGeneration::new(),
                state: Mutex::new(state),
                settings,
                metrics,
                tx,
            }),
        }
    }

    pub fn view(&self) -> TranslatorView {
        self.inner.state.lock().view()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranslatorView> {
        self.inner.tx.subscribe()
    }

    /// Language choices to persist at session end.
    pub fn session(&self) -> SessionState {
        let state = self.inner.state.lock();
        SessionState {
            source_lang: state.source_lang.clone(),
            target_lang: state.target_lang.clone(),
            ..SessionState::default()
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.inner.cache.len()
    }

    /// A live edit of the source text.
    pub fn on_text_changed(&self, raw: &str) -> Option<PendingTranslation> {
        self.inner.state.lock().history.record(raw);
        self.apply_edit(raw)
    }

    pub fn undo(&self) -> Option<PendingTranslation> {
        let text = self.inner.state.lock().history.undo().map(str::to_owned)?;
        self.apply_edit(&text)
    }

    pub fn redo(&self) -> Option<PendingTranslation> {
        let text = self.inner.state.lock().history.redo().map(str::to_owned)?;
        self.apply_edit(&text)
    }

    /// Empty both panes and the history; anything pending is dropped.
    pub fn clear(&self) {
        let _ = self.inner.generation.advance();
        let mut state = self.inner.state.lock();
        state.source_text.clear();
        state.translated_text.clear();
        state.error = None;
        state.is_translating = false;
        state.history.clear();
        self.inner.publish(&state);
    }

    pub fn set_source_language(&self, lang: &str) -> Result<Option<PendingTranslation>, TranslateError> {
        if language::find(lang).is_none() {
            return Err(TranslateError::InvalidInput(format!("unknown language: {lang}")));
        }
        {
            let mut state = self.inner.state.lock();
            if state.source_lang == lang {
                return Ok(None);
            }
            info!(from = %state.source_lang, to = %lang, "source language changed");
            state.source_lang = lang.to_string();
            self.inner.publish(&state);
        }
        Ok(self.retranslate_now())
    }

    pub fn set_target_language(&self, lang: &str) -> Result<Option<PendingTranslation>, TranslateError> {
        if language::is_auto(lang) {
            return Err(TranslateError::InvalidInput(
                "target language cannot be auto-detect".into(),
            ));
        }
        if language::find(lang).is_none() {
            return Err(TranslateError::InvalidInput(format!("unknown language: {lang}")));
        }
        {
            let mut state = self.inner.state.lock();
            if state.target_lang == lang {
                return Ok(None);
            }
            info!(from = %state.target_lang, to = %lang, "target language changed");
            state.target_lang = lang.to_string();
            self.inner.publish(&state);
        }
        Ok(self.retranslate_now())
    }

    /// Swap directions and translate the former result back. No-op without a result.
    pub fn swap(&self) -> Option<PendingTranslation> {
        let (text, lang, fallback) = {
            let mut state = self.inner.state.lock();
            if state.translated_text.is_empty() || state.is_translating {
                debug!("swap ignored, nothing translated yet");
                return None;
            }
            let new_source_lang = state.target_lang.clone();
            let new_target_lang = if language::is_auto(&state.source_lang) {
                language::first_concrete().to_string()
            } else {
                state.source_lang.clone()
            };
            let new_source_text = std::mem::take(&mut state.translated_text);
            let previous_source = std::mem::replace(&mut state.source_text, new_source_text.clone());

            state.source_lang = new_source_lang;
            state.target_lang = new_target_lang.clone();
            state.error = None;
            state.history.record(&new_source_text);
            self.inner.publish(&state);
            info!(source = %state.source_lang, target = %state.target_lang, "languages swapped");
            (new_source_text, new_target_lang, previous_source)
        };

        if !is_translatable(&text) {
            return None;
        }
        let guard = self.inner.generation.advance();
        Some(self.spawn_translation(guard, text, lang, Some(fallback)))
    }

    fn apply_edit(&self, raw: &str) -> Option<PendingTranslation> {
        {
            let mut state = self.inner.state.lock();
            state.source_text = raw.to_string();
            if !is_translatable(raw) {
                let _ = self.inner.generation.advance();
                state.translated_text.clear();
                state.is_translating = false;
                self.inner.publish(&state);
                return None;
            }
            self.inner.publish(&state);
        }
        if ends_mid_word_break(raw) {
            return None;
        }
        Some(self.schedule_debounced())
    }

    fn schedule_debounced(&self) -> PendingTranslation {
        let guard = {
            let mut state = self.inner.state.lock();
            let guard = self.inner.generation.advance();
            // Whatever was in flight is superseded; `run` sets the flag again.
            if state.is_translating {
                state.is_translating = false;
                self.inner.publish(&state);
            }
            guard
        };
        let generation = guard.my_generation();
        let this = self.clone();
        let debounce = self.inner.settings.debounce;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {}
                _ = guard.token().cancelled() => return Settled::Superseded,
            }
            // The text at the end of the quiet window, not at scheduling time.
            let (text, lang) = {
                let state = this.inner.state.lock();
                (state.source_text.clone(), state.target_lang.clone())
            };
            if !guard.should_continue() || !is_translatable(&text) {
                return Settled::Superseded;
            }
            this.run(guard, text, lang, None).await
        });

        PendingTranslation { generation, handle }
    }

    fn retranslate_now(&self) -> Option<PendingTranslation> {
        let (text, lang) = {
            let state = self.inner.state.lock();
            (state.source_text.clone(), state.target_lang.clone())
        };
        if !is_translatable(&text) {
            return None;
        }
        let guard = self.inner.generation.advance();
        Some(self.spawn_translation(guard, text, lang, None))
    }

    fn spawn_translation(
        &self,
        guard: GenerationGuard,
        text: String,
        lang: String,
        fallback: Option<String>,
    ) -> PendingTranslation {
        let generation = guard.my_generation();
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run(guard, text, lang, fallback).await });
        PendingTranslation { generation, handle }
    }

    /// Cache lookup, backend call, and a generation-checked apply.
    async fn run(
        &self,
        guard: GenerationGuard,
        raw: String,
        lang: String,
        fallback: Option<String>,
    ) -> Settled {
        let inner = &self.inner;
        let normalized = normalize(&raw);
        let key = TranslationCache::compute_key(&lang, &normalized);

        if let Some(hit) = inner.cache.get(&key) {
            inner.metrics.incr(metric_names::CACHE_HIT);
            return self.apply_result(&guard, hit, true);
        }
        inner.metrics.incr(metric_names::CACHE_MISS);

        {
            let mut state = inner.state.lock();
            if !guard.is_current() {
                return Settled::Superseded;
            }
            state.is_translating = true;
            inner.publish(&state);
        }

        let start = Instant::now();
        let result = inner
            .backend
            .translate_text(&normalized, &lang, guard.token())
            .await
            .map_err(TranslateError::from);

        match result {
            Ok(translated) => {
                inner
                    .metrics
                    .record(metric_names::TEXT_TRANSLATE_DONE, start.elapsed().as_micros() as f64);
                inner.cache.insert(key, translated.clone());
                self.apply_result(&guard, translated, false)
            }
            Err(TranslateError::Cancelled) => Settled::Superseded,
            Err(e) => {
                let mut state = inner.state.lock();
                if !guard.is_current() {
                    return Settled::Superseded;
                }
                warn!(error = %e, generation = guard.my_generation(), "text translation failed");
                state.is_translating = false;
                state.error = Some(FAILURE_MESSAGE.to_string());
                if let Some(previous) = fallback {
                    state.translated_text = previous;
                }
                inner.publish(&state);
                Settled::Failed
            }
        }
    }

    fn apply_result(&self, guard: &GenerationGuard, text: String, cached: bool) -> Settled {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !guard.is_current() {
            inner.metrics.incr(metric_names::STALE_DISCARDED);
            debug!(generation = guard.my_generation(), "stale translation discarded");
            return Settled::Superseded;
        }
        state.translated_text = text.clone();
        state.is_translating = false;
        state.error = None;
        inner.publish(&state);
        Settled::Applied { text, cached }
    }
}
