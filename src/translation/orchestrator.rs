/*!
 * Translation job orchestration.
 *
 * A job runs through `Estimating`, one `Translating` step per chunk and
 * `Finalizing` before it ends `Completed`, `Cancelled` or `Failed`. Chunks
 * are translated strictly in order, one request at a time, and appended to
 * the accumulated result.
 *
 * Only one job may run at a time. The running job is represented by a
 * `JobHandle` stored in the orchestrator; a drop guard clears it on every
 * exit path so a new job can always be started afterwards.
 */

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app_config::Config;
use crate::errors::TranslationError;
use crate::glossary::{GlossaryEntry, GlossaryStore, apply_glossary};
use crate::providers::{CompletionProvider, CompletionRequest, ModelCatalog};
use crate::translation::chunker::{ChunkingStrategy, DEFAULT_CHUNK_SIZE, chunk_text};
use crate::translation::estimate::{
    TokenEstimate, estimate_tokens_and_cost, estimate_with_catalog, fallback_estimate,
};
use crate::translation::prompts::translation_prompt;
use crate::translation::verification::{VerificationResult, verify_translation};

/// Temperature for chunk translation
pub const TRANSLATION_TEMPERATURE: f32 = 0.3;

/// Completion budget per chunk
pub const TRANSLATION_MAX_TOKENS: u32 = 4000;

/// Separator between translated chunks
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Where finished translations are persisted
#[async_trait]
pub trait TranslationSink: Send + Sync {
    /// Store the final text of a project's translation
    async fn save_output(&self, project_id: &str, content: &str) -> anyhow::Result<()>;
}

/// Settings for one translation job
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOptions {
    pub project_id: String,
    /// Prepended to every chunk prompt
    pub instructions: String,
    pub strategy: ChunkingStrategy,
    pub chunk_size: usize,
    pub apply_glossary: bool,
    pub auto_verify: bool,
    /// Overrides the provider's configured model
    pub model: Option<String>,
}

impl TranslationOptions {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            instructions: String::new(),
            strategy: ChunkingStrategy::Auto,
            chunk_size: DEFAULT_CHUNK_SIZE,
            apply_glossary: true,
            auto_verify: false,
            model: None,
        }
    }

    /// Options taken from the project and chunking sections of the config
    pub fn from_config(config: &Config) -> Self {
        let model = Some(config.openrouter.model.clone()).filter(|m| !m.trim().is_empty());
        Self {
            project_id: config.project.id.clone(),
            instructions: config.project.instructions.clone(),
            strategy: config.chunking.strategy,
            chunk_size: config.chunking.chunk_size,
            apply_glossary: config.project.apply_glossary,
            auto_verify: config.project.auto_verify,
            model,
        }
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn apply_glossary(mut self, apply: bool) -> Self {
        self.apply_glossary = apply;
        self
    }

    pub fn auto_verify(mut self, verify: bool) -> Self {
        self.auto_verify = verify;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Lifecycle of a translation job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Estimating,
    Translating { chunk: usize, total: usize },
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Estimating => write!(f, "estimating"),
            JobState::Translating { chunk, total } => write!(f, "translating chunk {}/{}", chunk, total),
            JobState::Finalizing => write!(f, "finalizing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Cancelled => write!(f, "cancelled"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Notifications sent to the job observer
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationEvent {
    State(JobState),
    Progress { percent: u8, message: String },
    Estimate(TokenEstimate),
    /// Accumulated translation including the streaming tail of the current chunk
    Partial { text: String },
    ChunkCompleted { index: usize, total: usize },
}

/// A finished translation
#[derive(Debug)]
pub struct CompletedTranslation {
    pub translation: String,
    pub estimate: TokenEstimate,
    pub chunks: usize,
    /// Present when verification ran
    pub verification: Option<Result<VerificationResult, TranslationError>>,
}

/// How a job ended when it did not fail
#[derive(Debug)]
pub enum TranslationOutcome {
    Completed(CompletedTranslation),
    /// Chunks translated before the cancel request are kept
    Cancelled { partial: String, chunks_translated: usize },
}

impl TranslationOutcome {
    /// The translated text, complete or partial
    pub fn text(&self) -> &str {
        match self {
            TranslationOutcome::Completed(done) => &done.translation,
            TranslationOutcome::Cancelled { partial, .. } => partial,
        }
    }
}

/// The running job
#[derive(Debug)]
struct JobHandle {
    id: Uuid,
    cancel: CancellationToken,
    progress: Arc<AtomicU8>,
}

/// Clears the job slot when the job ends, however it ends
struct JobGuard<'a> {
    slot: &'a Mutex<Option<JobHandle>>,
    id: Uuid,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|job| job.id == self.id) {
            *slot = None;
        }
        debug!("Released translation job {}", self.id);
    }
}

/// Runs translation jobs, one at a time
pub struct TranslationOrchestrator {
    provider: Arc<dyn CompletionProvider>,
    store: GlossaryStore,
    sink: Option<Arc<dyn TranslationSink>>,
    catalog: Option<Arc<ModelCatalog>>,
    job: Mutex<Option<JobHandle>>,
}

impl fmt::Debug for TranslationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationOrchestrator")
            .field("provider", &self.provider)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl TranslationOrchestrator {
    pub fn new(provider: Arc<dyn CompletionProvider>, store: GlossaryStore) -> Self {
        Self {
            provider,
            store,
            sink: None,
            catalog: None,
            job: Mutex::new(None),
        }
    }

    /// Persist finished translations through `sink`
    pub fn with_sink(mut self, sink: Arc<dyn TranslationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Price estimates with models from `catalog`
    pub fn with_catalog(mut self, catalog: Arc<ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn is_running(&self) -> bool {
        self.job.lock().is_some()
    }

    /// Progress of the running job, if any
    pub fn progress(&self) -> Option<u8> {
        self.job
            .lock()
            .as_ref()
            .map(|job| job.progress.load(Ordering::SeqCst))
    }

    /// Cancel the running job; returns false when nothing is running
    pub fn cancel(&self) -> bool {
        match self.job.lock().as_ref() {
            Some(job) => {
                info!("Cancelling translation job {}", job.id);
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Translate `source_text`, reporting events to `observer`
    pub async fn translate(
        &self,
        source_text: &str,
        options: &TranslationOptions,
        observer: &(dyn Fn(TranslationEvent) + Send + Sync),
    ) -> Result<TranslationOutcome, TranslationError> {
        let (job_id, cancel, progress, model) = {
            let mut slot = self.job.lock();
            if slot.is_some() {
                return Err(TranslationError::Busy);
            }

            let model = self.resolve_model(options)?;

            let job = JobHandle {
                id: Uuid::new_v4(),
                cancel: CancellationToken::new(),
                progress: Arc::new(AtomicU8::new(0)),
            };
            let ids = (job.id, job.cancel.clone(), job.progress.clone(), model);
            *slot = Some(job);
            ids
        };
        let _guard = JobGuard {
            slot: &self.job,
            id: job_id,
        };
        info!("Starting translation job {} for project {}", job_id, options.project_id);

        let report = |percent: u8, message: String| {
            progress.store(percent, Ordering::SeqCst);
            observer(TranslationEvent::Progress { percent, message });
        };

        let result = self
            .run_job(source_text, options, &model, &cancel, observer, &report)
            .await;

        match &result {
            Ok(TranslationOutcome::Completed(_)) => {
                observer(TranslationEvent::State(JobState::Completed));
                info!("Translation job {} completed", job_id);
            }
            Ok(TranslationOutcome::Cancelled { chunks_translated, .. }) => {
                observer(TranslationEvent::State(JobState::Cancelled));
                info!(
                    "Translation job {} cancelled after {} chunk(s)",
                    job_id, chunks_translated
                );
            }
            Err(e) => {
                observer(TranslationEvent::State(JobState::Failed));
                error!("Translation job {} failed: {}", job_id, e);
            }
        }

        result
    }

    fn resolve_model(&self, options: &TranslationOptions) -> Result<String, TranslationError> {
        if !self.provider.is_configured() {
            return Err(TranslationError::Config(
                "OpenRouter API key is not configured".to_string(),
            ));
        }

        options
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.provider.default_model())
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| TranslationError::Config("No model selected".to_string()))
    }

    async fn run_job(
        &self,
        source_text: &str,
        options: &TranslationOptions,
        model: &str,
        cancel: &CancellationToken,
        observer: &(dyn Fn(TranslationEvent) + Send + Sync),
        report: &(dyn Fn(u8, String) + Send + Sync),
    ) -> Result<TranslationOutcome, TranslationError> {
        let glossary = if options.apply_glossary || options.auto_verify {
            self.load_glossary(&options.project_id).await
        } else {
            Vec::new()
        };

        let processed = if options.apply_glossary {
            substitute_or_keep(source_text, &glossary)
        } else {
            source_text.to_string()
        };

        let chunks = chunk_text(&processed, options.strategy, options.chunk_size);
        if chunks.is_empty() {
            return Err(TranslationError::NoContent);
        }
        let total = chunks.len();
        report(5, format!("Preparing to translate {} chunks", total));

        observer(TranslationEvent::State(JobState::Estimating));
        let estimate = self.estimate(&processed, model).await;
        report(10, format!("Estimated tokens: {}", estimate.estimated_tokens));
        observer(TranslationEvent::Estimate(estimate.clone()));

        let mut accumulated = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(TranslationOutcome::Cancelled {
                    partial: accumulated,
                    chunks_translated: index,
                });
            }

            observer(TranslationEvent::State(JobState::Translating {
                chunk: index + 1,
                total,
            }));
            debug!("Translating chunk {}/{} ({} chars)", index + 1, total, chunk.chars().count());

            let request = CompletionRequest::new(translation_prompt(chunk, &options.instructions))
                .model(model)
                .temperature(TRANSLATION_TEMPERATURE)
                .max_tokens(TRANSLATION_MAX_TOKENS);

            let translated = {
                let previous = accumulated.as_str();
                let on_delta = |partial: &str| {
                    observer(TranslationEvent::Partial {
                        text: join_chunk(previous, partial),
                    });
                };
                self.provider.complete_streaming(request, cancel, &on_delta).await
            };

            match translated {
                Ok(text) => {
                    accumulated = join_chunk(&accumulated, &text);
                    let percent = 10 + (85 * (index + 1) / total) as u8;
                    report(
                        percent,
                        format!("Translated chunk {} of {}", index + 1, total),
                    );
                    observer(TranslationEvent::ChunkCompleted { index, total });
                }
                Err(e) if e.is_user_cancellation() || cancel.is_cancelled() => {
                    return Ok(TranslationOutcome::Cancelled {
                        partial: accumulated,
                        chunks_translated: index,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        observer(TranslationEvent::State(JobState::Finalizing));
        report(95, "Finalizing translation".to_string());

        match &self.sink {
            Some(sink) => {
                if let Err(e) = sink.save_output(&options.project_id, &accumulated).await {
                    warn!("Failed to save translation output: {:#}", e);
                }
            }
            None => debug!("No output sink configured, translation not persisted"),
        }

        let verification = if options.auto_verify {
            report(97, "Verifying translation".to_string());
            let result = verify_translation(
                self.provider.as_ref(),
                model,
                source_text,
                &accumulated,
                &glossary,
                cancel,
            )
            .await;
            if let Err(e) = &result {
                warn!("Translation verification failed: {}", e);
            }
            Some(result)
        } else {
            None
        };

        report(100, "Translation complete".to_string());

        Ok(TranslationOutcome::Completed(CompletedTranslation {
            translation: accumulated,
            estimate,
            chunks: total,
            verification,
        }))
    }

    async fn load_glossary(&self, project_id: &str) -> Vec<GlossaryEntry> {
        match self.store.entries(project_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not load glossary, translating without it: {}", e);
                Vec::new()
            }
        }
    }

    async fn estimate(&self, text: &str, model: &str) -> TokenEstimate {
        let Some(catalog) = &self.catalog else {
            return estimate_tokens_and_cost(text, None, model);
        };

        match estimate_with_catalog(catalog, text, model).await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!("Error estimating tokens and cost: {}", e);
                fallback_estimate(text, model)
            }
        }
    }
}

fn substitute_or_keep(text: &str, glossary: &[GlossaryEntry]) -> String {
    if glossary.is_empty() {
        return text.to_string();
    }
    match apply_glossary(text, glossary) {
        Ok(processed) => {
            debug!("Applied {} glossary terms", glossary.len());
            processed
        }
        Err(e) => {
            warn!("Glossary substitution failed, translating unmodified text: {}", e);
            text.to_string()
        }
    }
}

fn join_chunk(accumulated: &str, chunk: &str) -> String {
    if accumulated.is_empty() {
        chunk.to_string()
    } else {
        format!("{}{}{}", accumulated, CHUNK_SEPARATOR, chunk)
    }
}
