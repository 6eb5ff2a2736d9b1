use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::assistant::{Assistant, ChatInputs, ProjectRef, detect_fandom_context};
use crate::database::{DatabaseConnection, Repository};
use crate::glossary::{Category, GlossaryEntry, GlossaryStore, ImportStats, ImportStrategy, NewGlossaryEntry};
use crate::providers::models::{ModelInfo, ModelSource};
use crate::providers::{CompletionProvider, ModelCatalog, OpenRouter};
use crate::translation::{
    GeneratedGlossary, TranslationEvent, TranslationOptions, TranslationOrchestrator, TranslationOutcome,
    generate_glossary_entries,
};

// @module: Application controller wiring storage, provider and translation

/// Suffix inserted before the extension of translated files
const OUTPUT_LANGUAGE_TAG: &str = "en";

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    repository: Arc<Repository>,
    store: GlossaryStore,
    provider: Arc<dyn CompletionProvider>,
    catalog: Arc<ModelCatalog>,
    orchestrator: TranslationOrchestrator,
}

impl Controller {
    // @method: Create a controller on the configured database and OpenRouter
    pub fn with_config(config: Config) -> Result<Self> {
        let db = match &config.database_path {
            Some(path) => DatabaseConnection::new(path)?,
            None => DatabaseConnection::new_default()?,
        };
        match db.stats() {
            Ok(stats) => debug!("Database ready: {}", stats),
            Err(e) => warn!("Could not read database stats: {:#}", e),
        }
        let provider = Arc::new(OpenRouter::from_config(&config.openrouter));
        Ok(Self::with_parts(config, Arc::new(Repository::new(db)), provider))
    }

    /// Create a controller from explicit collaborators
    pub fn with_parts<P>(config: Config, repository: Arc<Repository>, provider: Arc<P>) -> Self
    where
        P: CompletionProvider + ModelSource + 'static,
    {
        let store = GlossaryStore::new(repository.clone());
        let catalog = Arc::new(ModelCatalog::new(provider.clone(), repository.clone()));
        let orchestrator = TranslationOrchestrator::new(provider.clone(), store.clone())
            .with_sink(repository.clone())
            .with_catalog(catalog.clone());

        Self {
            config,
            repository,
            store,
            provider,
            catalog,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &GlossaryStore {
        &self.store
    }

    fn project_id(&self) -> &str {
        &self.config.project.id
    }

    /// Translate a text file, showing progress; Ctrl-C cancels the job
    pub async fn translate_file(&self, input_file: &Path, output: Option<PathBuf>, force_overwrite: bool) -> Result<()> {
        let start_time = Instant::now();

        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let output_path = output.unwrap_or_else(|| output_path_for(input_file));
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, translation already exists at {:?} (use -f to force overwrite)", output_path);
            return Ok(());
        }

        let source_text = tokio::fs::read_to_string(input_file)
            .await
            .with_context(|| format!("Failed to read input file: {:?}", input_file))?;
        let options = TranslationOptions::from_config(&self.config);

        info!(
            "Translating {:?} with {} chunking",
            input_file, options.strategy
        );

        let progress_bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));

        let bar = progress_bar.clone();
        let observer = move |event: TranslationEvent| match event {
            TranslationEvent::Progress { percent, message } => {
                bar.set_position(u64::from(percent));
                bar.set_message(message);
            }
            TranslationEvent::Estimate(estimate) => {
                bar.println(format!(
                    "Estimated {} tokens (~${:.4}) with {}{}",
                    estimate.estimated_tokens,
                    estimate.estimated_cost,
                    estimate.model,
                    if estimate.is_estimate_error { ", pricing unavailable" } else { "" }
                ));
            }
            TranslationEvent::ChunkCompleted { index, total } => {
                debug!("Chunk {}/{} done", index + 1, total);
            }
            TranslationEvent::State(state) => debug!("Translation job {}", state),
            TranslationEvent::Partial { .. } => bar.tick(),
        };

        let translation = self.orchestrator.translate(&source_text, &options, &observer);
        tokio::pin!(translation);

        let mut cancel_requested = false;
        let result = loop {
            tokio::select! {
                result = &mut translation => break result,
                _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                    progress_bar.println("Cancelling translation...");
                    cancel_requested = self.orchestrator.cancel();
                }
            }
        };

        progress_bar.finish_and_clear();

        let outcome = result.map_err(|e| {
            error!("Translation failed: {}", e);
            anyhow!(e.user_message())
        })?;

        tokio::fs::write(&output_path, outcome.text())
            .await
            .with_context(|| format!("Failed to write translation: {:?}", output_path))?;

        match outcome {
            TranslationOutcome::Completed(done) => {
                info!(
                    "Translated {} chunks in {:.1}s: {:?}",
                    done.chunks,
                    start_time.elapsed().as_secs_f64(),
                    output_path
                );
                match done.verification {
                    Some(Ok(report)) => {
                        info!(
                            "Verification: {}% complete, {}% accurate",
                            report.completeness, report.accuracy
                        );
                        for missing in &report.missing_content {
                            warn!("Missing: {}", missing);
                        }
                        for issue in &report.issues {
                            warn!("{} -> {}: {} (suggestion: {})", issue.source_text, issue.translated_text, issue.issue, issue.suggestion);
                        }
                    }
                    Some(Err(e)) => warn!("Verification failed: {}", e.user_message()),
                    None => {}
                }
            }
            TranslationOutcome::Cancelled { chunks_translated, .. } => {
                warn!(
                    "Translation cancelled after {} chunks, partial output written to {:?}",
                    chunks_translated, output_path
                );
            }
        }

        Ok(())
    }

    /// Import a glossary JSON file into the active project
    pub async fn import_glossary(&self, path: &Path, strategy: ImportStrategy) -> Result<ImportStats> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read glossary file: {:?}", path))?;
        let stats = self.store.import_glossary(self.project_id(), &json, strategy).await?;
        Ok(stats)
    }

    /// Export the active project's glossary, to `path` when given
    pub async fn export_glossary(&self, path: Option<&Path>) -> Result<String> {
        let json = self.store.export_glossary(self.project_id()).await?;
        if let Some(path) = path {
            tokio::fs::write(path, &json)
                .await
                .with_context(|| format!("Failed to write glossary file: {:?}", path))?;
            info!("Glossary exported to {:?}", path);
        }
        Ok(json)
    }

    pub async fn list_glossary(&self) -> Result<Vec<GlossaryEntry>> {
        Ok(self.store.entries(self.project_id()).await?)
    }

    pub async fn add_glossary_entry(
        &self,
        chinese_term: &str,
        translation: &str,
        category: Category,
        notes: &str,
    ) -> Result<GlossaryEntry> {
        let entry = NewGlossaryEntry::new(self.project_id(), chinese_term, translation)
            .category(category)
            .notes(notes);
        Ok(self.store.add(entry).await?)
    }

    /// Extract glossary terms from a text file with the model
    pub async fn generate_glossary(
        &self,
        path: &Path,
        auto_add: bool,
        fandom: Option<&str>,
    ) -> Result<GeneratedGlossary> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read source file: {:?}", path))?;
        let fandom = fandom.unwrap_or_else(|| detect_fandom_context(&text));

        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Extracting glossary terms");
        spinner.enable_steady_tick(std::time::Duration::from_millis(120));

        let result = generate_glossary_entries(
            self.provider.as_ref(),
            &self.store,
            self.project_id(),
            &text,
            auto_add,
            fandom,
            &CancellationToken::new(),
        )
        .await;
        spinner.finish_and_clear();

        result.map_err(|e| anyhow!(e.user_message()))
    }

    /// Send one chat message; the history persists between runs
    pub async fn chat(&self, message: &str, input_file: Option<&Path>, clear_history: bool) -> Result<String> {
        let assistant = Assistant::new(self.provider.clone(), self.store.clone())
            .with_history_store(self.repository.clone());
        assistant.load_history().await;

        if clear_history {
            assistant.clear_history().await;
            if message.trim().is_empty() {
                return Ok("Chat history cleared.".to_string());
            }
        }

        let input_text = match input_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read input file: {:?}", path))?,
            None => String::new(),
        };
        let output_text = self
            .repository
            .load_output(self.project_id())
            .await
            .unwrap_or_else(|e| {
                warn!("Could not load the last translation: {:#}", e);
                None
            })
            .unwrap_or_default();

        let inputs = ChatInputs {
            current_tab: "chat".to_string(),
            project: Some(ProjectRef {
                id: self.config.project.id.clone(),
                name: self.config.project.name.clone(),
            }),
            input_text,
            output_text,
        };

        Ok(assistant.process_message(message, &inputs).await)
    }

    /// Models from the catalog, refreshed from the API when asked
    pub async fn list_models(&self, refresh: bool) -> Result<Vec<ModelInfo>> {
        self.catalog
            .get_available_models(refresh)
            .await
            .map_err(|e| anyhow!(e.user_message()))
    }
}

/// `chapter.txt` becomes `chapter.en.txt`
pub fn output_path_for(input_file: &Path) -> PathBuf {
    let stem = input_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "translation".to_string());
    let extension = input_file
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "txt".to_string());

    input_file.with_file_name(format!("{}.{}.{}", stem, OUTPUT_LANGUAGE_TAG, extension))
}
