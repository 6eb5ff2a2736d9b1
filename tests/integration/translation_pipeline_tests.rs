/*!
 * Integration tests for orchestrated translation jobs.
 *
 * Jobs run against the mock provider with a SQLite-backed glossary, output
 * sink and model catalog.
 */

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quillsync::errors::{ProviderError, TranslationError};
use quillsync::glossary::NewGlossaryEntry;
use quillsync::providers::ModelCatalog;
use quillsync::providers::mock::MockProvider;
use quillsync::translation::{
    ChunkingStrategy, JobState, TranslationEvent, TranslationOptions, TranslationOrchestrator, TranslationOutcome,
};

use crate::common;

const REPORT: &str = r#"{"completeness": 100, "accuracy": 92, "missingContent": [], "issues": []}"#;

fn progress_of(events: &[TranslationEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            TranslationEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_translate_withGlossaryAndVerify_shouldSubstituteSaveAndVerify() {
    let (repository, store) = common::memory_store();
    store.add(NewGlossaryEntry::new("p1", "魔法", "magic")).await.unwrap();
    let provider = MockProvider::scripted(["Magic is strong.", REPORT]);
    let orchestrator = TranslationOrchestrator::new(Arc::new(provider.clone()), store).with_sink(repository.clone());

    let options = TranslationOptions::new("p1").auto_verify(true);
    let outcome = orchestrator.translate("魔法很强", &options, &|_| {}).await.unwrap();

    let TranslationOutcome::Completed(done) = outcome else {
        panic!("translation should complete");
    };
    assert_eq!(done.translation, "Magic is strong.");
    assert_eq!(done.chunks, 1);
    let report = done.verification.expect("verification requested").unwrap();
    assert_eq!(report.accuracy, 92);
    assert!(report.is_clean());

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prompt.ends_with("magic很强"));
    assert_eq!(requests[0].temperature, 0.3);
    assert_eq!(requests[0].max_tokens, 4000);
    assert!(requests[1].prompt.contains("Chinese Text:\n魔法很强"));
    assert!(requests[1].prompt.ends_with("Glossary Terms to Check:\n魔法: magic"));

    assert_eq!(
        repository.load_output("p1").await.unwrap().as_deref(),
        Some("Magic is strong.")
    );
}

#[tokio::test]
async fn test_translate_withGlossaryDisabled_shouldSendSourceUnchanged() {
    let (_repository, store) = common::memory_store();
    store.add(NewGlossaryEntry::new("p1", "魔法", "magic")).await.unwrap();
    let provider = MockProvider::working();
    let orchestrator = TranslationOrchestrator::new(Arc::new(provider.clone()), store);

    let options = TranslationOptions::new("p1")
        .apply_glossary(false)
        .instructions("Use British spelling.");
    orchestrator.translate("魔法很强", &options, &|_| {}).await.unwrap();

    let prompt = &provider.requests()[0].prompt;
    assert!(prompt.starts_with("Use British spelling.\n\n"));
    assert!(prompt.ends_with("魔法很强"));
}

#[tokio::test]
async fn test_translate_withThreeChapters_shouldReportOrderedProgress() {
    let (_repository, store) = common::memory_store();
    let orchestrator = TranslationOrchestrator::new(Arc::new(MockProvider::working()), store);
    let events = Mutex::new(Vec::new());

    let options = TranslationOptions::new("p1").strategy(ChunkingStrategy::Chapter);
    let outcome = orchestrator
        .translate(&common::three_chapter_text(), &options, &|e| events.lock().push(e))
        .await
        .unwrap();

    let events = events.into_inner();
    assert_eq!(progress_of(&events), vec![5, 10, 38, 66, 95, 95, 100]);
    assert_eq!(events.last(), Some(&TranslationEvent::State(JobState::Completed)));

    let translation = outcome.text();
    let first = translation.find("第1章").unwrap();
    let second = translation.find("第2章").unwrap();
    let third = translation.find("第3章").unwrap();
    assert!(first < second && second < third);
    assert_eq!(translation.matches("[TRANSLATED]").count(), 3);

    // Streaming updates always carry the chunks already translated
    let last_partial = events
        .iter()
        .filter_map(|e| match e {
            TranslationEvent::Partial { text } => Some(text.clone()),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(last_partial, translation);
}

#[tokio::test]
async fn test_translate_withCatalog_shouldPriceTheEstimate() {
    let (repository, store) = common::memory_store();
    let provider = MockProvider::working();
    let catalog = Arc::new(ModelCatalog::new(Arc::new(provider.clone()), repository));
    let orchestrator = TranslationOrchestrator::new(Arc::new(provider), store).with_catalog(catalog);
    let events = Mutex::new(Vec::new());

    orchestrator
        .translate("魔法很强", &TranslationOptions::new("p1"), &|e| events.lock().push(e))
        .await
        .unwrap();

    let estimate = events
        .into_inner()
        .into_iter()
        .find_map(|e| match e {
            TranslationEvent::Estimate(estimate) => Some(estimate),
            _ => None,
        })
        .unwrap();
    assert_eq!(estimate.estimated_tokens, 202);
    assert_eq!(estimate.model, "Mock Translator");
    assert!(!estimate.is_estimate_error);
    assert!((estimate.estimated_cost - 202.0 * 3.0 / 1_000_000.0).abs() < 1e-12);
}

#[tokio::test]
async fn test_translate_withFailingCatalog_shouldUseFallbackEstimate() {
    let (repository, store) = common::memory_store();
    let provider = MockProvider::working().with_models(None);
    let catalog = Arc::new(ModelCatalog::new(Arc::new(provider.clone()), repository));
    let orchestrator = TranslationOrchestrator::new(Arc::new(provider), store).with_catalog(catalog);

    let outcome = orchestrator
        .translate("魔法很强", &TranslationOptions::new("p1"), &|_| {})
        .await
        .unwrap();

    let TranslationOutcome::Completed(done) = outcome else {
        panic!("translation should complete");
    };
    assert!(done.estimate.is_estimate_error);
    assert_eq!(done.estimate.estimated_cost, 0.0);
    assert_eq!(done.estimate.estimated_tokens, 2 + 200);
}

#[tokio::test]
async fn test_cancel_afterFirstChunk_shouldKeepCompletedChunks() {
    let (repository, store) = common::memory_store();
    let provider = MockProvider::working();
    let orchestrator = Arc::new(
        TranslationOrchestrator::new(Arc::new(provider.clone()), store).with_sink(repository.clone()),
    );
    let handle = orchestrator.clone();
    let states = Mutex::new(Vec::new());
    let observer = |event: TranslationEvent| match event {
        TranslationEvent::ChunkCompleted { index: 0, .. } => {
            assert!(handle.cancel());
        }
        TranslationEvent::State(state) => states.lock().push(state),
        _ => {}
    };

    let options = TranslationOptions::new("p1").strategy(ChunkingStrategy::Chapter);
    let outcome = orchestrator
        .translate(&common::three_chapter_text(), &options, &observer)
        .await
        .unwrap();

    match outcome {
        TranslationOutcome::Cancelled {
            partial,
            chunks_translated,
        } => {
            assert_eq!(chunks_translated, 1);
            assert!(partial.starts_with("[TRANSLATED] 第1章"));
            assert!(!partial.contains("第2章"));
        }
        other => panic!("expected a cancelled outcome, got {:?}", other),
    }
    assert_eq!(provider.request_count(), 1);
    assert_eq!(states.lock().last(), Some(&JobState::Cancelled));
    assert!(!orchestrator.is_running());
    assert!(repository.load_output("p1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_translate_whileRunning_shouldBeBusyUntilCancelled() {
    let (_repository, store) = common::memory_store();
    let provider = MockProvider::slow(500);
    let orchestrator = Arc::new(TranslationOrchestrator::new(Arc::new(provider.clone()), store));

    let running = orchestrator.clone();
    let job = tokio::spawn(async move {
        running
            .translate(&common::three_chapter_text(), &TranslationOptions::new("p1"), &|_| {})
            .await
    });

    // Progress is stable once the first chunk request is in flight
    while provider.request_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let before = orchestrator.progress();
    assert_eq!(before, Some(10));

    let second = orchestrator
        .translate("你好", &TranslationOptions::new("p1"), &|_| {})
        .await;
    assert!(matches!(second, Err(TranslationError::Busy)));
    assert_eq!(orchestrator.progress(), before);
    assert_eq!(provider.request_count(), 1);

    assert!(orchestrator.cancel());
    let outcome = job.await.unwrap().unwrap();
    assert!(matches!(outcome, TranslationOutcome::Cancelled { chunks_translated: 0, .. }));
    assert!(!orchestrator.is_running());
    assert!(orchestrator.progress().is_none());
}

#[tokio::test]
async fn test_translate_withFailureMidway_shouldFailAndRelease() {
    let (repository, store) = common::memory_store();
    let provider = MockProvider::scripted(["first chapter done"]);
    provider.push_error(ProviderError::RateLimitExceeded("slow down".to_string()));
    let orchestrator = TranslationOrchestrator::new(Arc::new(provider), store).with_sink(repository.clone());

    let options = TranslationOptions::new("p1").strategy(ChunkingStrategy::Chapter);
    let result = orchestrator
        .translate(&common::three_chapter_text(), &options, &|_| {})
        .await;

    let error = result.unwrap_err();
    assert!(matches!(
        error,
        TranslationError::Provider(ProviderError::RateLimitExceeded(_))
    ));
    assert!(error.user_message().contains("Rate limit"));
    assert!(!orchestrator.is_running());
    assert!(repository.load_output("p1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_translate_withIntermittentProvider_shouldFailThenRecover() {
    let (repository, store) = common::memory_store();
    let provider = MockProvider::intermittent(2);
    let orchestrator =
        TranslationOrchestrator::new(Arc::new(provider.clone()), store).with_sink(repository.clone());
    let options = TranslationOptions::new("p1").strategy(ChunkingStrategy::Chapter);

    let first = orchestrator
        .translate(&common::three_chapter_text(), &options, &|_| {})
        .await;
    assert!(matches!(
        first,
        Err(TranslationError::Provider(ProviderError::ApiError { status_code: 503, .. }))
    ));
    assert_eq!(provider.request_count(), 2);
    assert!(!orchestrator.is_running());

    // Every second request fails, so the third one goes through
    let second = orchestrator.translate("你好", &options, &|_| {}).await;
    assert!(matches!(second, Ok(TranslationOutcome::Completed(_))));
    assert!(repository.load_output("p1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_translate_withBlankText_shouldReportNoContent() {
    let (_repository, store) = common::memory_store();
    let orchestrator = TranslationOrchestrator::new(Arc::new(MockProvider::working()), store);

    let result = orchestrator
        .translate("   \n\n ", &TranslationOptions::new("p1"), &|_| {})
        .await;

    assert!(matches!(result, Err(TranslationError::NoContent)));
    assert!(!orchestrator.is_running());
}
