/*!
 * Tests for the two-tier model cache
 */

use std::sync::Arc;

use quillsync::providers::ModelCatalog;
use quillsync::providers::mock::MockProvider;
use quillsync::providers::models::{DurableCache, MODELS_CACHE_KEY, MODELS_CACHE_TTL_MS, MemoryCache};
use serde_json::{Value, json};

use crate::common::{self, ManualClock};

const START: i64 = 1_700_000_000_000;

fn listing(id: &str) -> Option<Value> {
    Some(json!({"data": [{"id": id, "name": id, "pricing": {"prompt": "0.000001", "completion": "0.000002"}}]}))
}

fn new_catalog(provider: &MockProvider, durable: Arc<MemoryCache>, clock: Arc<ManualClock>) -> ModelCatalog {
    ModelCatalog::with_clock(Arc::new(provider.clone()), durable, clock)
}

#[tokio::test]
async fn test_catalog_withinTtl_shouldServeCachedModels() {
    let provider = MockProvider::working().with_models(listing("vendor/first"));
    let clock = ManualClock::at(START);
    let catalog = new_catalog(&provider, Arc::new(MemoryCache::new()), clock.clone());

    let first = catalog.get_available_models(false).await.unwrap();
    assert_eq!(first[0].id, "vendor/first");

    // The listing changes, the cache does not
    let _ = provider.clone().with_models(listing("vendor/second"));
    clock.advance(MODELS_CACHE_TTL_MS - 1);
    assert_eq!(catalog.get_available_models(false).await.unwrap()[0].id, "vendor/first");

    clock.advance(1);
    assert_eq!(catalog.get_available_models(false).await.unwrap()[0].id, "vendor/second");
}

#[tokio::test]
async fn test_catalog_withForceRefresh_shouldFetchAgain() {
    let provider = MockProvider::working().with_models(listing("vendor/first"));
    let catalog = new_catalog(&provider, Arc::new(MemoryCache::new()), ManualClock::at(START));

    catalog.get_available_models(false).await.unwrap();
    let _ = provider.clone().with_models(listing("vendor/second"));

    assert_eq!(catalog.get_available_models(true).await.unwrap()[0].id, "vendor/second");
}

#[tokio::test]
async fn test_catalog_withFreshDurableCache_shouldSkipFetch() {
    let provider = MockProvider::working().with_models(listing("vendor/first"));
    let durable = Arc::new(MemoryCache::new());
    new_catalog(&provider, durable.clone(), ManualClock::at(START))
        .get_available_models(false)
        .await
        .unwrap();
    assert!(durable.get(MODELS_CACHE_KEY).await.unwrap().is_some());

    // A new process with the same durable store and a failing API
    let _ = provider.clone().with_models(None);
    let restarted = new_catalog(&provider, durable, ManualClock::at(START + 1000));

    assert_eq!(restarted.get_available_models(false).await.unwrap()[0].id, "vendor/first");
}

#[tokio::test]
async fn test_catalog_withStaleCacheAndFailingFetch_shouldFallBack() {
    let provider = MockProvider::working().with_models(listing("vendor/first"));
    let clock = ManualClock::at(START);
    let catalog = new_catalog(&provider, Arc::new(MemoryCache::new()), clock.clone());
    catalog.get_available_models(false).await.unwrap();

    let _ = provider.clone().with_models(None);
    clock.advance(MODELS_CACHE_TTL_MS * 2);

    let models = catalog.get_available_models(false).await.unwrap();
    assert_eq!(models[0].id, "vendor/first");
    assert!(catalog.get_available_models(true).await.is_ok());
}

#[tokio::test]
async fn test_catalog_withNoCacheAndFailingFetch_shouldFail() {
    let provider = MockProvider::working().with_models(None);
    let catalog = new_catalog(&provider, Arc::new(MemoryCache::new()), ManualClock::at(START));

    assert!(catalog.get_available_models(false).await.is_err());
}

#[tokio::test]
async fn test_catalog_withSqliteDurableStore_shouldPersistAcrossCatalogs() {
    let (repository, _store) = common::memory_store();
    let provider = MockProvider::working().with_models(listing("vendor/first"));

    ModelCatalog::with_clock(Arc::new(provider.clone()), repository.clone(), ManualClock::at(START))
        .get_available_models(false)
        .await
        .unwrap();
    let _ = provider.clone().with_models(None);

    let restarted = ModelCatalog::with_clock(Arc::new(provider), repository, ManualClock::at(START + 5));
    let found = restarted.find_model("vendor/first").await.unwrap();

    assert!(found.is_some());
    assert!(restarted.find_model("vendor/missing").await.unwrap().is_none());
}
