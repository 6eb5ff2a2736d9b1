/*!
 * Glossary workflows across the store, file exchange and AI generation
 */

use quillsync::glossary::{Category, ImportStrategy, NewGlossaryEntry};
use quillsync::providers::mock::MockProvider;
use quillsync::translation::generate_glossary_entries;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::common;

const GENERATED: &str = r#"```json
[
  {"chineseTerm": "林动", "translation": "Lin Dong", "category": "character", "notes": "Protagonist"},
  {"chineseTerm": "元婴期", "translation": "Nascent Soul Stage", "category": "Concept"},
  {"chineseTerm": "魔法", "translation": "sorcery", "category": "other", "notes": ""}
]
```"#;

async fn seeded_store() -> quillsync::glossary::GlossaryStore {
    let (_repo, store) = common::memory_store();
    store
        .add(NewGlossaryEntry::new("p1", "魔法", "magic").category(Category::Concept))
        .await
        .unwrap();
    store
        .add(NewGlossaryEntry::new("p1", "山谷", "valley").category(Category::Location))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_export_withEntries_shouldWriteCamelCaseArray() {
    let store = seeded_store().await;

    let exported = store.export_glossary("p1").await.unwrap();

    let value: Value = serde_json::from_str(&exported).unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        let object = item.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["category", "chineseTerm", "notes", "translation"]);
    }
}

#[tokio::test]
async fn test_import_withOwnExportUsingMerge_shouldSkipEverything() {
    let store = seeded_store().await;
    let exported = store.export_glossary("p1").await.unwrap();

    let stats = store.import_glossary("p1", &exported, ImportStrategy::Merge).await.unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.added, 0);
    assert_eq!(store.entries("p1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_import_withExportIntoOtherProject_shouldCopyEntries() {
    let store = seeded_store().await;
    let exported = store.export_glossary("p1").await.unwrap();

    let stats = store.import_glossary("p2", &exported, ImportStrategy::Merge).await.unwrap();

    assert_eq!(stats.added, 2);
    let copied = store.entries("p2").await.unwrap();
    assert!(copied.iter().any(|e| e.chinese_term == "山谷" && e.category == Category::Location));
}

#[tokio::test]
async fn test_import_withReplace_shouldDropPreviousEntries() {
    let store = seeded_store().await;
    let payload = r#"[{"chineseTerm": "魔法", "translation": "sorcery"}, {"chineseTerm": "剑", "translation": "sword"}]"#;

    let stats = store.import_glossary("p1", payload, ImportStrategy::Replace).await.unwrap();

    assert_eq!(stats.added, 2);
    let entries = store.entries("p1").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(!entries.iter().any(|e| e.chinese_term == "山谷"));
    let magic = entries.iter().find(|e| e.chinese_term == "魔法").unwrap();
    assert_eq!(magic.translation, "sorcery");
    assert_eq!(magic.category, Category::Other);
}

#[tokio::test]
async fn test_generate_withAutoAdd_shouldStoreOnlyNewTerms() {
    let store = seeded_store().await;
    let provider = MockProvider::scripted([GENERATED]);

    let generated = generate_glossary_entries(
        &provider,
        &store,
        "p1",
        &common::three_chapter_text(),
        true,
        "",
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(generated.proposed.len(), 3);
    assert_eq!(generated.stats.added, 2);
    assert_eq!(generated.stats.skipped, 1);
    assert_eq!(generated.added.len(), 2);

    let entries = store.entries("p1").await.unwrap();
    assert_eq!(entries.len(), 4);
    let stage = entries.iter().find(|e| e.chinese_term == "元婴期").unwrap();
    assert_eq!(stage.category, Category::Concept);
    let magic = entries.iter().find(|e| e.chinese_term == "魔法").unwrap();
    assert_eq!(magic.translation, "magic");
}

#[tokio::test]
async fn test_generate_withoutAutoAdd_shouldOnlyPropose() {
    let store = seeded_store().await;
    let provider = MockProvider::scripted([GENERATED]);

    let generated = generate_glossary_entries(
        &provider,
        &store,
        "p1",
        "林动修炼魔法",
        false,
        "Martial Universe",
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(generated.proposed.len(), 3);
    assert!(generated.added.is_empty());
    assert_eq!(generated.stats.skipped, 1);
    assert_eq!(store.entries("p1").await.unwrap().len(), 2);

    let prompt = &provider.requests()[0].prompt;
    assert!(prompt.contains("\"Martial Universe\" fandom/universe"));
    assert!(prompt.ends_with("林动修炼魔法"));
}

#[tokio::test]
async fn test_generate_withUnconfiguredProvider_shouldFailBeforeRequest() {
    let store = seeded_store().await;
    let provider = MockProvider::working().unconfigured();

    let result = generate_glossary_entries(
        &provider,
        &store,
        "p1",
        "林动",
        true,
        "",
        &CancellationToken::new(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(provider.request_count(), 0);
}

#[test]
fn test_import_fromBlockingCaller_shouldStoreEntries() {
    let (_repo, store) = common::memory_store();
    let payload = r#"[{"chineseTerm": "龙", "translation": "dragon", "category": "item"}]"#;

    let entries = tokio_test::block_on(async {
        store.import_glossary("p1", payload, ImportStrategy::Merge).await.unwrap();
        store.entries("p1").await.unwrap()
    });

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, Category::Item);
}
