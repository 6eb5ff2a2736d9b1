/*!
 * Tests for the glossary store rules on top of SQLite
 */

use quillsync::errors::GlossaryError;
use quillsync::glossary::{Category, ImportStrategy, NewGlossaryEntry, apply_glossary};

use crate::common;

#[tokio::test]
async fn test_add_withValidEntry_shouldStoreAndList() {
    let (_repo, store) = common::memory_store();

    let stored = store
        .add(
            NewGlossaryEntry::new("p1", "林动", "Lin Dong")
                .category(Category::Character)
                .notes("Protagonist"),
        )
        .await
        .unwrap();

    let entries = store.entries("p1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, stored.id);
    assert_eq!(entries[0].category, Category::Character);
    assert_eq!(entries[0].notes, "Protagonist");
    assert!(store.entries("p2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_withDuplicateTerm_shouldFailAndKeepOriginal() {
    let (_repo, store) = common::memory_store();
    store.add(NewGlossaryEntry::new("p1", "魔法", "magic")).await.unwrap();

    let result = store.add(NewGlossaryEntry::new("p1", "魔法", "sorcery")).await;

    assert!(matches!(result, Err(GlossaryError::Duplicate { term }) if term == "魔法"));
    let entries = store.entries("p1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].translation, "magic");
}

#[tokio::test]
async fn test_add_withSameTermInOtherProject_shouldSucceed() {
    let (_repo, store) = common::memory_store();
    store.add(NewGlossaryEntry::new("p1", "魔法", "magic")).await.unwrap();

    assert!(store.add(NewGlossaryEntry::new("p2", "魔法", "sorcery")).await.is_ok());
}

#[tokio::test]
async fn test_add_withMissingFields_shouldFailValidation() {
    let (_repo, store) = common::memory_store();

    for entry in [
        NewGlossaryEntry::new("", "魔法", "magic"),
        NewGlossaryEntry::new("p1", " ", "magic"),
        NewGlossaryEntry::new("p1", "魔法", ""),
    ] {
        assert!(matches!(store.add(entry).await, Err(GlossaryError::Validation(_))));
    }
    assert!(store.entries("p1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_withRenamedTerm_shouldRejectCollision() {
    let (_repo, store) = common::memory_store();
    store.add(NewGlossaryEntry::new("p1", "魔法", "magic")).await.unwrap();
    let mut second = store.add(NewGlossaryEntry::new("p1", "剑", "sword")).await.unwrap();

    second.chinese_term = "魔法".to_string();
    assert!(matches!(
        store.update(second.clone()).await,
        Err(GlossaryError::Duplicate { .. })
    ));

    second.chinese_term = "剑".to_string();
    second.translation = "blade".to_string();
    let updated = store.update(second).await.unwrap();
    assert_eq!(updated.translation, "blade");

    let entries = store.entries("p1").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.translation == "blade"));
}

#[tokio::test]
async fn test_update_withUnknownId_shouldBeNotFound() {
    let (_repo, store) = common::memory_store();
    let ghost = NewGlossaryEntry::new("p1", "鬼", "ghost").into_entry();

    assert!(matches!(store.update(ghost).await, Err(GlossaryError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_batch_withIds_shouldRemoveOnlyThose() {
    let (_repo, store) = common::memory_store();
    let a = store.add(NewGlossaryEntry::new("p1", "一", "one")).await.unwrap();
    let b = store.add(NewGlossaryEntry::new("p1", "二", "two")).await.unwrap();
    store.add(NewGlossaryEntry::new("p1", "三", "three")).await.unwrap();

    store.delete_batch(&[a.id, b.id]).await.unwrap();
    store.delete(uuid::Uuid::new_v4()).await.unwrap();

    let entries = store.entries("p1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].chinese_term, "三");
}

#[tokio::test]
async fn test_import_withInvalidPayload_shouldFailFormat() {
    let (_repo, store) = common::memory_store();

    assert!(matches!(
        store.import_glossary("p1", "not json", ImportStrategy::Merge).await,
        Err(GlossaryError::Format(_))
    ));
    assert!(matches!(
        store.import_glossary("p1", r#"{"chineseTerm": "魔法"}"#, ImportStrategy::Merge).await,
        Err(GlossaryError::Format(_))
    ));
}

#[tokio::test]
async fn test_import_withMixedItems_shouldCountEachOutcome() {
    let (_repo, store) = common::memory_store();
    store.add(NewGlossaryEntry::new("p1", "魔法", "magic")).await.unwrap();

    let json = r#"[
        {"chineseTerm": "魔法", "translation": "sorcery"},
        {"chineseTerm": "剑", "translation": "sword", "category": "item"},
        {"chineseTerm": "剑", "translation": "blade"},
        {"chineseTerm": "", "translation": "nothing"},
        {"translation": "no term"},
        {"chineseTerm": "宗门", "translation": "sect", "category": "faction"}
    ]"#;
    let stats = store.import_glossary("p1", json, ImportStrategy::Merge).await.unwrap();

    assert_eq!(stats.total, 6);
    assert_eq!(stats.added, 2);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.invalid, 2);

    let entries = store.entries("p1").await.unwrap();
    let sect = entries.iter().find(|e| e.chinese_term == "宗门").unwrap();
    assert_eq!(sect.category, Category::Other);
    let magic = entries.iter().find(|e| e.chinese_term == "魔法").unwrap();
    assert_eq!(magic.translation, "magic");
}

#[tokio::test]
async fn test_stored_entries_shouldDriveSubstitution() {
    let (_repo, store) = common::memory_store();
    store.add(NewGlossaryEntry::new("p1", "林", "Lin")).await.unwrap();
    store.add(NewGlossaryEntry::new("p1", "林动", "Lin Dong")).await.unwrap();

    let entries = store.entries("p1").await.unwrap();
    let text = apply_glossary("林动和林", &entries).unwrap();

    assert_eq!(text, "Lin Dong和Lin");
}
