/*!
 * End-to-end controller tests on files, SQLite and the mock provider
 */

use std::fs;
use std::sync::Arc;

use quillsync::app_config::Config;
use quillsync::app_controller::Controller;
use quillsync::database::Repository;
use quillsync::glossary::{Category, ImportStrategy};
use quillsync::providers::mock::MockProvider;

use crate::common;

fn controller(provider: MockProvider) -> (Controller, Arc<Repository>) {
    let mut config = Config::default();
    config.project.id = "novel".to_string();
    config.project.name = "Martial Universe".to_string();

    let repository = Arc::new(Repository::new_in_memory().unwrap());
    let controller = Controller::with_parts(config, repository.clone(), Arc::new(provider));
    (controller, repository)
}

#[tokio::test]
async fn test_translate_file_withGlossary_shouldWriteTaggedOutput() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "chapter1.txt", &common::three_chapter_text()).unwrap();
    let provider = MockProvider::working();
    let (controller, repository) = controller(provider.clone());
    controller
        .add_glossary_entry("林动", "Lin Dong", Category::Character, "")
        .await
        .unwrap();

    controller.translate_file(&input, None, false).await.unwrap();

    let output = fs::read_to_string(dir.path().join("chapter1.en.txt")).unwrap();
    assert_eq!(output.matches("[TRANSLATED]").count(), 3);
    assert!(output.contains("Lin Dong走进了山谷"));
    assert!(!output.contains("林动"));
    assert_eq!(provider.request_count(), 3);
    assert_eq!(repository.load_output("novel").await.unwrap(), Some(output));
}

#[tokio::test]
async fn test_translate_file_withExistingOutput_shouldSkipUnlessForced() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "chapter2.txt", "你好").unwrap();
    let existing = common::create_test_file(dir.path(), "chapter2.en.txt", "old translation").unwrap();
    let provider = MockProvider::working();
    let (controller, _repository) = controller(provider.clone());

    controller.translate_file(&input, None, false).await.unwrap();
    assert_eq!(fs::read_to_string(&existing).unwrap(), "old translation");
    assert_eq!(provider.request_count(), 0);

    controller.translate_file(&input, None, true).await.unwrap();
    assert_eq!(fs::read_to_string(&existing).unwrap(), "[TRANSLATED] 你好");
}

#[tokio::test]
async fn test_translate_file_withExplicitOutput_shouldWriteThere() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "source.txt", "你好").unwrap();
    let target = dir.path().join("out").join("custom.txt");
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    let (controller, _repository) = controller(MockProvider::working());

    controller.translate_file(&input, Some(target.clone()), false).await.unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), "[TRANSLATED] 你好");
    assert!(!dir.path().join("source.en.txt").exists());
}

#[tokio::test]
async fn test_translate_file_withProviderFailure_shouldReturnFriendlyError() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "chapter3.txt", "你好").unwrap();
    let (controller, _repository) = controller(MockProvider::failing());

    let error = controller.translate_file(&input, None, false).await.unwrap_err();

    assert!(!error.to_string().is_empty());
    assert!(!dir.path().join("chapter3.en.txt").exists());
}

#[tokio::test]
async fn test_translate_file_withMissingInput_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let (controller, _repository) = controller(MockProvider::working());

    let result = controller
        .translate_file(&dir.path().join("missing.txt"), None, false)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_glossary_files_withExportThenImport_shouldRoundTripBetweenControllers() {
    let dir = common::create_temp_dir().unwrap();
    let file = dir.path().join("glossary.json");
    let (source, _repository) = controller(MockProvider::working());
    source
        .add_glossary_entry("林动", "Lin Dong", Category::Character, "Protagonist")
        .await
        .unwrap();
    source
        .add_glossary_entry("元婴期", "Nascent Soul Stage", Category::Concept, "")
        .await
        .unwrap();

    let json = source.export_glossary(Some(&file)).await.unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), json);

    let (target, _repository) = controller(MockProvider::working());
    let stats = target.import_glossary(&file, ImportStrategy::Merge).await.unwrap();
    assert_eq!(stats.added, 2);

    let entries = target.list_glossary().await.unwrap();
    let lin = entries.iter().find(|e| e.chinese_term == "林动").unwrap();
    assert_eq!(lin.notes, "Protagonist");
    assert_eq!(lin.project_id, "novel");
}

#[tokio::test]
async fn test_generate_glossary_withAutoAdd_shouldStoreTerms() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "chapter1.txt", &common::three_chapter_text()).unwrap();
    let provider = MockProvider::scripted([
        r#"[{"chineseTerm": "林动", "translation": "Lin Dong", "category": "character", "notes": ""}]"#,
    ]);
    let (controller, _repository) = controller(provider);

    let generated = controller.generate_glossary(&input, true, Some("")).await.unwrap();

    assert_eq!(generated.stats.added, 1);
    assert_eq!(controller.list_glossary().await.unwrap()[0].translation, "Lin Dong");
}

#[tokio::test]
async fn test_chat_withHistory_shouldPersistAndClear() {
    let (controller, _repository) = controller(MockProvider::working());

    let reply = controller.chat("add glossary 魔法 as magic", None, false).await.unwrap();
    assert!(reply.starts_with("✅ Successfully added"));
    assert_eq!(controller.list_glossary().await.unwrap().len(), 1);

    let cleared = controller.chat("", None, true).await.unwrap();
    assert_eq!(cleared, "Chat history cleared.");
}

#[tokio::test]
async fn test_list_models_withMockListing_shouldReturnCatalog() {
    let (controller, _repository) = controller(MockProvider::working());

    let models = controller.list_models(false).await.unwrap();

    assert_eq!(models.len(), 1);
    assert_eq!(models[0].id, "mock/translator");
    assert_eq!(models[0].name, "Mock Translator");
}
