/*!
 * Model metadata and the two-tier model list cache.
 *
 * The model list is kept in memory and in a durable key/value store, each
 * valid for 24 hours. When a refresh fails, any cached copy is served, even a
 * stale one.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProviderError;

/// Durable cache key of the serialized model list
pub const MODELS_CACHE_KEY: &str = "openrouter_models_cache";

/// Durable cache key of the fetch time in epoch milliseconds
pub const MODELS_TIMESTAMP_KEY: &str = "openrouter_models_timestamp";

/// Freshness window of both cache tiers
pub const MODELS_CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

const PREMIUM_FAMILIES: &[&str] = &[
    "gpt-4",
    "claude-3-opus",
    "claude-3.5",
    "claude-3-7",
    "claude-opus",
    "o1",
    "gemini-1.5-pro",
    "gemini-2.5-pro",
];

const ECONOMY_FAMILIES: &[&str] = &[
    "mini", "haiku", "flash", "llama", "mistral", "qwen", "gemma", "phi", "free",
];

/// Price/quality tier of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Premium,
    Balanced,
    Economy,
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModelCategory::Premium => "premium",
            ModelCategory::Balanced => "balanced",
            ModelCategory::Economy => "economy",
        };
        write!(f, "{}", label)
    }
}

/// Price per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt: f64,
    pub completion: f64,
}

/// A model offered by the completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub context_length: Option<u64>,
    pub provider: String,
    pub category: ModelCategory,
}

/// Category from the model id and name, premium families checked first
pub fn categorize(id: &str, name: &str) -> ModelCategory {
    let haystack = format!("{} {}", id.to_lowercase(), name.to_lowercase());

    if PREMIUM_FAMILIES.iter().any(|f| haystack.contains(f)) {
        ModelCategory::Premium
    } else if ECONOMY_FAMILIES.iter().any(|f| haystack.contains(f)) {
        ModelCategory::Economy
    } else {
        ModelCategory::Balanced
    }
}

/// Capitalized vendor prefix of a model id (`anthropic/...` → `Anthropic`)
pub fn provider_label(id: &str) -> String {
    let vendor = id.split('/').next().unwrap_or_default();
    let mut chars = vendor.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Unknown".to_string(),
    }
}

/// Display name with prompt/completion prices
pub fn pricing_label(model: &ModelInfo) -> String {
    format!(
        "{} ({:.4}/{:.4})",
        model.name, model.pricing.prompt, model.pricing.completion
    )
}

/// Sort by category, then provider, then name
pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.provider.cmp(&b.provider))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Turn a raw model listing into sorted, text-capable models
///
/// Accepts a top-level array or an object with a `data` or `models` array;
/// anything else yields an empty list.
pub fn normalize_models(raw: &Value) -> Vec<ModelInfo> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(map) => match map
            .get("data")
            .and_then(Value::as_array)
            .or_else(|| map.get("models").and_then(Value::as_array))
        {
            Some(items) => items,
            None => {
                warn!("Unexpected model list format, treating as empty");
                return Vec::new();
            }
        },
        _ => {
            warn!("Unexpected model list format, treating as empty");
            return Vec::new();
        }
    };

    let mut models: Vec<ModelInfo> = items
        .iter()
        .filter(|item| is_text_capable(item))
        .filter_map(model_from_value)
        .collect();
    sort_models(&mut models);

    debug!("Normalized {} of {} listed models", models.len(), items.len());
    models
}

fn is_text_capable(item: &Value) -> bool {
    match item.get("capabilities").and_then(Value::as_array) {
        Some(caps) => caps
            .iter()
            .filter_map(Value::as_str)
            .any(|c| c == "chat" || c == "completion"),
        None => item.is_object(),
    }
}

fn model_from_value(item: &Value) -> Option<ModelInfo> {
    let id = item.get("id").and_then(Value::as_str)?.to_string();
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .unwrap_or(&id)
        .to_string();
    let pricing = item
        .get("pricing")
        .map(|p| Pricing {
            prompt: number(p.get("prompt")),
            completion: number(p.get("completion")),
        })
        .unwrap_or_default();

    Some(ModelInfo {
        provider: provider_label(&id),
        category: categorize(&id, &name),
        context_length: item.get("context_length").and_then(Value::as_u64),
        pricing,
        name,
        id,
    })
}

fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Durable string key/value storage
#[async_trait]
pub trait DurableCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Process-local key/value storage
#[derive(Debug, Default)]
pub struct MemoryCache {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableCache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Where the raw model listing comes from
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn fetch_models(&self) -> Result<Value, ProviderError>;
}

#[derive(Debug, Clone)]
struct CachedModels {
    models: Vec<ModelInfo>,
    fetched_at: i64,
}

/// Cached view of the available models
pub struct ModelCatalog {
    source: Arc<dyn ModelSource>,
    durable: Arc<dyn DurableCache>,
    clock: Arc<dyn Clock>,
    memory: RwLock<Option<CachedModels>>,
}

impl fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("cached", &self.memory.read().as_ref().map(|c| c.models.len()))
            .finish_non_exhaustive()
    }
}

impl ModelCatalog {
    pub fn new(source: Arc<dyn ModelSource>, durable: Arc<dyn DurableCache>) -> Self {
        Self::with_clock(source, durable, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn ModelSource>,
        durable: Arc<dyn DurableCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            durable,
            clock,
            memory: RwLock::new(None),
        }
    }

    /// Available models, from cache when fresh unless `force_refresh`
    pub async fn get_available_models(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<ModelInfo>, ProviderError> {
        let now = self.clock.now_millis();

        if !force_refresh {
            if let Some(cached) = self.memory_copy().filter(|c| is_fresh(c.fetched_at, now)) {
                debug!("Using {} models from memory cache", cached.models.len());
                return Ok(cached.models);
            }

            if let Some(cached) = self.durable_copy().await.filter(|c| is_fresh(c.fetched_at, now)) {
                debug!("Using {} models from durable cache", cached.models.len());
                *self.memory.write() = Some(cached.clone());
                return Ok(cached.models);
            }
        }

        match self.source.fetch_models().await {
            Ok(raw) => {
                let models = normalize_models(&raw);
                info!("Fetched {} text models", models.len());
                self.store(models.clone(), now).await;
                Ok(models)
            }
            Err(e) => {
                warn!("Failed to fetch models: {}", e);

                if let Some(cached) = self.memory_copy().filter(|c| !c.models.is_empty()) {
                    info!("Using cached models as fallback after fetch error");
                    return Ok(cached.models);
                }
                if let Some(cached) = self.durable_copy().await.filter(|c| !c.models.is_empty()) {
                    info!("Using stored models as fallback after fetch error");
                    *self.memory.write() = Some(cached.clone());
                    return Ok(cached.models);
                }

                Err(e)
            }
        }
    }

    /// Look a model up by id
    pub async fn find_model(&self, id: &str) -> Result<Option<ModelInfo>, ProviderError> {
        let models = self.get_available_models(false).await?;
        Ok(models.into_iter().find(|m| m.id == id))
    }

    fn memory_copy(&self) -> Option<CachedModels> {
        self.memory.read().clone()
    }

    async fn durable_copy(&self) -> Option<CachedModels> {
        let data = match self.durable.get(MODELS_CACHE_KEY).await {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                warn!("Error reading model cache, will fetch from API: {}", e);
                return None;
            }
        };
        let fetched_at = match self.durable.get(MODELS_TIMESTAMP_KEY).await {
            Ok(Some(ts)) => ts.trim().parse::<i64>().ok()?,
            _ => return None,
        };

        match serde_json::from_str::<Vec<ModelInfo>>(&data) {
            Ok(models) => Some(CachedModels { models, fetched_at }),
            Err(e) => {
                warn!("Ignoring corrupt model cache: {}", e);
                None
            }
        }
    }

    async fn store(&self, models: Vec<ModelInfo>, now: i64) {
        match serde_json::to_string(&models) {
            Ok(json) => {
                let saved = async {
                    self.durable.set(MODELS_CACHE_KEY, &json).await?;
                    self.durable.set(MODELS_TIMESTAMP_KEY, &now.to_string()).await
                };
                if let Err(e) = saved.await {
                    warn!("Failed to save models to durable cache: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize models: {}", e),
        }

        *self.memory.write() = Some(CachedModels {
            models,
            fetched_at: now,
        });
    }
}

fn is_fresh(fetched_at: i64, now: i64) -> bool {
    now - fetched_at < MODELS_CACHE_TTL_MS
}
