//! Engine registry: named engines, a default, and a selection heuristic.
//!
//! The registry is populated once through [`EngineRegistryBuilder`] and then
//! frozen by [`EngineRegistryBuilder::build`]. The built [`EngineRegistry`]
//! has no mutating methods, so it can be shared behind an `Arc` across
//! concurrent conversions without locking.

use crate::config::MathpixConfig;
use crate::engine::mathpix::{MathpixEngine, MATHPIX_ENGINE};
use crate::engine::mock::{MockEngine, MOCK_ENGINE};
use crate::engine::{DocumentType, EngineInfo, RecognitionEngine};
use crate::error::Pdf2OcrError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name returned by [`EngineRegistry::suggest`] when nothing is registered.
pub const FALLBACK_ENGINE: &str = MOCK_ENGINE;

/// Mutable registration phase.
#[derive(Default)]
pub struct EngineRegistryBuilder {
    engines: BTreeMap<String, Arc<dyn RecognitionEngine>>,
    default: Option<String>,
}

impl EngineRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an engine. The first one registered becomes the default.
    /// Registering an existing name replaces that engine.
    pub fn register(mut self, name: impl Into<String>, engine: Arc<dyn RecognitionEngine>) -> Self {
        let name = name.into();
        debug!("Registering recognition engine '{}'", name);
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.engines.insert(name, engine);
        self
    }

    /// Mark a registered engine as the default.
    pub fn set_default(mut self, name: &str) -> Result<Self, Pdf2OcrError> {
        if !self.engines.contains_key(name) {
            return Err(Pdf2OcrError::EngineUnavailable {
                name: name.to_string(),
                available: join_names(self.engines.keys()),
            });
        }
        self.default = Some(name.to_string());
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> EngineRegistry {
        info!(
            "Engine registry ready: [{}], default: {}",
            join_names(self.engines.keys()),
            self.default.as_deref().unwrap_or("<none>")
        );
        EngineRegistry {
            engines: self.engines,
            default: self.default,
        }
    }
}

/// Read-only set of recognition engines.
pub struct EngineRegistry {
    engines: BTreeMap<String, Arc<dyn RecognitionEngine>>,
    default: Option<String>,
}

impl EngineRegistry {
    pub fn builder() -> EngineRegistryBuilder {
        EngineRegistryBuilder::new()
    }

    /// Standard set: `mock` always; `mathpix` (as default) when credentials
    /// are given.
    pub fn with_standard_engines(mathpix: Option<MathpixConfig>) -> Result<Self, Pdf2OcrError> {
        let mut builder =
            Self::builder().register(MOCK_ENGINE, Arc::new(MockEngine::new()) as Arc<dyn RecognitionEngine>);
        if let Some(config) = mathpix {
            builder = builder
                .register(MATHPIX_ENGINE, Arc::new(MathpixEngine::new(config)?))
                .set_default(MATHPIX_ENGINE)?;
        }
        Ok(builder.build())
    }

    /// Look up an engine; `""` resolves to the default.
    pub fn get(&self, name: &str) -> Result<Arc<dyn RecognitionEngine>, Pdf2OcrError> {
        let key = if name.is_empty() {
            self.default.as_deref().unwrap_or("")
        } else {
            name
        };
        self.engines
            .get(key)
            .cloned()
            .ok_or_else(|| Pdf2OcrError::EngineUnavailable {
                name: if name.is_empty() { "<default>" } else { name }.to_string(),
                available: join_names(self.engines.keys()),
            })
    }

    /// Recommend an engine. Total: always returns a name.
    ///
    /// Remote engines win regardless of document type or size (the
    /// alphabetically first one when several are registered, so the answer
    /// does not depend on registration order). Otherwise the default, then
    /// any registered engine, then [`FALLBACK_ENGINE`].
    pub fn suggest(&self, document_type: DocumentType, size_hint: u64) -> String {
        let choice = self
            .engines
            .iter()
            .find(|(_, engine)| !engine.info().is_local)
            .map(|(name, _)| name.clone())
            .or_else(|| self.default.clone())
            .or_else(|| self.engines.keys().next().cloned())
            .unwrap_or_else(|| FALLBACK_ENGINE.to_string());
        debug!(
            "Suggested engine '{}' for {} document ({} bytes)",
            choice, document_type, size_hint
        );
        choice
    }

    /// [`Self::suggest`] with the document type guessed from a file name.
    pub fn suggest_for_file(&self, file_name: &str, size: u64) -> String {
        self.suggest(DocumentType::guess(file_name), size)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }

    /// Descriptors of every registered engine, sorted by name.
    pub fn infos(&self) -> Vec<EngineInfo> {
        self.engines.values().map(|e| e.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names.map(String::as_str).collect::<Vec<_>>().join(", ")
}
