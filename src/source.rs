//! Document sources: where PDF bytes come from.
//!
//! The orchestrator only needs [`DocumentSource::fetch`]; `search` lets a
//! caller find an identifier first. Two implementations ship with the crate:
//!
//! * [`MemorySource`]: a fixed in-memory set, for tests and embedding.
//! * [`LocalSource`]: files under a root directory, plus `http(s)://`
//!   identifiers downloaded on demand.

use crate::error::Pdf2OcrError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub modified_time: Option<SystemTime>,
}

/// External supplier of document bytes.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Raw bytes of a document, or [`Pdf2OcrError::NotFound`].
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, Pdf2OcrError>;

    /// Documents whose name contains `query` (case-insensitive).
    async fn search(&self, query: &str) -> Result<Vec<DocumentEntry>, Pdf2OcrError>;
}

fn name_matches(name: &str, query: &str) -> bool {
    query.is_empty() || name.to_lowercase().contains(&query.to_lowercase())
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Fixed set of named documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    docs: BTreeMap<String, (String, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under `id` with display name `name`.
    pub fn with_document(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.docs.insert(id.into(), (name.into(), bytes));
        self
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, Pdf2OcrError> {
        self.docs
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| Pdf2OcrError::NotFound { id: id.to_string() })
    }

    async fn search(&self, query: &str) -> Result<Vec<DocumentEntry>, Pdf2OcrError> {
        Ok(self
            .docs
            .iter()
            .filter(|(_, (name, _))| name_matches(name, query))
            .map(|(id, (name, bytes))| DocumentEntry {
                id: id.clone(),
                name: name.clone(),
                size: bytes.len() as u64,
                modified_time: None,
            })
            .collect())
    }
}

// ── Local files and URLs ─────────────────────────────────────────────────

/// Documents under a root directory; ids are paths relative to the root.
/// Ids starting with `http://` or `https://` are downloaded instead.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    download_timeout: Duration,
}

/// Check if the identifier looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            download_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Resolve an id to a path inside the root; ids escaping it are unknown.
    fn resolve(&self, id: &str) -> Result<PathBuf, Pdf2OcrError> {
        let rel = Path::new(id);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if id.is_empty() || escapes {
            return Err(Pdf2OcrError::NotFound { id: id.to_string() });
        }
        Ok(self.root.join(rel))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, Pdf2OcrError> {
        info!("Downloading PDF from: {}", url);
        let client = reqwest::Client::builder()
            .timeout(self.download_timeout)
            .build()
            .map_err(|e| Pdf2OcrError::Http {
                url: url.to_string(),
                detail: e.to_string(),
            })?;

        let response = client.get(url).send().await.map_err(|e| Pdf2OcrError::Http {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Pdf2OcrError::NotFound { id: url.to_string() });
        }
        if !response.status().is_success() {
            return Err(Pdf2OcrError::Http {
                url: url.to_string(),
                detail: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| Pdf2OcrError::Http {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DocumentSource for LocalSource {
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, Pdf2OcrError> {
        if is_url(id) {
            return self.download(id).await;
        }
        let path = self.resolve(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Pdf2OcrError::NotFound { id: id.to_string() })
            }
            Err(e) => Err(Pdf2OcrError::Internal(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<DocumentEntry>, Pdf2OcrError> {
        let mut hits = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                Pdf2OcrError::Internal(format!("Failed to list '{}': {}", dir.display(), e))
            })?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Pdf2OcrError::Internal(e.to_string()))?
            {
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| Pdf2OcrError::Internal(e.to_string()))?;
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let is_pdf = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false);
                let name = entry.file_name().to_string_lossy().to_string();
                if !is_pdf || !name_matches(&name, query) {
                    continue;
                }
                let id = path
                    .strip_prefix(&self.root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                hits.push(DocumentEntry {
                    id,
                    name,
                    size: meta.len(),
                    modified_time: meta.modified().ok(),
                });
            }
        }
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }
}
