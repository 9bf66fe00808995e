//! Document fetching.

use std::collections::HashMap;
use std::io;
use std::sync::RwLock;

use async_trait::async_trait;
use url::Url;

/// Errors that can occur while fetching a document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Not a local file path: {0}")]
    InvalidPath(Url),

    #[error("Failed to read {url}: {source}")]
    Io {
        url: Url,
        #[source]
        source: io::Error,
    },

    #[error("Document not found: {0}")]
    NotFound(Url),
}

/// Retrieves raw document markup.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Serves `file:` URLs from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

#[async_trait]
impl DocumentFetcher for FileFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        if url.scheme() != "file" {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|_| FetchError::InvalidPath(url.clone()))?;

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| FetchError::Io {
                url: url.clone(),
                source,
            })
    }
}

/// Serves documents registered in memory.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    documents: RwLock<HashMap<Url, String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the markup served for `url`.
    pub fn insert(&self, url: Url, markup: impl Into<String>) {
        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        documents.insert(url, markup.into());
    }

    pub fn with_document(self, url: Url, markup: impl Into<String>) -> Self {
        self.insert(url, markup);
        self
    }
}

#[async_trait]
impl DocumentFetcher for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.clone()))
    }
}
