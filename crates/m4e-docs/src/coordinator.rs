//! Cache-then-network document delivery.
//!
//! [`FetchCoordinator::request`] answers from the [`DocumentStore`] when it
//! can, in the same call. Otherwise it starts a remote fetch; the results
//! are collected with [`FetchCoordinator::next_ready`], written through to
//! the cache and handed to the `document ready` listeners.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::FetchError;
use crate::store::DocumentStore;

/// Remote document service.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Downloads the current version of a document.
    async fn fetch(&self, document_id: &str) -> Result<Document, FetchError>;
}

/// A requested document, delivered from the cache or the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReady {
    pub document_id: String,
    pub etag: String,
    /// `None` when the fetch failed.
    pub document: Option<Document>,
}

/// How [`FetchCoordinator::request`] was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Served from the cache; listeners have already been called.
    Cached(Document),
    /// A remote fetch is in flight.
    Fetching,
}

type FetchResult = (String, String, Result<Document, FetchError>);

/// Orchestrates cache lookups and remote fetches.
pub struct FetchCoordinator<F> {
    store: DocumentStore,
    fetcher: Arc<F>,
    pending: FuturesUnordered<BoxFuture<'static, FetchResult>>,
    in_flight: HashSet<(String, String)>,
    listeners: Vec<Box<dyn FnMut(&DocumentReady) + Send>>,
}

impl<F> FetchCoordinator<F>
where
    F: DocumentFetcher + 'static,
{
    pub fn new(store: DocumentStore, fetcher: F) -> Self {
        Self {
            store,
            fetcher: Arc::new(fetcher),
            pending: FuturesUnordered::new(),
            in_flight: HashSet::new(),
            listeners: Vec::new(),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    /// Number of fetches still in flight.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Registers a listener for delivered documents.
    pub fn on_document_ready<L>(&mut self, listener: L)
    where
        L: FnMut(&DocumentReady) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Requests a document.
    ///
    /// A cache hit is delivered before this returns. A miss starts a remote
    /// fetch unless one for the same document id and ETag is already running.
    /// Requests for another document id always get their own fetch and their
    /// own [`DocumentReady`], even when the ETag matches.
    pub fn request(&mut self, document_id: &str, etag: &str) -> Delivery {
        if let Some(document) = self.store.lookup(document_id, etag) {
            self.notify(&DocumentReady {
                document_id: document_id.to_string(),
                etag: etag.to_string(),
                document: Some(document.clone()),
            });
            return Delivery::Cached(document);
        }

        if !self
            .in_flight
            .insert((document_id.to_string(), etag.to_string()))
        {
            debug!(document_id, etag, "fetch already in flight");
            return Delivery::Fetching;
        }

        debug!(document_id, etag, "fetching document");
        let fetcher = Arc::clone(&self.fetcher);
        let document_id = document_id.to_string();
        let etag = etag.to_string();
        self.pending.push(Box::pin(async move {
            let result = fetcher.fetch(&document_id).await;
            (document_id, etag, result)
        }));
        Delivery::Fetching
    }

    /// Waits for the next remote fetch to finish and delivers it.
    ///
    /// Returns `None` when no fetch is in flight.
    pub async fn next_ready(&mut self) -> Option<DocumentReady> {
        let (document_id, etag, result) = self.pending.next().await?;
        self.in_flight.remove(&(document_id.clone(), etag.clone()));

        let document = match result {
            Ok(document) => {
                if !self.store.store(&document) {
                    warn!(document_id = %document_id, etag = %document.etag, "could not cache fetched document");
                }
                Some(document)
            }
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "document fetch failed");
                None
            }
        };

        let ready = DocumentReady {
            document_id,
            etag,
            document,
        };
        self.notify(&ready);
        Some(ready)
    }

    /// Delivers every in-flight fetch.
    pub async fn drain(&mut self) -> Vec<DocumentReady> {
        let mut delivered = Vec::with_capacity(self.pending.len());
        while let Some(ready) = self.next_ready().await {
            delivered.push(ready);
        }
        delivered
    }

    fn notify(&mut self, ready: &DocumentReady) {
        for listener in self.listeners.iter_mut() {
            listener(ready);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CacheConfig;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fetcher that counts calls and serves documents from a fixed list.
    #[derive(Default)]
    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        documents: Vec<Document>,
    }

    #[async_trait]
    impl DocumentFetcher for CountingFetcher {
        async fn fetch(&self, document_id: &str) -> Result<Document, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.documents
                .iter()
                .find(|d| d.id == document_id)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(document_id.to_string()))
        }
    }

    fn avatar() -> Document {
        Document::new("42", "abc")
            .with_type("image/png")
            .with_content(b"png bytes".to_vec())
    }

    fn coordinator(dir: &TempDir, documents: Vec<Document>) -> (FetchCoordinator<CountingFetcher>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CountingFetcher {
            calls: Arc::clone(&calls),
            documents,
        };
        let store = DocumentStore::new(CacheConfig::with_directory(dir.path()));
        (FetchCoordinator::new(store, fetcher), calls)
    }

    fn record_deliveries(coordinator: &mut FetchCoordinator<CountingFetcher>) -> Arc<Mutex<Vec<DocumentReady>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        coordinator.on_document_ready(move |ready| sink.lock().unwrap().push(ready.clone()));
        seen
    }

    #[tokio::test]
    async fn cache_hit_skips_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let (mut coordinator, calls) = coordinator(&dir, vec![]);
        assert!(coordinator.store_mut().store(&avatar()));
        let seen = record_deliveries(&mut coordinator);

        assert_eq!(coordinator.request("42", "abc"), Delivery::Cached(avatar()));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.pending(), 0);
        assert_eq!(seen.lock().unwrap()[0].document, Some(avatar()));
    }

    #[tokio::test]
    async fn miss_fetches_and_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let (mut coordinator, calls) = coordinator(&dir, vec![avatar()]);
        let seen = record_deliveries(&mut coordinator);

        assert_eq!(coordinator.request("42", "abc"), Delivery::Fetching);
        assert!(seen.lock().unwrap().is_empty());

        let ready = coordinator.next_ready().await.unwrap();
        assert_eq!(ready.document, Some(avatar()));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(dir.path().join("abc").is_file());

        assert_eq!(coordinator.request("42", "abc"), Delivery::Cached(avatar()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_delivers_none() {
        let dir = tempfile::tempdir().unwrap();
        let (mut coordinator, calls) = coordinator(&dir, vec![]);
        let seen = record_deliveries(&mut coordinator);

        coordinator.request("7", "zzz");
        let ready = coordinator.next_ready().await.unwrap();

        assert_eq!(ready.document_id, "7");
        assert_eq!(ready.document, None);
        assert_eq!(seen.lock().unwrap()[0].document, None);
        assert!(!dir.path().join("zzz").exists());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // No automatic retry.
        assert!(coordinator.next_ready().await.is_none());
    }

    #[tokio::test]
    async fn duplicate_requests_share_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (mut coordinator, calls) = coordinator(&dir, vec![avatar()]);

        coordinator.request("42", "abc");
        coordinator.request("42", "abc");
        assert_eq!(coordinator.pending(), 1);

        let delivered = coordinator.drain().await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_etag_for_other_document_is_fetched_separately() {
        let dir = tempfile::tempdir().unwrap();
        let twin = Document::new("43", "abc").with_content(b"png bytes".to_vec());
        let (mut coordinator, calls) = coordinator(&dir, vec![avatar(), twin]);
        let seen = record_deliveries(&mut coordinator);

        assert_eq!(coordinator.request("42", "abc"), Delivery::Fetching);
        assert_eq!(coordinator.request("43", "abc"), Delivery::Fetching);
        assert_eq!(coordinator.pending(), 2);

        coordinator.drain().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let mut ids: Vec<_> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|ready| {
                assert!(ready.document.is_some());
                ready.document_id.clone()
            })
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["42", "43"]);
    }
}
