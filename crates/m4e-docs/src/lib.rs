//! Local document cache.
//!
//! Documents fetched from the server (avatars, event images) are kept on
//! disk, one file per ETag, so repeated requests skip the network. Records
//! not used for a configurable number of days are purged.
//!
//! ```no_run
//! use m4e_docs::{CacheConfig, Document, DocumentStore};
//!
//! let mut store = DocumentStore::new(CacheConfig::default());
//! store.store(&Document::new("42", "abc").with_content(b"png".to_vec()));
//! if let Some(doc) = store.lookup("42", "abc") {
//!     println!("{} bytes", doc.content.len());
//! }
//! store.purge(m4e_docs::DEFAULT_EXPIRATION_DAYS);
//! ```

pub mod coordinator;
pub mod document;
pub mod error;
pub mod record;
pub mod store;

pub use coordinator::{Delivery, DocumentFetcher, DocumentReady, FetchCoordinator};
pub use document::Document;
pub use error::{FetchError, RecordError, RecordResult};
pub use store::{CacheConfig, DEFAULT_EXPIRATION_DAYS, DocumentStore, PurgeReport, is_safe_etag};
