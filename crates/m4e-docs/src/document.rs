//! Documents served by the remote document service.

use std::fmt;

/// A binary document such as an avatar image.
///
/// The ETag is the server's version token for the content and doubles as the
/// cache key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub etag: String,
    pub encoding: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl Document {
    /// Creates an empty document with an id and ETag.
    pub fn new(id: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            etag: etag.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("etag", &self.etag)
            .field("encoding", &self.encoding)
            .field("mime_type", &self.mime_type)
            .field("content_len", &self.content.len())
            .finish()
    }
}
