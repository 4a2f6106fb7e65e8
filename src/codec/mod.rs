//! Task document codec.
//!
//! The engine treats file bytes as opaque and hands them to a
//! [`DocumentCodec`]. The codec either produces a [`TaskDocument`] or a
//! typed [`ParseFailure`]; it never panics on bad input.
//!
//! [`FrontMatterCodec`] is the bundled implementation.

mod frontmatter;

pub use frontmatter::FrontMatterCodec;

use crate::model::TaskDocument;

/// Why a file could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ParseFailure {
    pub reason: String,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// (De)serializes one task file.
///
/// Implementations must carry fields they do not understand through
/// `TaskDocument::extra` so a decode/encode cycle never drops data.
pub trait DocumentCodec: Send + Sync {
    /// Decode file text into a document.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseFailure`] describing the first problem found.
    fn decode(&self, text: &str) -> Result<TaskDocument, ParseFailure>;

    /// Encode a document into file text.
    fn encode(&self, document: &TaskDocument) -> String;
}
