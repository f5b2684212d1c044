//! Error types for archetype_gltf

use std::sync::Arc;
use thiserror::Error;

/// Main error type for asset decoding
///
/// Decoding stages are memoized as shared futures, so every waiter receives
/// its own copy of a failure. All variants are therefore cheap to clone.
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    /// Bad container, unsupported version, malformed JSON or an index that
    /// points outside its array.
    #[error("Format error: {0}")]
    Format(String),

    /// A buffer or image could not be fetched.
    #[error("IO error loading '{uri}': {source}")]
    Io {
        uri: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// An extension is used by the asset but its collaborator was not provided.
    #[error("Extension {extension} requires {requirement}")]
    MissingDependencyExtension {
        extension: String,
        requirement: String,
    },

    /// The texture collaborator failed to decode an image.
    #[error("Texture error: {0}")]
    Texture(Arc<crate::texture::TextureError>),
}

impl DecodeError {
    /// Shorthand for a [`DecodeError::Format`]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Wrap an IO failure for the given URI
    pub fn io(uri: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            uri: uri.into(),
            source: Arc::new(source),
        }
    }

    /// Error for a referenced index that does not exist
    pub fn invalid_index(what: &str, index: usize) -> Self {
        Self::Format(format!("Invalid {what} index {index}"))
    }

    /// True for format errors
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(format!("Invalid glTF JSON: {err}"))
    }
}

impl From<crate::texture::TextureError> for DecodeError {
    fn from(err: crate::texture::TextureError) -> Self {
        Self::Texture(Arc::new(err))
    }
}

/// Result type alias for decoding operations
pub type Result<T> = std::result::Result<T, DecodeError>;
