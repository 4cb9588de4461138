//! Errors produced by the context codec and metadata store.

/// Errors returned by [`encode`](crate::encode), [`decode`](crate::decode)
/// and the metadata accessors on [`Context`](crate::Context).
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The message carried a context envelope whose version marker is not
    /// [`WIRE_VERSION`](crate::WIRE_VERSION). The request must be rejected.
    #[error("invalid context version {0:?}")]
    VersionMismatch(String),

    /// No usable metadata is attached to the context.
    ///
    /// Returned both when nothing was ever attached and when the metadata was
    /// explicitly masked with [`Context::without_metadata`](crate::Context::without_metadata).
    #[error("context metadata not present")]
    NoMetadata,

    /// Encoding or decoding JSON failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ContextError {
    /// Returns `true` if this is [`ContextError::NoMetadata`].
    ///
    /// Handlers that treat metadata as optional can use this to tell "nothing
    /// was sent" apart from "something was sent but could not be decoded".
    pub fn is_no_metadata(&self) -> bool {
        matches!(self, ContextError::NoMetadata)
    }

    /// Returns `true` if this is [`ContextError::VersionMismatch`].
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, ContextError::VersionMismatch(_))
    }
}
