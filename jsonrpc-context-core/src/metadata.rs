//! Context metadata store.
//!
//! A context carries at most one metadata value: an opaque JSON value that
//! travels with a call and is never interpreted here. The slot on a context is
//! in one of three states:
//!
//! - absent: nothing was ever attached along the chain
//! - masked: [`Context::without_metadata`] hid whatever an ancestor attached
//! - present: a JSON value is attached
//!
//! Only the `with_*` methods move between states, and only by deriving a new
//! context. Readers treat masked exactly like absent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::context::Context;
use crate::error::ContextError;

/// Private slot key. `None` is the masked state.
struct MetadataSlot(Option<Box<RawValue>>);

impl Context {
    /// Derive a context carrying `meta`, encoded as JSON.
    ///
    /// On error `self` is left as it was and nothing is attached.
    ///
    /// ```
    /// use jsonrpc_context_core::Context;
    ///
    /// let ctx = Context::background().with_metadata(&["trace", "abc"]).unwrap();
    /// let meta: Vec<String> = ctx.metadata().unwrap();
    /// assert_eq!(meta, ["trace", "abc"]);
    /// ```
    pub fn with_metadata<T>(&self, meta: &T) -> Result<Self, ContextError>
    where
        T: Serialize + ?Sized,
    {
        let raw = serde_json::value::to_raw_value(meta)?;
        Ok(self.with_raw_metadata(raw))
    }

    /// Derive a context carrying an already-encoded metadata value.
    pub fn with_raw_metadata(&self, raw: Box<RawValue>) -> Self {
        self.with_value(MetadataSlot(Some(raw)))
    }

    /// Derive a context with no metadata, hiding any metadata attached by an
    /// ancestor.
    pub fn without_metadata(&self) -> Self {
        self.with_value(MetadataSlot(None))
    }

    /// The encoded metadata value, if one is present and not masked.
    pub fn raw_metadata(&self) -> Option<&RawValue> {
        self.value::<MetadataSlot>()?.0.as_deref()
    }

    /// Whether [`metadata`](Self::metadata) would find a value to decode.
    pub fn has_metadata(&self) -> bool {
        self.raw_metadata().is_some()
    }

    /// Decode the metadata attached to this context.
    ///
    /// Returns [`ContextError::NoMetadata`] if nothing is attached or the
    /// metadata was masked. Decoding errors are returned as
    /// [`ContextError::Json`].
    pub fn metadata<T>(&self) -> Result<T, ContextError>
    where
        T: DeserializeOwned,
    {
        let raw = self.raw_metadata().ok_or(ContextError::NoMetadata)?;
        Ok(serde_json::from_str(raw.get())?)
    }
}

/// Attach `meta` to `ctx`, or mask inherited metadata when `meta` is `None`.
pub fn attach_metadata<T>(ctx: &Context, meta: Option<&T>) -> Result<Context, ContextError>
where
    T: Serialize + ?Sized,
{
    match meta {
        Some(meta) => ctx.with_metadata(meta),
        None => Ok(ctx.without_metadata()),
    }
}
