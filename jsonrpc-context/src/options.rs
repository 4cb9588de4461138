//! Call options for per-request context.
//!
//! This module provides [`CallOptions`] for setting the deadline and metadata
//! that a single call should propagate.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonrpc_context_core::{Context, ContextError};
use serde::Serialize;
use serde_json::value::RawValue;

/// Options for configuring the context of an individual call.
///
/// # Example
///
/// ```
/// use jsonrpc_context::{CallOptions, Context};
/// use std::time::Duration;
///
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(5))
///     .metadata(&["user", "alice"])
///     .unwrap();
///
/// let ctx = options.apply(&Context::background());
/// assert!(ctx.deadline().is_some());
/// assert_eq!(ctx.metadata::<Vec<String>>().unwrap(), ["user", "alice"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    timeout: Option<Duration>,
    deadline: Option<DateTime<Utc>>,
    metadata: Option<MetadataOption>,
}

#[derive(Debug, Clone)]
enum MetadataOption {
    Attach(Box<RawValue>),
    Mask,
}

impl CallOptions {
    /// Create new default call options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a timeout for this call, measured from when the options are applied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the configured timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set an absolute deadline for this call.
    ///
    /// If both a timeout and a deadline are set, whichever expires first wins.
    pub fn deadline<Tz: TimeZone>(mut self, deadline: DateTime<Tz>) -> Self {
        self.deadline = Some(deadline.with_timezone(&Utc));
        self
    }

    /// Get the configured deadline, if any.
    pub fn get_deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Attach `meta` to the call, replacing metadata inherited from the
    /// parent context.
    ///
    /// # Errors
    /// Returns [`ContextError::Json`] if `meta` cannot be encoded as JSON.
    pub fn metadata<T>(mut self, meta: &T) -> Result<Self, ContextError>
    where
        T: Serialize + ?Sized,
    {
        let raw = serde_json::value::to_raw_value(meta)?;
        self.metadata = Some(MetadataOption::Attach(raw));
        Ok(self)
    }

    /// Send no metadata with this call, even if the parent context has some.
    pub fn mask_metadata(mut self) -> Self {
        self.metadata = Some(MetadataOption::Mask);
        self
    }

    /// Derive the call context from `parent`.
    pub fn apply(&self, parent: &Context) -> Context {
        let mut ctx = parent.clone();
        if let Some(deadline) = self.deadline {
            ctx = ctx.with_deadline(deadline);
        }
        if let Some(timeout) = self.timeout {
            ctx = ctx.with_timeout(timeout);
        }
        match &self.metadata {
            Some(MetadataOption::Attach(raw)) => ctx.with_raw_metadata(raw.clone()),
            Some(MetadataOption::Mask) => ctx.without_metadata(),
            None => ctx,
        }
    }
}
