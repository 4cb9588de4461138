//! The request type passed through interceptors and services.

use bytes::Bytes;
use jsonrpc_context_core::Context;

use crate::options::CallOptions;

/// A JSON-RPC request as seen by the context hooks.
///
/// On the calling side, `context` is what the caller wants to propagate and
/// `params` are the encoded parameters. On the serving side, `context` starts
/// as the server's base context and `params` as the raw parameters received;
/// [`ContextLayer`](crate::ContextLayer) replaces both with the unwrapped
/// values before the handler runs.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    /// The method being called (e.g., "Math.Add").
    pub method: String,
    /// Request-scoped context.
    pub context: Context,
    /// Request parameters (encoded JSON, possibly empty).
    pub params: Bytes,
}

impl RpcRequest {
    /// Create a request with an empty context.
    pub fn new(method: impl Into<String>, params: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            context: Context::background(),
            params: params.into(),
        }
    }

    /// Replace the request context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Derive the request context from per-call options.
    pub fn with_options(mut self, options: &CallOptions) -> Self {
        self.context = options.apply(&self.context);
        self
    }
}
