//! # jsonrpc-context
//!
//! Deadline and metadata propagation for JSON-RPC, without help from the
//! transport.
//!
//! The calling side wraps request parameters in a context envelope (see
//! [`jsonrpc_context_core::encode`]); the serving side unwraps it and hands
//! the handler a [`Context`] carrying the caller's deadline and metadata.
//! Peers that never wrap keep working: unwrapped requests pass through as-is.
//!
//! ## Calling side
//!
//! Put [`ContextInterceptor`] last in an [`InterceptorChain`] so it sees the
//! context produced by every interceptor before it:
//!
//! ```rust,ignore
//! use jsonrpc_context::{CallOptions, ContextInterceptor, InterceptorChain, RpcRequest};
//!
//! let mut chain = InterceptorChain::new();
//! chain.push(Arc::new(ContextInterceptor::new()));
//! let call = chain.wrap_unary(transport);
//!
//! let options = CallOptions::new()
//!     .timeout(Duration::from_secs(5))
//!     .metadata(&auth_token)?;
//! let result = call(RpcRequest::new("Math.Add", params).with_options(&options)).await?;
//! ```
//!
//! ## Serving side
//!
//! ```rust,ignore
//! use jsonrpc_context::ContextLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(ContextLayer::new().server_timeout(Duration::from_secs(30)))
//!     .service_fn(dispatch);
//! ```
//!
//! Inside the handler, `req.context.metadata::<T>()` returns the caller's
//! metadata and `req.context.deadline()` its deadline.

mod error;
mod interceptor;
mod layer;
mod options;
mod request;

pub use error::{Code, RpcError};
pub use interceptor::{
    BoxFuture, ContextInterceptor, FnInterceptor, Interceptor, InterceptorChain,
    MetadataInterceptor, UnaryFunc, UnaryNext,
};
pub use layer::{ContextLayer, ContextService};
pub use options::CallOptions;
pub use request::RpcRequest;

// Re-export the core types
pub use jsonrpc_context_core::{
    Context, ContextError, VERSION_FIELD, WIRE_VERSION, attach_metadata, decode, encode,
};
