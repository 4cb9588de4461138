//! Interceptors for the calling side of a JSON-RPC connection.
//!
//! An interceptor wraps the function that performs a call, so it can adjust
//! the request before it is sent or inspect the result afterwards. The
//! [`ContextInterceptor`] is the one that matters for context propagation: it
//! wraps the request parameters in a context envelope.
//!
//! # Example
//!
//! ```ignore
//! use jsonrpc_context::{ContextInterceptor, InterceptorChain, MetadataInterceptor};
//!
//! let mut chain = InterceptorChain::new();
//! chain.push(Arc::new(MetadataInterceptor::new(&service_identity)?));
//! chain.push(Arc::new(ContextInterceptor::new()));
//!
//! let call = chain.wrap_unary(send_over_transport);
//! let result = call(request).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use jsonrpc_context_core::{ContextError, encode};
use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::RpcError;
use crate::request::RpcRequest;

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The signature of a call: a request in, the encoded result out.
///
/// Interceptors wrap this function to add logic before and after the call.
pub type UnaryFunc =
    Arc<dyn Fn(RpcRequest) -> BoxFuture<'static, Result<Bytes, RpcError>> + Send + Sync>;

/// The "next" function in the interceptor chain.
///
/// Call this to proceed to the next interceptor or the actual call.
#[derive(Clone)]
pub struct UnaryNext {
    inner: UnaryFunc,
}

impl UnaryNext {
    pub(crate) fn new(inner: UnaryFunc) -> Self {
        Self { inner }
    }

    /// Call the next interceptor or the actual call.
    pub async fn call(self, request: RpcRequest) -> Result<Bytes, RpcError> {
        (self.inner)(request).await
    }
}

/// An interceptor that can wrap calls.
pub trait Interceptor: Send + Sync {
    /// Wrap a call.
    ///
    /// The default implementation passes through to the next function unchanged.
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        next
    }
}

/// A chain of interceptors that are applied in order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("count", &self.interceptors.len())
            .finish()
    }
}

impl InterceptorChain {
    /// Create a new empty interceptor chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor to the chain.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Get the number of interceptors in the chain.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Wrap a call with all interceptors in the chain.
    ///
    /// The first interceptor added is the first to see the request.
    pub fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let mut wrapped = next;
        for interceptor in self.interceptors.iter().rev() {
            wrapped = interceptor.wrap_unary(wrapped);
        }
        wrapped
    }
}

/// Wraps request parameters in a context envelope carrying the request
/// context's deadline and metadata.
///
/// This must run after any interceptor that changes the request context.
/// Parameters that are not valid JSON fail the call with
/// [`Code::InvalidParams`](crate::Code::InvalidParams) before anything is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextInterceptor;

impl ContextInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for ContextInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        Arc::new(move |mut request: RpcRequest| -> BoxFuture<'static, Result<Bytes, RpcError>> {
            match encode(&request.context, &request.method, &request.params) {
                Ok(params) => {
                    request.params = params;
                    next(request)
                }
                Err(err) => Box::pin(async move { Err(RpcError::from(err)) }),
            }
        })
    }
}

/// Attaches a fixed metadata value to every request context, replacing
/// whatever metadata the request carried.
#[derive(Debug, Clone)]
pub struct MetadataInterceptor {
    raw: Box<RawValue>,
}

impl MetadataInterceptor {
    /// Create an interceptor attaching `meta`.
    ///
    /// # Errors
    /// Returns [`ContextError::Json`] if `meta` cannot be encoded as JSON.
    pub fn new<T>(meta: &T) -> Result<Self, ContextError>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self {
            raw: serde_json::value::to_raw_value(meta)?,
        })
    }
}

impl Interceptor for MetadataInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let raw = self.raw.clone();
        Arc::new(move |mut request: RpcRequest| {
            request.context = request.context.with_raw_metadata(raw.clone());
            next(request)
        })
    }
}

/// A function-based interceptor.
///
/// # Example
///
/// ```ignore
/// use jsonrpc_context::{FnInterceptor, RpcRequest, UnaryNext};
///
/// let logging = FnInterceptor::unary(|req: RpcRequest, next: UnaryNext| {
///     Box::pin(async move {
///         tracing::info!(method = %req.method, "calling");
///         next.call(req).await
///     })
/// });
/// ```
#[derive(Clone)]
pub struct FnInterceptor<F> {
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(RpcRequest, UnaryNext) -> BoxFuture<'static, Result<Bytes, RpcError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    /// Create a new function-based interceptor.
    pub fn unary(func: F) -> Self {
        Self { func }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(RpcRequest, UnaryNext) -> BoxFuture<'static, Result<Bytes, RpcError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let func = self.func.clone();
        Arc::new(move |request: RpcRequest| {
            let next = UnaryNext::new(next.clone());
            func(request, next)
        })
    }
}
