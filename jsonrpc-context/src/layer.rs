//! Serving-side layer that unwraps context envelopes.
//!
//! [`ContextLayer`] sits in front of the method dispatcher. For every request
//! it calls [`decode`] and replaces the request's context and parameters with
//! the unwrapped ones, so handlers see the caller's deadline and metadata and
//! the parameters exactly as the caller encoded them.
//!
//! The layer never arms a timer. A deadline only ends up as a value on the
//! context; the dispatcher decides whether and how to enforce it.

use std::{
    future::Future,
    pin::Pin,
    task::{Context as TaskContext, Poll},
    time::Duration,
};

use jsonrpc_context_core::decode;
use tower::{Layer, Service, ServiceExt};

use crate::error::RpcError;
use crate::request::RpcRequest;

const TRACE_TARGET: &str = "jsonrpc_context";

/// Layer that unwraps context envelopes before requests reach the handler.
///
/// # Example
///
/// ```rust,ignore
/// use jsonrpc_context::ContextLayer;
/// use tower::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .layer(ContextLayer::new().server_timeout(Duration::from_secs(30)))
///     .service_fn(dispatch);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextLayer {
    /// Upper bound on the time a request may take, applied on top of the
    /// caller's deadline. `None` means the caller's deadline (if any) is used
    /// as-is.
    server_timeout: Option<Duration>,
    /// Reject requests whose deadline has already passed.
    reject_expired: bool,
}

impl ContextLayer {
    /// Create a new ContextLayer with no server timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap every request's deadline at `timeout` from when it arrives.
    ///
    /// The effective deadline is the earlier of the caller's deadline and the
    /// server timeout.
    pub fn server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = Some(timeout);
        self
    }

    /// Fail requests with [`Code::DeadlineExceeded`](crate::Code::DeadlineExceeded)
    /// if their deadline has already passed on arrival, without calling the
    /// handler.
    pub fn reject_expired(mut self, reject: bool) -> Self {
        self.reject_expired = reject;
        self
    }
}

impl<S> Layer<S> for ContextLayer {
    type Service = ContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextService {
            inner,
            server_timeout: self.server_timeout,
            reject_expired: self.reject_expired,
        }
    }
}

/// Service that unwraps context envelopes. See [`ContextLayer`].
#[derive(Debug, Clone)]
pub struct ContextService<S> {
    inner: S,
    server_timeout: Option<Duration>,
    reject_expired: bool,
}

impl<S> ContextService<S> {
    fn unwrap_request(&self, mut req: RpcRequest) -> Result<RpcRequest, RpcError> {
        let (mut ctx, params) =
            decode(&req.context, &req.method, req.params.clone()).inspect_err(|err| {
                tracing::warn!(
                    target: TRACE_TARGET,
                    method = %req.method,
                    error = %err,
                    "rejecting request with unsupported context envelope"
                );
            })?;

        if let Some(timeout) = self.server_timeout {
            ctx = ctx.with_timeout(timeout);
        }

        tracing::debug!(
            target: TRACE_TARGET,
            method = %req.method,
            deadline = ?ctx.deadline(),
            has_metadata = ctx.has_metadata(),
            "unwrapped request context"
        );

        if self.reject_expired && ctx.is_expired() {
            return Err(RpcError::deadline_exceeded(format!(
                "deadline for {} passed before dispatch",
                req.method
            )));
        }

        req.context = ctx;
        req.params = params;
        Ok(req)
    }
}

impl<S> Service<RpcRequest> for ContextService<S>
where
    S: Service<RpcRequest> + Clone + Send + 'static,
    S::Error: From<RpcError> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let req = match self.unwrap_request(req) {
            Ok(req) => req,
            Err(err) => {
                let err = <S::Error as From<RpcError>>::from(err);
                return Box::pin(async move { Err(err) });
            }
        };

        // Clone inner service for the async block
        let inner = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, inner);

        Box::pin(async move { inner.oneshot(req).await })
    }
}
