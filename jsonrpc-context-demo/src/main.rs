//! Example: deadline and metadata propagation over an in-process loopback
//!
//! The client wraps each call in a context envelope. The "transport" turns the
//! call into a JSON-RPC 2.0 request object, which is all the server gets. The
//! server unwraps the envelope with `ContextLayer` and:
//! - `Greeter.Hello` greets the user named in the caller's metadata
//! - `Greeter.Slow` sleeps 500ms, bounded by the caller's deadline
//! - any other method fails with `MethodNotFound`, returned to the caller as a
//!   JSON-RPC error object
//!
//! Run with: RUST_LOG=jsonrpc_context=debug cargo run --bin context-loopback

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use jsonrpc_context::{
    BoxFuture, CallOptions, Code, ContextInterceptor, ContextLayer, FnInterceptor, InterceptorChain,
    RpcError, RpcRequest, UnaryFunc, UnaryNext,
};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tower::{ServiceBuilder, ServiceExt};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Caller {
    user: String,
}

#[derive(Serialize, Deserialize)]
struct WireRequest<'a> {
    jsonrpc: &'a str,
    method: String,
    #[serde(borrow, skip_serializing_if = "Option::is_none")]
    params: Option<&'a RawValue>,
}

async fn dispatch(req: RpcRequest) -> Result<Bytes, RpcError> {
    match req.method.as_str() {
        "Greeter.Hello" => {
            let name = match req.context.metadata::<Caller>() {
                Ok(caller) => caller.user,
                Err(err) if err.is_no_metadata() => "stranger".to_string(),
                Err(err) => return Err(err.into()),
            };
            Ok(Bytes::from(format!("\"Hello, {}!\"", name)))
        }
        "Greeter.Slow" => {
            let work = tokio::time::sleep(Duration::from_millis(500));
            match req.context.remaining() {
                Some(remaining) => tokio::time::timeout(remaining, work)
                    .await
                    .map_err(|_| RpcError::deadline_exceeded("Greeter.Slow ran out of time"))?,
                None => work.await,
            }
            Ok(Bytes::from_static(b"\"done\""))
        }
        other => Err(RpcError::new(
            Code::MethodNotFound,
            format!("no method {}", other),
        )),
    }
}

#[derive(Deserialize)]
struct WireError {
    code: i32,
    message: String,
}

/// Serializes the call as a JSON-RPC request object and hands it to `server`.
/// Errors travel back as JSON-RPC error objects.
fn loopback<S>(server: S) -> UnaryFunc
where
    S: tower::Service<RpcRequest, Response = Bytes, Error = RpcError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    Arc::new(move |req: RpcRequest| -> BoxFuture<'static, Result<Bytes, RpcError>> {
        let server = server.clone();
        Box::pin(async move {
            let params = if req.params.is_empty() {
                None
            } else {
                let raw: &RawValue = serde_json::from_slice(&req.params)
                    .map_err(|e| RpcError::invalid_params(e.to_string()))?;
                Some(raw)
            };
            let wire = serde_json::to_vec(&WireRequest {
                jsonrpc: "2.0",
                method: req.method.clone(),
                params,
            })
            .map_err(|e| RpcError::internal(e.to_string()))?;
            tracing::info!(request = %String::from_utf8_lossy(&wire), "sending");

            let reply = match serve(server, &wire).await {
                Ok(result) => return Ok(result),
                Err(err) => serde_json::to_vec(&err).map_err(|e| RpcError::internal(e.to_string()))?,
            };
            let err: WireError = serde_json::from_slice(&reply)
                .map_err(|e| RpcError::new(Code::ParseError, e.to_string()))?;
            let code = Code::from_i32(err.code).unwrap_or(Code::InternalError);
            Err(RpcError::new(code, err.message))
        })
    })
}

async fn serve<S>(server: S, wire: &[u8]) -> Result<Bytes, RpcError>
where
    S: tower::Service<RpcRequest, Response = Bytes, Error = RpcError>,
{
    let received: WireRequest<'_> =
        serde_json::from_slice(wire).map_err(|e| RpcError::new(Code::ParseError, e.to_string()))?;
    let params = received
        .params
        .map(|p| Bytes::copy_from_slice(p.get().as_bytes()))
        .unwrap_or_default();
    server.oneshot(RpcRequest::new(received.method, params)).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = ServiceBuilder::new()
        .layer(ContextLayer::new().server_timeout(Duration::from_secs(30)))
        .service_fn(dispatch);

    let mut chain = InterceptorChain::new();
    chain.push(Arc::new(FnInterceptor::unary(
        |req: RpcRequest, next: UnaryNext| -> BoxFuture<'static, Result<Bytes, RpcError>> {
            Box::pin(async move {
                let method = req.method.clone();
                let result = next.call(req).await;
                tracing::info!(%method, ok = result.is_ok(), "call finished");
                result
            })
        },
    )));
    chain.push(Arc::new(ContextInterceptor::new()));
    let call = chain.wrap_unary(loopback(server));

    let options = CallOptions::new().metadata(&Caller {
        user: "alice".into(),
    })?;
    let reply = call(RpcRequest::new("Greeter.Hello", Bytes::new()).with_options(&options)).await?;
    println!("Greeter.Hello (with metadata): {}", String::from_utf8_lossy(&reply));

    let reply = call(RpcRequest::new("Greeter.Hello", Bytes::new())).await?;
    println!("Greeter.Hello (no metadata):   {}", String::from_utf8_lossy(&reply));

    let options = CallOptions::new().timeout(Duration::from_secs(2));
    let reply = call(RpcRequest::new("Greeter.Slow", "[]").with_options(&options)).await?;
    println!("Greeter.Slow (2s timeout):     {}", String::from_utf8_lossy(&reply));

    let options = CallOptions::new().timeout(Duration::from_millis(100));
    match call(RpcRequest::new("Greeter.Slow", "[]").with_options(&options)).await {
        Ok(reply) => println!("Greeter.Slow (100ms timeout):  {}", String::from_utf8_lossy(&reply)),
        Err(err) => println!("Greeter.Slow (100ms timeout):  error {}: {}", err.code().as_i32(), err),
    }

    match call(RpcRequest::new("Greeter.Wave", Bytes::new())).await {
        Ok(reply) => println!("Greeter.Wave:                  {}", String::from_utf8_lossy(&reply)),
        Err(err) => println!("Greeter.Wave:                  error {}: {}", err.code().as_i32(), err),
    }

    Ok(())
}
