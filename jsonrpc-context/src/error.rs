//! JSON-RPC error codes and the error type returned by the hooks.

use jsonrpc_context_core::ContextError;
use serde::{Serialize, Serializer};

/// JSON-RPC error codes used by the context hooks.
///
/// The first five are the reserved codes from the JSON-RPC 2.0
/// specification. `DeadlineExceeded` sits in the implementation-defined
/// server error range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Code {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    DeadlineExceeded,
}

impl Code {
    /// The numeric code sent on the wire.
    pub fn as_i32(&self) -> i32 {
        match self {
            Code::ParseError => -32700,
            Code::InvalidRequest => -32600,
            Code::MethodNotFound => -32601,
            Code::InvalidParams => -32602,
            Code::InternalError => -32603,
            Code::DeadlineExceeded => -32096,
        }
    }

    /// Look up a code by its numeric value, as found in a received error
    /// object.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(Code::ParseError),
            -32600 => Some(Code::InvalidRequest),
            -32601 => Some(Code::MethodNotFound),
            -32602 => Some(Code::InvalidParams),
            -32603 => Some(Code::InternalError),
            -32096 => Some(Code::DeadlineExceeded),
            _ => None,
        }
    }

    /// Short human-readable description.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::ParseError => "parse error",
            Code::InvalidRequest => "invalid request",
            Code::MethodNotFound => "method not found",
            Code::InvalidParams => "invalid parameters",
            Code::InternalError => "internal error",
            Code::DeadlineExceeded => "deadline exceeded",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.as_i32())
    }
}

/// Error returned by the interceptors and by [`ContextService`](crate::ContextService)
/// when a request is rejected.
///
/// Serializes as a JSON-RPC error object:
///
/// ```json
/// {"code": -32600, "message": "invalid context version \"99\""}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    code: Code,
    message: String,
}

impl RpcError {
    /// Create an error with a code and message.
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an error whose message is the code's description.
    pub fn from_code(code: Code) -> Self {
        Self::new(code, code.as_str())
    }

    /// Get the error code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Shorthand for [`Code::InvalidRequest`].
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::new(Code::InvalidRequest, message)
    }

    /// Shorthand for [`Code::InvalidParams`].
    pub fn invalid_params<S: Into<String>>(message: S) -> Self {
        Self::new(Code::InvalidParams, message)
    }

    /// Shorthand for [`Code::InternalError`].
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(Code::InternalError, message)
    }

    /// The handler ran out of time before its deadline.
    pub fn deadline_exceeded<S: Into<String>>(message: S) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }
}

/// Version mismatches reject the whole request; everything else is a problem
/// with the parameters or metadata it carried.
impl From<ContextError> for RpcError {
    fn from(err: ContextError) -> Self {
        let code = match err {
            ContextError::VersionMismatch(_) => Code::InvalidRequest,
            ContextError::NoMetadata | ContextError::Json(_) => Code::InvalidParams,
        };
        Self::new(code, err.to_string())
    }
}
