//! Request and Response message types.
//!
//! JSON-RPC 2.0 envelopes exchanged with the node.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SubscriptionId};

use super::{Method, SubscriptionMethod};

// ============================================================================
// Constants
// ============================================================================

/// JSON-RPC protocol version tag.
const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// Request
// ============================================================================

/// A method call from the client to the node.
///
/// # Format
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "id": 1,
///   "method": "system_chain",
///   "params": []
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Method name.
    pub method: String,

    /// Positional parameters.
    pub params: Vec<Value>,
}

impl Request {
    /// Creates a request for a method with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(method: &Method) -> Self {
        Self::with_id(RequestId::generate(), method.name(), method.params())
    }

    /// Creates a request with a specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }

    /// Creates the subscribe call of a subscription.
    #[inline]
    #[must_use]
    pub fn subscribe(method: &SubscriptionMethod) -> Self {
        Self::with_id(
            RequestId::generate(),
            method.subscribe_name(),
            method.params(),
        )
    }

    /// Creates the unsubscribe call for an active subscription.
    #[must_use]
    pub fn unsubscribe(method: &SubscriptionMethod, subscription: &SubscriptionId) -> Self {
        let id = serde_json::to_value(subscription).unwrap_or(Value::Null);
        Self::with_id(
            RequestId::generate(),
            method.unsubscribe_name(),
            vec![id],
        )
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the node.
///
/// # Format
///
/// Success:
/// ```json
/// { "jsonrpc": "2.0", "id": 1, "result": "Subsocial" }
/// ```
///
/// Error:
/// ```json
/// { "jsonrpc": "2.0", "id": 1, "error": { "code": -32601, "message": "Method not found" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// A missing or `null` result is returned as [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] if the node answered with an error object.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::rpc(error.code, error.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Returns the response itself if it is a success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] if the node answered with an error object.
    pub fn into_checked(self) -> Result<Self> {
        match &self.error {
            Some(error) => Err(Error::rpc(error.code, error.message.clone())),
            None => Ok(self),
        }
    }

    /// Gets a string value from an object result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a u64 value from an object result.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }
}

// ============================================================================
// RpcError
// ============================================================================

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional extra data.
    #[serde(default)]
    pub data: Option<Value>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = Request::with_id(
            RequestId::from_u64(9),
            "chain_getBlockHash",
            vec![serde_json::json!(0)],
        );
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(
            json,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "chain_getBlockHash",
                "params": [0]
            })
        );
    }

    #[test]
    fn test_request_from_method() {
        let request = Request::new(&Method::SystemVersion);
        assert_eq!(request.method, "system_version");
        assert!(request.params.is_empty());
    }

    #[test]
    fn test_unsubscribe_request() {
        let request = Request::unsubscribe(
            &SubscriptionMethod::NewHeads,
            &SubscriptionId::String("0xabc".into()),
        );
        assert_eq!(request.method, "chain_unsubscribeNewHeads");
        assert_eq!(request.params, vec![serde_json::json!("0xabc")]);
    }

    #[test]
    fn test_success_response() {
        let json_str = r#"{"jsonrpc":"2.0","id":3,"result":"Subsocial"}"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(response.is_success());
        assert_eq!(response.id, RequestId::from_u64(3));
        assert_eq!(
            response.into_result().expect("success"),
            Value::String("Subsocial".into())
        );
    }

    #[test]
    fn test_null_result() {
        let json_str = r#"{"jsonrpc":"2.0","id":4,"result":null}"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert_eq!(response.into_result().expect("success"), Value::Null);
    }

    #[test]
    fn test_error_response() {
        let json_str = r#"{
            "jsonrpc": "2.0",
            "id": 5,
            "error": {"code": -32601, "message": "Method not found"}
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(!response.is_success());

        let err = response.clone().into_checked().unwrap_err();
        assert!(matches!(err, Error::Rpc { code: -32601, .. }));

        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::Rpc { code: -32601, .. }));
    }

    #[test]
    fn test_response_get_helpers() {
        let json_str = r#"{
            "jsonrpc": "2.0",
            "id": 6,
            "result": {"specName": "subsocial", "specVersion": 12}
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert_eq!(response.get_string("specName"), "subsocial");
        assert_eq!(response.get_u64("specVersion"), 12);
        assert_eq!(response.get_string("missing"), "");
        assert_eq!(response.get_u64("missing"), 0);
    }

    #[test]
    fn test_notification_is_not_a_response() {
        let json_str = r#"{
            "jsonrpc": "2.0",
            "method": "chain_newHead",
            "params": {"subscription": 1, "result": {}}
        }"#;

        assert!(serde_json::from_str::<Response>(json_str).is_err());
    }
}
