//! Line-delimited JSON-RPC 2.0 framing for the MCP stdio transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Deserialize)]
pub struct Request {
	#[allow(dead_code)]
	pub jsonrpc: String,
	/// Absent for notifications, which get no response.
	#[serde(default)]
	pub id: Option<Value>,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
	pub code: i64,
	pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Response {
	pub jsonrpc: &'static str,
	pub id: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<RpcError>,
}

impl Response {
	pub fn success(id: Value, result: Value) -> Self {
		Self { jsonrpc: "2.0", id, result: Some(result), error: None }
	}

	pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
		Self { jsonrpc: "2.0", id, result: None, error: Some(RpcError { code, message: message.into() }) }
	}
}
