//! Tool catalog and dispatch: maps named MCP tool calls onto supervisor
//! operations and renders results as MCP content.

use std::time::Duration;

use dmcp::Supervisor;
use serde_json::{Value, json};
use tracing::debug;

const DEFAULT_HOURS_BACK: u64 = 24;
const DEFAULT_MAX_MESSAGES: u64 = 100;

/// The tool catalog returned by `tools/list`.
pub fn definitions() -> Value {
	json!([
		{
			"name": "get_servers",
			"description": "List all Discord servers (guilds) the account can see",
			"inputSchema": { "type": "object", "properties": {}, "required": [] }
		},
		{
			"name": "get_channels",
			"description": "List all channels in a specific Discord server",
			"inputSchema": {
				"type": "object",
				"properties": {
					"server_id": { "type": "string", "description": "Discord server (guild) id" }
				},
				"required": ["server_id"]
			}
		},
		{
			"name": "read_messages",
			"description": "Read recent messages from a channel, newest first",
			"inputSchema": {
				"type": "object",
				"properties": {
					"channel_id": { "type": "string", "description": "Discord channel id" },
					"server_id": {
						"type": "string",
						"description": "Parent server id; skips discovery when known"
					},
					"hours_back": {
						"type": "integer",
						"description": "Time window in hours, between 1 and 8760",
						"default": DEFAULT_HOURS_BACK
					},
					"max_messages": {
						"type": "integer",
						"description": "Maximum number of messages, between 1 and 1000",
						"default": DEFAULT_MAX_MESSAGES
					}
				},
				"required": ["channel_id"]
			}
		},
		{
			"name": "send_message",
			"description": "Send a message to a specific Discord channel",
			"inputSchema": {
				"type": "object",
				"properties": {
					"channel_id": { "type": "string", "description": "Discord channel id" },
					"server_id": {
						"type": "string",
						"description": "Parent server id; skips discovery when known"
					},
					"content": {
						"type": "string",
						"description": "Message content, between 1 and 2000 characters"
					}
				},
				"required": ["channel_id", "content"]
			}
		},
		{
			"name": "discover_channels",
			"description": "Find channels whose names contain any of the given keywords",
			"inputSchema": {
				"type": "object",
				"properties": {
					"keywords": {
						"type": "array",
						"items": { "type": "string" },
						"description": "Case-insensitive name fragments to look for"
					},
					"server_ids": {
						"type": "array",
						"items": { "type": "string" },
						"description": "Restrict the scan to these servers; all servers when omitted"
					}
				},
				"required": ["keywords"]
			}
		},
		{
			"name": "discover_channels_by_pattern",
			"description": "Find channels whose names match a case-insensitive regular expression",
			"inputSchema": {
				"type": "object",
				"properties": {
					"pattern": {
						"type": "string",
						"description": "Regular expression matched against channel names"
					},
					"server_ids": {
						"type": "array",
						"items": { "type": "string" },
						"description": "Restrict the scan to these servers; all servers when omitted"
					}
				},
				"required": ["pattern"]
			}
		}
	])
}

/// Executes one tool call. Tool-level failures come back as `isError`
/// content, never as a crashed server.
pub async fn call(supervisor: &Supervisor, name: &str, args: &Value) -> Value {
	debug!(target: "dmcp_server", tool = name, "dispatching tool call");
	match name {
		"get_servers" => render(supervisor.list_servers().await),
		"get_channels" => match require_str(args, "server_id") {
			Ok(server_id) => render(supervisor.list_channels(&server_id).await),
			Err(e) => error_content(&e),
		},
		"read_messages" => {
			let channel_id = match require_str(args, "channel_id") {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			let server_id = optional_str(args, "server_id");
			let hours_back = match integer_or(args, "hours_back", DEFAULT_HOURS_BACK) {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			let max_messages = match integer_or(args, "max_messages", DEFAULT_MAX_MESSAGES) {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			let window = Duration::from_secs(hours_back.saturating_mul(3600));
			render(
				supervisor
					.read_messages(server_id.as_deref(), &channel_id, window, max_messages as usize)
					.await,
			)
		}
		"send_message" => {
			let channel_id = match require_str(args, "channel_id") {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			let content = match require_str(args, "content") {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			let server_id = optional_str(args, "server_id");
			render(supervisor.send_message(server_id.as_deref(), &channel_id, &content).await)
		}
		"discover_channels" => {
			let keywords = match string_array(args, "keywords") {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			let server_ids = match optional_string_array(args, "server_ids") {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			render(supervisor.discover_channels(&keywords, server_ids.as_deref()).await)
		}
		"discover_channels_by_pattern" => {
			let pattern = match require_str(args, "pattern") {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			let server_ids = match optional_string_array(args, "server_ids") {
				Ok(v) => v,
				Err(e) => return error_content(&e),
			};
			render(supervisor.discover_channels_by_pattern(&pattern, server_ids.as_deref()).await)
		}
		other => error_content(&format!("unknown tool: {other}")),
	}
}

fn render<T: serde::Serialize>(result: dmcp::Result<T>) -> Value {
	match result {
		Ok(value) => match serde_json::to_string_pretty(&value) {
			Ok(text) => json!({ "content": [{ "type": "text", "text": text }] }),
			Err(e) => error_content(&format!("result serialization failed: {e}")),
		},
		Err(e) => error_content(&e.to_string()),
	}
}

fn error_content(message: &str) -> Value {
	json!({ "content": [{ "type": "text", "text": message }], "isError": true })
}

fn require_str(args: &Value, key: &str) -> Result<String, String> {
	args.get(key)
		.and_then(Value::as_str)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
		.ok_or_else(|| format!("missing required string argument: {key}"))
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
	args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn integer_or(args: &Value, key: &str, default: u64) -> Result<u64, String> {
	match args.get(key) {
		None | Some(Value::Null) => Ok(default),
		Some(value) => value.as_u64().ok_or_else(|| format!("{key} must be a non-negative integer")),
	}
}

fn optional_string_array(args: &Value, key: &str) -> Result<Option<Vec<String>>, String> {
	match args.get(key) {
		None | Some(Value::Null) => Ok(None),
		Some(_) => string_array(args, key).map(Some),
	}
}

fn string_array(args: &Value, key: &str) -> Result<Vec<String>, String> {
	let items = args
		.get(key)
		.and_then(Value::as_array)
		.ok_or_else(|| format!("missing required array argument: {key}"))?;
	items
		.iter()
		.map(|v| v.as_str().map(str::to_string).ok_or_else(|| format!("{key} must contain strings")))
		.collect()
}
