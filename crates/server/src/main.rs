//! MCP stdio server exposing the Discord web automation tools.

mod logging;
mod rpc;
mod tools;

use std::sync::Arc;

use dmcp::{Config, Supervisor};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::rpc::{METHOD_NOT_FOUND, PARSE_ERROR, Request, Response};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// .env is a convenience for local runs; absence is fine.
	let _ = dotenvy::dotenv();
	logging::init_logging();

	let config = Config::from_env()?;
	let supervisor = Arc::new(Supervisor::new(config));

	info!(target: "dmcp_server", "dmcp-server listening on stdio");
	let result = serve(Arc::clone(&supervisor)).await;

	// The browser must be released on every exit path, including ctrl-c.
	supervisor.shutdown().await;
	result
}

async fn serve(supervisor: Arc<Supervisor>) -> anyhow::Result<()> {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdout = tokio::io::stdout();

	loop {
		let line = tokio::select! {
			line = lines.next_line() => line?,
			_ = tokio::signal::ctrl_c() => {
				info!(target: "dmcp_server", "interrupt received, shutting down");
				return Ok(());
			}
		};
		let Some(line) = line else {
			debug!(target: "dmcp_server", "stdin closed");
			return Ok(());
		};
		if line.trim().is_empty() {
			continue;
		}

		let response = match serde_json::from_str::<Request>(&line) {
			Ok(request) => handle(&supervisor, request).await,
			Err(e) => {
				error!(target: "dmcp_server", error = %e, "unparseable request");
				Some(Response::failure(Value::Null, PARSE_ERROR, format!("parse error: {e}")))
			}
		};

		if let Some(response) = response {
			let mut payload = serde_json::to_vec(&response)?;
			payload.push(b'\n');
			stdout.write_all(&payload).await?;
			stdout.flush().await?;
		}
	}
}

/// Handles one request. Notifications (no id) return nothing.
async fn handle(supervisor: &Supervisor, request: Request) -> Option<Response> {
	let id = request.id?;

	let response = match request.method.as_str() {
		"initialize" => Response::success(
			id,
			json!({
				"protocolVersion": "2024-11-05",
				"capabilities": { "tools": {} },
				"serverInfo": {
					"name": "dmcp-server",
					"version": env!("CARGO_PKG_VERSION"),
				}
			}),
		),
		"ping" => Response::success(id, json!({})),
		"tools/list" => Response::success(id, json!({ "tools": tools::definitions() })),
		"tools/call" => {
			let name = request.params.get("name").and_then(Value::as_str).unwrap_or_default();
			let empty = json!({});
			let args = request.params.get("arguments").unwrap_or(&empty);
			let content = tools::call(supervisor, name, args).await;
			Response::success(id, content)
		}
		other => Response::failure(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
	};
	Some(response)
}
