//! Environment-driven configuration, read once at supervisor construction.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Credentials and limits for one automation session.
#[derive(Debug, Clone)]
pub struct Config {
	pub email: String,
	pub password: String,
	pub headless: bool,
	/// Where the reusable cookie set is persisted. A cache, never required:
	/// absence just forces an interactive login.
	pub cookies_file: PathBuf,
	/// Hard deadline for a single tool-level operation.
	pub operation_timeout: Duration,
}

impl Config {
	/// Reads configuration from the environment.
	///
	/// `DISCORD_EMAIL` and `DISCORD_PASSWORD` are required; everything else
	/// has a default.
	pub fn from_env() -> Result<Self> {
		let email = require("DISCORD_EMAIL")?;
		let password = require("DISCORD_PASSWORD")?;

		let headless = env::var("DISCORD_HEADLESS")
			.map(|v| v.to_lowercase() != "false")
			.unwrap_or(true);

		let cookies_file = env::var("DISCORD_COOKIES_FILE").map(PathBuf::from).unwrap_or_else(|_| {
			dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".dmcp_cookies.json")
		});

		let operation_timeout = env::var("DMCP_OPERATION_TIMEOUT_SECS")
			.ok()
			.and_then(|v| v.parse().ok())
			.map(Duration::from_secs)
			.unwrap_or(Duration::from_secs(120));

		Ok(Self { email, password, headless, cookies_file, operation_timeout })
	}
}

fn require(key: &str) -> Result<String> {
	env::var(key)
		.ok()
		.filter(|v| !v.is_empty())
		.ok_or_else(|| Error::InvalidArgument(format!("{key} environment variable is required")))
}
