//! One authenticated browser session against the Discord web client.
//!
//! A `Session` owns the headless Chrome process, its CDP handler task, and a
//! single page. It is held exclusively by the supervisor behind the operation
//! serializer; nothing here is shared.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::config::Config;
use crate::dom;
use crate::error::{Error, Result};

pub(crate) const BASE_URL: &str = "https://discord.com";
pub(crate) const HOME_URL: &str = "https://discord.com/channels/@me";
const LOGIN_URL: &str = "https://discord.com/login";

/// How long to wait for the guilds nav when probing authentication state.
const AUTH_PROBE_TIMEOUT: Duration = Duration::from_secs(15);
/// How long the interactive login flow may take to leave the login wall.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(60);
/// Interval for every condition poll. Fixed sleeps are never used for
/// correctness; every wait checks an explicit predicate against a deadline.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct Session {
	browser: Browser,
	handler_task: JoinHandle<()>,
	page: Page,
	authenticated: bool,
	last_known_good_url: Option<String>,
}

impl Session {
	/// Launches the browser and opens the single page this session drives.
	///
	/// Persisted cookies are restored if present; they are a cache, and any
	/// failure to load them just means an interactive login later.
	pub async fn open(config: &Config) -> Result<Self> {
		debug!(target: "dmcp", headless = config.headless, "launching browser");

		let mut builder = BrowserConfig::builder()
			.no_sandbox()
			.arg("--disable-gpu")
			.arg("--disable-dev-shm-usage")
			.arg("--disable-extensions")
			.window_size(1280, 900);
		if !config.headless {
			builder = builder.with_head();
		}
		let browser_config = builder.build().map_err(|e| Error::Browser(anyhow::anyhow!(e)))?;

		let (browser, mut handler) = Browser::launch(browser_config)
			.await
			.map_err(|e| Error::Browser(e.into()))?;

		// The handler task pumps CDP traffic; the session is dead once it stops.
		let handler_task = tokio::spawn(async move {
			while let Some(event) = handler.next().await {
				if event.is_err() {
					debug!(target: "dmcp", "CDP handler loop ended");
					break;
				}
			}
		});

		let page = browser
			.new_page("about:blank")
			.await
			.map_err(|e| Error::Browser(e.into()))?;

		let session = Self {
			browser,
			handler_task,
			page,
			authenticated: false,
			last_known_good_url: None,
		};

		if config.cookies_file.exists() {
			if let Err(e) = session.restore_cookies(&config.cookies_file).await {
				warn!(target: "dmcp", error = %e, "cookie restore failed, will log in fresh");
			}
		}

		Ok(session)
	}

	pub fn page(&self) -> &Page {
		&self.page
	}

	pub fn is_authenticated(&self) -> bool {
		self.authenticated
	}

	pub fn last_known_good_url(&self) -> Option<&str> {
		self.last_known_good_url.as_deref()
	}

	/// Navigates the session page, recording the URL on success.
	pub async fn goto(&mut self, url: &str) -> Result<()> {
		self.page.goto(url).await.map_err(|e| Error::Browser(e.into()))?;
		self.last_known_good_url = Some(url.to_string());
		Ok(())
	}

	/// Current page URL as the browser reports it.
	pub async fn current_url(&self) -> Result<String> {
		let url = self.page.url().await.map_err(|e| Error::Browser(e.into()))?;
		Ok(url.unwrap_or_default())
	}

	/// Polls for a selector until it appears or the deadline passes.
	pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
		dom::wait_for_selector(&self.page, selector, timeout).await
	}

	/// Makes sure the session is logged in, running the interactive login
	/// flow if the persisted cookies did not hold.
	///
	/// Login failure is fatal to the operation and never retried here: bad
	/// credentials stay bad, and challenge walls need a human.
	pub async fn ensure_authenticated(&mut self, config: &Config) -> Result<()> {
		if self.authenticated {
			return Ok(());
		}
		if self.check_logged_in().await? {
			debug!(target: "dmcp", "restored session is still authenticated");
			self.authenticated = true;
			return Ok(());
		}
		self.login(config).await
	}

	/// Probes the home view for the guilds nav to tell whether the current
	/// cookie set is an authenticated one.
	async fn check_logged_in(&mut self) -> Result<bool> {
		self.page.goto(HOME_URL).await.map_err(|e| Error::Browser(e.into()))?;

		if !self.wait_for_selector(dom::GUILD_NAV_ITEM, AUTH_PROBE_TIMEOUT).await? {
			return Ok(false);
		}

		let url = self.current_url().await?;
		if url.contains("/login") || url.contains("/register") || !url.contains("/channels/@me") {
			return Ok(false);
		}

		self.last_known_good_url = Some(HOME_URL.to_string());
		Ok(true)
	}

	async fn login(&mut self, config: &Config) -> Result<()> {
		debug!(target: "dmcp", "starting interactive login");
		self.page.goto(LOGIN_URL).await.map_err(|e| Error::Browser(e.into()))?;

		if !self.wait_for_selector(dom::LOGIN_EMAIL, AUTH_PROBE_TIMEOUT).await? {
			return Err(Error::Auth("login form never rendered".into()));
		}

		self.fill(dom::LOGIN_EMAIL, &config.email).await?;
		self.fill(dom::LOGIN_PASSWORD, &config.password).await?;
		self.page
			.find_element(dom::LOGIN_SUBMIT)
			.await
			.map_err(|e| Error::Browser(e.into()))?
			.click()
			.await
			.map_err(|e| Error::Browser(e.into()))?;

		// Poll until the login wall is gone; a challenge redirect is an auth
		// failure, not something to wait out.
		let deadline = Instant::now() + LOGIN_TIMEOUT;
		loop {
			let url = self.current_url().await?;
			if url.contains("/verify") {
				return Err(Error::Auth("account requires additional verification".into()));
			}
			if !url.contains("/login") {
				break;
			}
			if Instant::now() >= deadline {
				return Err(Error::Auth("login did not complete before the deadline".into()));
			}
			sleep(POLL_INTERVAL).await;
		}

		if !self.check_logged_in().await? {
			return Err(Error::Auth("credentials were not accepted".into()));
		}
		self.authenticated = true;

		if let Err(e) = self.save_cookies(&config.cookies_file).await {
			warn!(target: "dmcp", error = %e, "could not persist session cookies");
		}
		Ok(())
	}

	async fn fill(&self, selector: &str, value: &str) -> Result<()> {
		let element = self
			.page
			.find_element(selector)
			.await
			.map_err(|e| Error::Browser(e.into()))?;
		element.click().await.map_err(|e| Error::Browser(e.into()))?;
		element.type_str(value).await.map_err(|e| Error::Browser(e.into()))?;
		Ok(())
	}

	/// Persists the current cookie set so the next process skips login.
	pub async fn save_cookies(&self, path: &Path) -> Result<()> {
		let cookies = self.page.get_cookies().await.map_err(|e| Error::Browser(e.into()))?;
		let json = serde_json::to_string_pretty(&cookies)?;
		tokio::fs::write(path, json).await?;
		debug!(target: "dmcp", count = cookies.len(), path = %path.display(), "cookies saved");
		Ok(())
	}

	async fn restore_cookies(&self, path: &Path) -> Result<()> {
		let cookies = load_cookie_file(path).await?;
		let count = cookies.len();
		self.page.set_cookies(cookies).await.map_err(|e| Error::Browser(e.into()))?;
		debug!(target: "dmcp", count, "cookies restored");
		Ok(())
	}

	/// Releases the browser process and the CDP handler task.
	///
	/// Callers bound this with a timeout; if the future is dropped on expiry
	/// the browser child is still killed when the handle drops.
	pub async fn close(mut self) -> Result<()> {
		if let Err(e) = self.browser.close().await {
			warn!(target: "dmcp", error = %e, "browser close reported an error");
		}
		let _ = self.browser.wait().await;
		self.handler_task.abort();
		debug!(target: "dmcp", "session closed");
		Ok(())
	}
}

/// Reads a persisted cookie file back into settable parameters.
///
/// The file holds serialized `Cookie` records, which deserialize as
/// `CookieParam`: the shared fields line up and the extras are ignored.
async fn load_cookie_file(path: &Path) -> Result<Vec<CookieParam>> {
	let json = tokio::fs::read_to_string(path).await?;
	Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAVED_COOKIES: &str = r#"[
		{
			"name": "token",
			"value": "abc123",
			"domain": ".discord.com",
			"path": "/",
			"expires": 1893456000.0,
			"size": 11,
			"httpOnly": true,
			"secure": true,
			"session": false,
			"priority": "Medium",
			"sameParty": false,
			"sourceScheme": "Secure",
			"sourcePort": 443
		}
	]"#;

	#[tokio::test]
	async fn saved_cookie_records_load_as_settable_params() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cookies.json");
		std::fs::write(&path, SAVED_COOKIES).unwrap();

		let cookies = load_cookie_file(&path).await.unwrap();
		assert_eq!(cookies.len(), 1);
		assert_eq!(cookies[0].name, "token");
		assert_eq!(cookies[0].value, "abc123");
		assert_eq!(cookies[0].domain.as_deref(), Some(".discord.com"));
		// Fields that only exist on the saved record, like `size`, are dropped.
	}

	#[tokio::test]
	async fn corrupt_cookie_file_is_an_error_not_a_panic() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cookies.json");
		std::fs::write(&path, "{ not json").unwrap();

		let err = load_cookie_file(&path).await.unwrap_err();
		assert!(matches!(err, Error::Json(_)));
	}

	#[tokio::test]
	async fn missing_cookie_file_is_an_io_error() {
		let err = load_cookie_file(Path::new("/nonexistent/cookies.json")).await.unwrap_err();
		assert!(matches!(err, Error::Io(_)));
	}
}
