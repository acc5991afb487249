//! The session supervisor: tool-level operations over one serialized,
//! lazily created, aggressively recycled browser session.
//!
//! Every operation is all-or-nothing: it either runs against a live,
//! authenticated session or fails with a typed error, and it never leaves a
//! half-initialized session behind for the next caller. Failures that make
//! the session untrustworthy tear it down before returning; the next
//! operation recreates it lazily.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::discovery::{ChannelMatch, DiscoveryCache, compile_pattern, match_keywords};
use crate::dom::{self, LiveChannelView};
use crate::error::{Error, Result};
use crate::extract::collect_window;
use crate::session::{BASE_URL, HOME_URL, Session};
use crate::types::{Channel, Message, Server};

/// Upper bound on tearing a dead session down; a hung teardown is abandoned
/// (dropping the handle still kills the browser child) rather than blocking
/// the caller.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);
/// How long the message composer may take to become interactive.
const COMPOSER_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a submitted message may take to appear in the timeline.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);
/// How long server/channel chrome may take to render after navigation.
const RENDER_TIMEOUT: Duration = Duration::from_secs(15);

const MIN_TIME_WINDOW: Duration = Duration::from_secs(60 * 60);
const MAX_TIME_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);
const MAX_COUNT_LIMIT: usize = 1000;
const MAX_CONTENT_CHARS: usize = 2000;

/// Session lifecycle states. Transitions are only triggered by named events:
/// first use opens, a corrupting failure tears down, shutdown closes.
enum SessionState {
	Unopened,
	Live(Session),
	Corrupted,
}

/// Outcome of a successful send.
#[derive(Debug, Clone, Serialize)]
pub struct SendResult {
	pub message_id: String,
	pub status: String,
}

/// How a channel's parent server id was obtained, which decides what a
/// navigation contradiction means.
enum Resolution {
	Caller,
	Cached,
	Discovered,
}

pub struct Supervisor {
	config: Config,
	/// The operation serializer. Exactly one operation drives the session at
	/// a time; concurrent callers queue here in arrival order.
	slot: tokio::sync::Mutex<SessionState>,
	cache: DiscoveryCache,
}

impl Supervisor {
	pub fn new(config: Config) -> Self {
		Self { config, slot: tokio::sync::Mutex::new(SessionState::Unopened), cache: DiscoveryCache::new() }
	}

	/// The discovery cache. Reads are safe without the serializer; the
	/// supervisor only writes to it while holding the gate.
	pub fn discovery(&self) -> &DiscoveryCache {
		&self.cache
	}

	/// Lists the servers the logged-in account can see, in display order.
	pub async fn list_servers(&self) -> Result<Vec<Server>> {
		let mut state = self.slot.lock().await;
		let outcome = tokio::time::timeout(self.config.operation_timeout, async {
			let session = Self::ensure_live(&mut state, &self.config).await?;
			session.goto(HOME_URL).await?;
			dom::extract_servers(session.page()).await
		})
		.await
		.unwrap_or_else(|_| Err(self.timed_out()));
		Self::conclude(&mut state, outcome).await
	}

	/// Lists the channels of one server and records their parent mapping in
	/// the discovery cache.
	pub async fn list_channels(&self, server_id: &str) -> Result<Vec<Channel>> {
		validate_id("server", server_id)?;
		let server_id = server_id.to_string();

		let mut state = self.slot.lock().await;
		let outcome = tokio::time::timeout(self.config.operation_timeout, async {
			let session = Self::ensure_live(&mut state, &self.config).await?;
			open_server(session, &server_id).await?;
			let channels = dom::extract_channels(session.page(), &server_id).await?;
			self.cache.record_channels(&channels);
			Ok(channels)
		})
		.await
		.unwrap_or_else(|_| Err(self.timed_out()));
		Self::conclude(&mut state, outcome).await
	}

	/// Reads up to `max_count` messages from the channel, newest first,
	/// restricted to `[now - time_window, now]`.
	///
	/// Callers that already know the parent server pass it and skip
	/// discovery entirely; otherwise the mapping is resolved once and cached.
	pub async fn read_messages(
		&self,
		server_id: Option<&str>,
		channel_id: &str,
		time_window: Duration,
		max_count: usize,
	) -> Result<Vec<Message>> {
		if let Some(server_id) = server_id {
			validate_id("server", server_id)?;
		}
		validate_id("channel", channel_id)?;
		validate_time_window(time_window)?;
		validate_max_count(max_count)?;
		let window = chrono::Duration::from_std(time_window)
			.map_err(|_| Error::InvalidArgument("time window out of range".into()))?;

		let hint = server_id.map(str::to_string);
		let channel_id = channel_id.to_string();

		let mut state = self.slot.lock().await;
		let outcome = tokio::time::timeout(self.config.operation_timeout, async {
			let session = Self::ensure_live(&mut state, &self.config).await?;
			self.locate_channel(session, &channel_id, hint.as_deref()).await?;
			let mut view = LiveChannelView::new(session.page());
			collect_window(&mut view, Utc::now(), window, max_count).await
		})
		.await
		.unwrap_or_else(|_| Err(self.timed_out()));
		Self::conclude(&mut state, outcome).await
	}

	/// Sends `content` to the channel and confirms it reached the timeline.
	///
	/// Content bounds are checked before the session is touched at all, so an
	/// invalid call has no observable side effect.
	pub async fn send_message(
		&self,
		server_id: Option<&str>,
		channel_id: &str,
		content: &str,
	) -> Result<SendResult> {
		validate_content(content)?;
		if let Some(server_id) = server_id {
			validate_id("server", server_id)?;
		}
		validate_id("channel", channel_id)?;

		let hint = server_id.map(str::to_string);
		let channel_id = channel_id.to_string();
		let content = content.to_string();

		let mut state = self.slot.lock().await;
		let outcome = tokio::time::timeout(self.config.operation_timeout, async {
			let session = Self::ensure_live(&mut state, &self.config).await?;
			self.locate_channel(session, &channel_id, hint.as_deref()).await?;

			if !session.wait_for_selector(dom::COMPOSER, COMPOSER_TIMEOUT).await? {
				return Err(Error::SendFailed {
					channel_id: channel_id.clone(),
					reason: "composer never became interactive".into(),
				});
			}

			let before = dom::newest_rendered_id(session.page()).await?;
			dom::submit_composer(session.page(), &content).await?;

			// Confirm the message actually entered the visible timeline; a
			// cleared composer alone proves nothing.
			let deadline = tokio::time::Instant::now() + CONFIRM_TIMEOUT;
			loop {
				let newest = dom::newest_rendered_id(session.page()).await?;
				if newest != before {
					if let Some(message_id) = newest {
						debug!(target: "dmcp", channel_id = %channel_id, message_id = %message_id, "message confirmed");
						return Ok(SendResult { message_id, status: "sent".into() });
					}
				}
				if tokio::time::Instant::now() >= deadline {
					return Err(Error::SendTimeout {
						channel_id: channel_id.clone(),
						ms: CONFIRM_TIMEOUT.as_millis() as u64,
					});
				}
				tokio::time::sleep(crate::session::POLL_INTERVAL).await;
			}
		})
		.await
		.unwrap_or_else(|_| Err(self.timed_out()));
		Self::conclude(&mut state, outcome).await
	}

	/// Scans servers for channels whose names contain any of the keywords,
	/// optionally restricted to `server_ids`. Populates the discovery cache as
	/// it goes.
	pub async fn discover_channels(
		&self,
		keywords: &[String],
		server_ids: Option<&[String]>,
	) -> Result<Vec<ChannelMatch>> {
		if keywords.is_empty() || keywords.iter().all(|k| k.trim().is_empty()) {
			return Err(Error::InvalidArgument("at least one non-empty keyword is required".into()));
		}
		validate_server_filter(server_ids)?;

		let mut state = self.slot.lock().await;
		let outcome = tokio::time::timeout(self.config.operation_timeout, async {
			let session = Self::ensure_live(&mut state, &self.config).await?;
			scan_channels(session, &self.cache, server_ids, |name| match_keywords(name, keywords))
				.await
		})
		.await
		.unwrap_or_else(|_| Err(self.timed_out()));
		Self::conclude(&mut state, outcome).await
	}

	/// Like [`discover_channels`](Self::discover_channels), but matching channel
	/// names against a case-insensitive regex instead of keyword containment.
	///
	/// A pattern that does not compile matches nothing and returns an empty
	/// result without opening a session.
	pub async fn discover_channels_by_pattern(
		&self,
		pattern: &str,
		server_ids: Option<&[String]>,
	) -> Result<Vec<ChannelMatch>> {
		if pattern.trim().is_empty() {
			return Err(Error::InvalidArgument("a non-empty pattern is required".into()));
		}
		validate_server_filter(server_ids)?;
		let Some(regex) = compile_pattern(pattern) else {
			debug!(target: "dmcp", pattern, "pattern does not compile, nothing can match");
			return Ok(Vec::new());
		};

		let mut state = self.slot.lock().await;
		let outcome = tokio::time::timeout(self.config.operation_timeout, async {
			let session = Self::ensure_live(&mut state, &self.config).await?;
			scan_channels(session, &self.cache, server_ids, |name| {
				if regex.is_match(name) { vec![pattern.to_string()] } else { Vec::new() }
			})
			.await
		})
		.await
		.unwrap_or_else(|_| Err(self.timed_out()));
		Self::conclude(&mut state, outcome).await
	}

	/// Closes the live session, if any. Safe to call repeatedly; intended for
	/// process shutdown so browser resources are always released.
	pub async fn shutdown(&self) {
		let mut state = self.slot.lock().await;
		if matches!(*state, SessionState::Live(_)) {
			debug!(target: "dmcp", "shutting down live session");
		}
		Self::teardown(&mut state).await;
	}

	/// Resolves the channel's parent server and navigates to the channel,
	/// applying the stale-mapping policy on contradiction.
	async fn locate_channel(
		&self,
		session: &mut Session,
		channel_id: &str,
		hint: Option<&str>,
	) -> Result<String> {
		let (server_id, resolution) = match hint {
			Some(server_id) => (server_id.to_string(), Resolution::Caller),
			None => match self.cache.resolve(channel_id) {
				Some(server_id) => (server_id, Resolution::Cached),
				None => {
					let server_id = discover_server(session, &self.cache, channel_id).await?;
					(server_id, Resolution::Discovered)
				}
			},
		};

		match open_channel(session, &server_id, channel_id).await {
			Ok(()) => {
				self.cache.record(channel_id, &server_id);
				Ok(server_id)
			}
			Err(Error::NotFound { .. }) => match resolution {
				// The caller named this pair; it simply does not exist.
				Resolution::Caller => {
					Err(Error::NotFound { kind: "channel", id: channel_id.to_string() })
				}
				// A cached mapping contradicted the live UI: evict and
				// re-resolve exactly once.
				Resolution::Cached => {
					warn!(target: "dmcp", channel_id, server_id = %server_id, "cached mapping contradicted, re-resolving");
					self.cache.evict(channel_id);
					let fresh = discover_server(session, &self.cache, channel_id).await?;
					match open_channel(session, &fresh, channel_id).await {
						Ok(()) => Ok(fresh),
						Err(_) => Err(Error::StaleMapping {
							channel_id: channel_id.to_string(),
							server_id: fresh,
						}),
					}
				}
				// Freshly discovered and immediately contradicted.
				Resolution::Discovered => {
					self.cache.evict(channel_id);
					Err(Error::StaleMapping {
						channel_id: channel_id.to_string(),
						server_id,
					})
				}
			},
			Err(e) => Err(e),
		}
	}

	/// Returns the live session, opening and authenticating one first if
	/// needed. A session that fails authentication is fully closed before the
	/// error is returned; no half-initialized state survives.
	async fn ensure_live<'a>(state: &'a mut SessionState, config: &Config) -> Result<&'a mut Session> {
		if !matches!(state, SessionState::Live(_)) {
			let mut session = Session::open(config).await?;
			if let Err(e) = session.ensure_authenticated(config).await {
				match tokio::time::timeout(TEARDOWN_TIMEOUT, session.close()).await {
					Ok(_) => {}
					Err(_) => warn!(target: "dmcp", "closing unauthenticated session hung, abandoning"),
				}
				return Err(e);
			}
			debug!(target: "dmcp", authenticated = session.is_authenticated(), "session ready");
			*state = SessionState::Live(session);
		}
		match state {
			SessionState::Live(session) => Ok(session),
			_ => unreachable!("session state is live after initialization"),
		}
	}

	/// Applies the failure policy to a finished operation: corrupting errors
	/// tear the session down before they are surfaced, and raw browser
	/// faults are softened to a retryable error.
	async fn conclude<T>(state: &mut SessionState, outcome: Result<T>) -> Result<T> {
		match outcome {
			Err(e) if e.is_session_corrupting() => {
				warn!(target: "dmcp", error = %e, "session-corrupting failure, recycling session");
				Self::teardown(&mut *state).await;
				Err(soften(e))
			}
			other => other,
		}
	}

	/// Destroys the current session, bounded by [`TEARDOWN_TIMEOUT`].
	/// The replacement is created lazily by the next operation.
	async fn teardown(state: &mut SessionState) {
		let previous = std::mem::replace(state, SessionState::Corrupted);
		if let SessionState::Live(session) = previous {
			debug!(
				target: "dmcp",
				last_url = session.last_known_good_url().unwrap_or("<none>"),
				"tearing down session"
			);
			match tokio::time::timeout(TEARDOWN_TIMEOUT, session.close()).await {
				Ok(Ok(())) => debug!(target: "dmcp", "session torn down"),
				Ok(Err(e)) => warn!(target: "dmcp", error = %e, "session teardown reported an error"),
				Err(_) => {
					// Dropping the timed-out future drops the browser handle,
					// which still kills the child process.
					warn!(target: "dmcp", "session teardown hung, abandoning");
				}
			}
		}
		*state = SessionState::Unopened;
	}

	fn timed_out(&self) -> Error {
		Error::OperationTimeout { ms: self.config.operation_timeout.as_millis() as u64 }
	}
}

/// Maps internal session faults to the retryable error callers see; typed
/// caller-facing errors pass through unchanged.
fn soften(e: Error) -> Error {
	match e {
		Error::Browser(source) => Error::Transient(format!("browser automation failure: {source}")),
		other => other,
	}
}

/// Navigates to a server's channel view and confirms arrival.
async fn open_server(session: &mut Session, server_id: &str) -> Result<()> {
	session.goto(&format!("{BASE_URL}/channels/{server_id}")).await?;

	let link_selector = format!(r#"a[href*="/channels/{server_id}/"]"#);
	let rendered = session.wait_for_selector(&link_selector, RENDER_TIMEOUT).await?;

	let url = session.current_url().await?;
	if !url.contains(&format!("/channels/{server_id}")) {
		return Err(Error::NotFound { kind: "server", id: server_id.to_string() });
	}
	if !rendered {
		debug!(target: "dmcp", server_id, "no channel links rendered, server may be empty");
	}
	Ok(())
}

/// Navigates to a channel and confirms the message list rendered at the
/// expected URL. A redirect elsewhere means the pair does not resolve.
async fn open_channel(session: &mut Session, server_id: &str, channel_id: &str) -> Result<()> {
	session.goto(&format!("{BASE_URL}/channels/{server_id}/{channel_id}")).await?;

	let rendered = session.wait_for_selector(dom::CHAT_LIST, RENDER_TIMEOUT).await?;

	let url = session.current_url().await?;
	if !url.contains(&format!("/channels/{server_id}/{channel_id}")) {
		return Err(Error::NotFound { kind: "channel", id: channel_id.to_string() });
	}
	if !rendered {
		return Err(Error::Transient("message list never rendered".into()));
	}
	Ok(())
}

/// Walks the visible servers (restricted to `server_ids` when given), records
/// every channel in the cache, and collects the channels the matcher accepts.
/// A single unreachable server is skipped, not fatal to the scan.
async fn scan_channels(
	session: &mut Session,
	cache: &DiscoveryCache,
	server_ids: Option<&[String]>,
	matcher: impl Fn(&str) -> Vec<String>,
) -> Result<Vec<ChannelMatch>> {
	session.goto(HOME_URL).await?;
	let mut servers = dom::extract_servers(session.page()).await?;
	if let Some(ids) = server_ids {
		servers.retain(|s| ids.iter().any(|id| id == &s.id));
	}

	let mut matches = Vec::new();
	for server in servers {
		if let Err(e) = open_server(session, &server.id).await {
			debug!(target: "dmcp", server_id = %server.id, error = %e, "skipping server during discovery");
			continue;
		}
		let channels = dom::extract_channels(session.page(), &server.id).await?;
		cache.record_channels(&channels);
		for channel in channels {
			let matched = matcher(&channel.name);
			if !matched.is_empty() {
				matches.push(ChannelMatch { channel, server: server.clone(), matched });
			}
		}
	}
	Ok(matches)
}

/// Full enumeration: walks every visible server's channel list until the
/// channel turns up. Expensive; results are cached so it runs at most once
/// per channel per process.
async fn discover_server(
	session: &mut Session,
	cache: &DiscoveryCache,
	channel_id: &str,
) -> Result<String> {
	debug!(target: "dmcp", channel_id, "discovering parent server");
	session.goto(HOME_URL).await?;
	let servers = dom::extract_servers(session.page()).await?;

	for server in servers {
		if let Err(e) = open_server(session, &server.id).await {
			debug!(target: "dmcp", server_id = %server.id, error = %e, "skipping server during resolution");
			continue;
		}
		let channels = dom::extract_channels(session.page(), &server.id).await?;
		cache.record_channels(&channels);
		if channels.iter().any(|c| c.id == channel_id) {
			return Ok(server.id);
		}
	}
	Err(Error::NotFound { kind: "channel", id: channel_id.to_string() })
}

fn validate_id(kind: &'static str, id: &str) -> Result<()> {
	if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
		return Err(Error::InvalidArgument(format!("{kind} id must be a numeric snowflake")));
	}
	Ok(())
}

fn validate_server_filter(server_ids: Option<&[String]>) -> Result<()> {
	if let Some(ids) = server_ids {
		for id in ids {
			validate_id("server", id)?;
		}
	}
	Ok(())
}

fn validate_time_window(window: Duration) -> Result<()> {
	if window < MIN_TIME_WINDOW || window > MAX_TIME_WINDOW {
		return Err(Error::InvalidArgument(
			"time window must be between 1 hour and 365 days".into(),
		));
	}
	Ok(())
}

fn validate_max_count(max_count: usize) -> Result<()> {
	if max_count == 0 || max_count > MAX_COUNT_LIMIT {
		return Err(Error::InvalidArgument("max count must be between 1 and 1000".into()));
	}
	Ok(())
}

fn validate_content(content: &str) -> Result<()> {
	let chars = content.chars().count();
	if chars == 0 || chars > MAX_CONTENT_CHARS {
		return Err(Error::InvalidArgument(
			"message content must be between 1 and 2000 characters".into(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	fn test_config() -> Config {
		Config {
			email: "user@example.com".into(),
			password: "hunter2".into(),
			headless: true,
			cookies_file: PathBuf::from("/nonexistent/cookies.json"),
			operation_timeout: Duration::from_secs(5),
		}
	}

	#[test]
	fn content_bounds() {
		assert!(validate_content("hi").is_ok());
		assert!(validate_content(&"x".repeat(2000)).is_ok());
		assert!(validate_content("").is_err());
		assert!(validate_content(&"x".repeat(2001)).is_err());
		// Bounds are in characters, not bytes.
		assert!(validate_content(&"ü".repeat(2000)).is_ok());
	}

	#[test]
	fn window_and_count_bounds() {
		assert!(validate_time_window(Duration::from_secs(3600)).is_ok());
		assert!(validate_time_window(Duration::from_secs(3599)).is_err());
		assert!(validate_time_window(Duration::from_secs(366 * 24 * 3600)).is_err());
		assert!(validate_max_count(1).is_ok());
		assert!(validate_max_count(1000).is_ok());
		assert!(validate_max_count(0).is_err());
		assert!(validate_max_count(1001).is_err());
	}

	#[test]
	fn id_validation() {
		assert!(validate_id("server", "123456789012345678").is_ok());
		assert!(validate_id("server", "").is_err());
		assert!(validate_id("channel", "abc").is_err());
		assert!(validate_id("channel", "123; drop").is_err());
	}

	#[tokio::test]
	async fn invalid_content_never_touches_the_session() {
		let supervisor = Supervisor::new(test_config());
		let err = supervisor.send_message(None, "123", "").await.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));
		// No session was created for an invalid call.
		let state = supervisor.slot.lock().await;
		assert!(matches!(*state, SessionState::Unopened));
	}

	#[tokio::test]
	async fn invalid_read_bounds_fail_before_navigation() {
		let supervisor = Supervisor::new(test_config());

		let err = supervisor
			.read_messages(None, "123", Duration::from_secs(60), 10)
			.await
			.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		let err = supervisor
			.read_messages(None, "123", Duration::from_secs(3600), 5000)
			.await
			.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		let err = supervisor
			.read_messages(Some("not-a-snowflake"), "123", Duration::from_secs(3600), 10)
			.await
			.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		let state = supervisor.slot.lock().await;
		assert!(matches!(*state, SessionState::Unopened));
	}

	#[tokio::test]
	async fn empty_keywords_rejected() {
		let supervisor = Supervisor::new(test_config());
		let err = supervisor.discover_channels(&[], None).await.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));
		let err = supervisor.discover_channels(&["  ".to_string()], None).await.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn bad_pattern_arguments_fail_before_navigation() {
		let supervisor = Supervisor::new(test_config());

		let err = supervisor.discover_channels_by_pattern("  ", None).await.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		let filter = vec!["not-a-snowflake".to_string()];
		let err = supervisor
			.discover_channels_by_pattern("release", Some(&filter))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));

		// An unparseable pattern can never match a channel name, so the scan
		// short-circuits to an empty result.
		let got = supervisor.discover_channels_by_pattern(r"[unclosed", None).await.unwrap();
		assert!(got.is_empty());

		let state = supervisor.slot.lock().await;
		assert!(matches!(*state, SessionState::Unopened));
	}

	#[tokio::test]
	async fn shutdown_without_session_is_a_no_op() {
		let supervisor = Supervisor::new(test_config());
		supervisor.shutdown().await;
		let state = supervisor.slot.lock().await;
		assert!(matches!(*state, SessionState::Unopened));
	}

	#[tokio::test]
	async fn corrupting_failures_recycle_the_slot_before_returning() {
		let mut state = SessionState::Corrupted;
		let out: Result<()> =
			Supervisor::conclude(&mut state, Err(Error::Transient("cdp went away".into()))).await;
		assert!(matches!(out, Err(Error::Transient(_))));
		assert!(matches!(state, SessionState::Unopened), "slot must be reset for the next caller");

		let mut state = SessionState::Corrupted;
		let out: Result<Vec<Message>> =
			Supervisor::conclude(&mut state, Err(Error::OperationTimeout { ms: 5000 })).await;
		assert!(matches!(out, Err(Error::OperationTimeout { ms: 5000 })));
		assert!(matches!(state, SessionState::Unopened));
	}

	#[tokio::test]
	async fn browser_faults_are_softened_after_recycling() {
		let mut state = SessionState::Corrupted;
		let out: Result<()> =
			Supervisor::conclude(&mut state, Err(Error::Browser(anyhow::anyhow!("target crashed"))))
				.await;
		assert!(matches!(out, Err(Error::Transient(_))), "raw faults must not escape");
		assert!(matches!(state, SessionState::Unopened));
	}

	#[tokio::test]
	async fn caller_facing_errors_leave_the_slot_untouched() {
		let mut state = SessionState::Corrupted;
		let out: Result<()> = Supervisor::conclude(
			&mut state,
			Err(Error::NotFound { kind: "channel", id: "123".into() }),
		)
		.await;
		assert!(matches!(out, Err(Error::NotFound { .. })));
		// No teardown ran; the marker state survives.
		assert!(matches!(state, SessionState::Corrupted));

		let mut state = SessionState::Unopened;
		let out = Supervisor::conclude(&mut state, Ok(7)).await;
		assert_eq!(out.unwrap(), 7);
		assert!(matches!(state, SessionState::Unopened));
	}

	#[test]
	fn softening_hides_raw_browser_faults() {
		let softened = soften(Error::Browser(anyhow::anyhow!("cdp went away")));
		assert!(matches!(softened, Error::Transient(_)));

		let untouched = soften(Error::Auth("denied".into()));
		assert!(matches!(untouched, Error::Auth(_)));
	}
}
