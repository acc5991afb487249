//! The markup-dependent layer: selectors, in-page JS, and the live
//! [`ChannelView`] implementation.
//!
//! Everything that can break when Discord changes its DOM lives here, behind
//! the narrow extraction interface. Breakage shows up as empty extractions or
//! missed stability deadlines, which the supervisor classifies and recovers
//! from; it is never silently reordered data.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::page::Page;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::{Error, Result};
use crate::extract::ChannelView;
use crate::session::POLL_INTERVAL;
use crate::types::{Channel, Message, Server};

pub(crate) const GUILD_NAV_ITEM: &str = r#"[data-list-id="guildsnav"] [role="treeitem"]"#;
pub(crate) const CHAT_LIST: &str = r#"[data-list-id="chat-messages"]"#;
pub(crate) const COMPOSER: &str = r#"[data-slate-editor="true"]"#;
pub(crate) const LOGIN_EMAIL: &str = r#"input[name="email"]"#;
pub(crate) const LOGIN_PASSWORD: &str = r#"input[name="password"]"#;
pub(crate) const LOGIN_SUBMIT: &str = r#"button[type="submit"]"#;

/// How long the newest rendered id may keep changing before we give up on
/// confirming the live position.
const STABILITY_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a backward scroll step may take to surface older content.
const SCROLL_TIMEOUT: Duration = Duration::from_secs(5);
/// How long server/channel navigation chrome may take to render.
const RENDER_TIMEOUT: Duration = Duration::from_secs(15);

const GUILDS_JS: &str = r#"
() => {
	const guilds = [];
	const items = document.querySelectorAll('[data-list-id="guildsnav"] [role="treeitem"]');
	items.forEach(item => {
		const listItemId = item.getAttribute('data-list-item-id') || '';
		if (!listItemId.startsWith('guildsnav___') || listItemId === 'guildsnav___home') return;
		const id = listItemId.replace('guildsnav___', '');
		if (!/^[0-9]+$/.test(id)) return;
		let name = (item.textContent || '').trim();
		name = name.replace(/^\d+\s+mentions?,\s*/, '').replace(/\s+/g, ' ').trim();
		if (name && !guilds.some(g => g.id === id)) guilds.push({ id, name });
	});
	return guilds;
}
"#;

const GUILD_NAV_STATE_JS: &str = r#"
() => {
	const nav = document.querySelector('[data-list-id="guildsnav"]');
	const container = nav ? (nav.closest('[class*="guilds"]') || nav.parentElement) : null;
	if (container) container.scrollBy(0, 300);
	return document.querySelectorAll('[data-list-id="guildsnav"] [role="treeitem"]').length;
}
"#;

const CHANNELS_JS: &str = r#"
() => {
	const guildId = '__GUILD_ID__';
	const channels = [];
	const seen = new Set();
	document.querySelectorAll('a[href*="/channels/"]').forEach(a => {
		const match = (a.href || '').match(/\/channels\/([0-9]+)\/([0-9]+)/);
		if (!match || match[1] !== guildId) return;
		const id = match[2];
		if (seen.has(id)) return;
		seen.add(id);
		let name = (a.textContent || '').trim();
		name = name.replace(/^[^a-zA-Z0-9#\-_]+/, '').replace(/\s+/g, ' ').trim();
		if (name && !name.includes('undefined')) channels.push({ id, name });
	});
	return channels;
}
"#;

const MESSAGES_JS: &str = r#"
() => {
	const records = [];
	const items = document.querySelectorAll('[data-list-id="chat-messages"] [id^="chat-messages-"]');
	items.forEach(item => {
		const id = (item.id || '').split('-').pop();
		if (!/^[0-9]+$/.test(id)) return;
		let content = '';
		for (const sel of ['[id^="message-content-"]', '[class*="messageContent"]', '[class*="markup"]']) {
			const el = item.querySelector(sel);
			if (el && el.textContent) { content = el.textContent.trim(); break; }
		}
		let author = '';
		for (const sel of ['[class*="username"]', '[class*="authorName"]']) {
			const el = item.querySelector(sel);
			if (el && el.textContent) { author = el.textContent.trim(); break; }
		}
		const timeEl = item.querySelector('time[datetime]');
		const timestamp = timeEl ? timeEl.getAttribute('datetime') : null;
		const attachments = [];
		item.querySelectorAll('a[href*="cdn.discordapp.com"]').forEach(a => {
			if (a.href) attachments.push(a.href);
		});
		records.push({ id, author, content, timestamp, attachments });
	});
	return records;
}
"#;

const NEWEST_ID_JS: &str = r#"
() => {
	const items = document.querySelectorAll('[data-list-id="chat-messages"] [id^="chat-messages-"]');
	if (!items.length) return null;
	return (items[items.length - 1].id || '').split('-').pop();
}
"#;

const OLDEST_ID_JS: &str = r#"
() => {
	const items = document.querySelectorAll('[data-list-id="chat-messages"] [id^="chat-messages-"]');
	if (!items.length) return null;
	return (items[0].id || '').split('-').pop();
}
"#;

const SCROLL_TO_LIVE_JS: &str = r#"
() => {
	const chat = document.querySelector('[data-list-id="chat-messages"]');
	const scroller = chat ? (chat.closest('[class*="scroller"]') || chat) : null;
	if (!scroller) return false;
	scroller.scrollTop = scroller.scrollHeight;
	return true;
}
"#;

const SCROLL_BACK_JS: &str = r#"
() => {
	const chat = document.querySelector('[data-list-id="chat-messages"]');
	const scroller = chat ? (chat.closest('[class*="scroller"]') || chat) : null;
	if (!scroller) return null;
	scroller.scrollBy(0, -Math.round(scroller.clientHeight * 0.9));
	return scroller.scrollTop;
}
"#;

#[derive(Debug, Deserialize)]
struct RawGuild {
	id: String,
	name: String,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
	id: String,
	name: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
	id: String,
	author: String,
	content: String,
	timestamp: Option<String>,
	attachments: Vec<String>,
}

/// Polls for a selector until it appears or the deadline passes.
pub(crate) async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Result<bool> {
	let deadline = Instant::now() + timeout;
	loop {
		if page.find_element(selector).await.is_ok() {
			return Ok(true);
		}
		if Instant::now() >= deadline {
			return Ok(false);
		}
		sleep(POLL_INTERVAL).await;
	}
}

async fn eval_into<T: serde::de::DeserializeOwned>(page: &Page, js: &str) -> Result<T> {
	let result = page.evaluate_function(js).await.map_err(|e| Error::Browser(e.into()))?;
	Ok(result.into_value()?)
}

/// Reads the server list from the rendered guild navigation, in display order.
///
/// The nav is itself virtualized, so it is nudged downward until the rendered
/// item count stops growing before the list is read.
pub(crate) async fn extract_servers(page: &Page) -> Result<Vec<Server>> {
	if !wait_for_selector(page, GUILD_NAV_ITEM, RENDER_TIMEOUT).await? {
		return Err(Error::Transient("guild navigation never rendered".into()));
	}

	let deadline = Instant::now() + STABILITY_TIMEOUT;
	let mut prev_count: i64 = -1;
	let mut stable = 0u8;
	while Instant::now() < deadline {
		let count: i64 = eval_into(page, GUILD_NAV_STATE_JS).await?;
		if count == prev_count {
			stable += 1;
			if stable >= 2 {
				break;
			}
		} else {
			stable = 0;
			prev_count = count;
		}
		sleep(POLL_INTERVAL).await;
	}

	let raw: Vec<RawGuild> = eval_into(page, GUILDS_JS).await?;
	debug!(target: "dmcp", count = raw.len(), "servers extracted");
	Ok(raw.into_iter().map(|g| Server { id: g.id, name: g.name }).collect())
}

/// Reads the channel list of an already navigated-to server.
pub(crate) async fn extract_channels(page: &Page, server_id: &str) -> Result<Vec<Channel>> {
	let js = CHANNELS_JS.replace("__GUILD_ID__", server_id);
	let raw: Vec<RawChannel> = eval_into(page, &js).await?;
	debug!(target: "dmcp", server_id, count = raw.len(), "channels extracted");
	Ok(raw
		.into_iter()
		.map(|c| Channel {
			kind: Channel::kind_from_name(&c.name),
			id: c.id,
			name: c.name,
			server_id: server_id.to_string(),
		})
		.collect())
}

/// Focuses the message composer, types `content`, and submits it.
pub(crate) async fn submit_composer(page: &Page, content: &str) -> Result<()> {
	let composer = page.find_element(COMPOSER).await.map_err(|e| Error::Browser(e.into()))?;
	composer.click().await.map_err(|e| Error::Browser(e.into()))?;
	composer.type_str(content).await.map_err(|e| Error::Browser(e.into()))?;
	composer.press_key("Enter").await.map_err(|e| Error::Browser(e.into()))?;
	Ok(())
}

/// Id of the newest message currently rendered, if any.
pub(crate) async fn newest_rendered_id(page: &Page) -> Result<Option<String>> {
	eval_into(page, NEWEST_ID_JS).await
}

async fn oldest_rendered_id(page: &Page) -> Result<Option<String>> {
	eval_into(page, OLDEST_ID_JS).await
}

/// [`ChannelView`] over the live, virtualized Discord message list.
pub struct LiveChannelView<'a> {
	page: &'a Page,
}

impl<'a> LiveChannelView<'a> {
	pub fn new(page: &'a Page) -> Self {
		Self { page }
	}
}

#[async_trait]
impl ChannelView for LiveChannelView<'_> {
	async fn seek_to_live(&mut self) -> Result<bool> {
		// Pin the scroller to the bottom, then require the newest rendered id
		// to hold still across consecutive checks. A fixed post-scroll delay
		// is exactly the nondeterminism this replaces.
		let deadline = Instant::now() + STABILITY_TIMEOUT;
		let mut prev: Option<Option<String>> = None;
		let mut stable = 0u8;
		loop {
			let pinned: bool = eval_into(self.page, SCROLL_TO_LIVE_JS).await?;
			if !pinned {
				return Ok(false);
			}
			let newest = newest_rendered_id(self.page).await?;
			if prev.as_ref() == Some(&newest) {
				stable += 1;
				if stable >= 2 {
					return Ok(true);
				}
			} else {
				stable = 0;
				prev = Some(newest);
			}
			if Instant::now() >= deadline {
				return Ok(false);
			}
			sleep(POLL_INTERVAL).await;
		}
	}

	async fn extract_rendered_messages(&mut self) -> Result<Vec<Message>> {
		let raw: Vec<RawMessage> = eval_into(self.page, MESSAGES_JS).await?;
		let mut messages = Vec::with_capacity(raw.len());
		for record in raw {
			if record.content.is_empty() && record.attachments.is_empty() {
				continue;
			}
			let Some(ts) = record.timestamp.as_deref() else {
				debug!(target: "dmcp", id = %record.id, "skipping message without timestamp");
				continue;
			};
			let Ok(timestamp) = DateTime::parse_from_rfc3339(ts) else {
				debug!(target: "dmcp", id = %record.id, ts, "skipping unparseable timestamp");
				continue;
			};
			messages.push(Message {
				id: record.id,
				author_name: if record.author.is_empty() { "Unknown".into() } else { record.author },
				content: record.content,
				timestamp: timestamp.with_timezone(&Utc),
				attachments: record.attachments,
			});
		}
		Ok(messages)
	}

	async fn scroll_back_one_page(&mut self) -> Result<bool> {
		let before = oldest_rendered_id(self.page).await?;
		if before.is_none() {
			return Ok(false);
		}
		let scroll_top: Option<f64> = eval_into(self.page, SCROLL_BACK_JS).await?;
		let Some(scroll_top) = scroll_top else {
			return Ok(false);
		};

		// Wait for lazy loading to surface older content rather than sleeping
		// a fixed amount. An unchanged view at scrollTop 0 is the top of
		// history; an unchanged view elsewhere is left for the caller's
		// no-new-ids rule to settle.
		let deadline = Instant::now() + SCROLL_TIMEOUT;
		loop {
			let oldest = oldest_rendered_id(self.page).await?;
			if oldest != before {
				return Ok(true);
			}
			if Instant::now() >= deadline {
				return Ok(scroll_top > 0.0);
			}
			sleep(POLL_INTERVAL).await;
		}
	}
}
