//! Core data model: servers, channels, messages.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A top-level community container (Discord calls these guilds).
///
/// Immutable once discovered within a process run; identity is the `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
	pub id: String,
	pub name: String,
}

/// Coarse channel classification derived from the channel name/markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
	Text,
	Announcement,
	Other,
}

/// A named message stream inside a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
	pub id: String,
	pub name: String,
	pub kind: ChannelKind,
	/// The server this channel belongs to. A channel has exactly one parent.
	pub server_id: String,
}

/// One extracted chat message.
///
/// Messages are immutable once observed; the `id` is the dedup and sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	/// Snowflake id: a decimal string, monotonically increasing per channel.
	pub id: String,
	pub author_name: String,
	pub content: String,
	pub timestamp: DateTime<Utc>,
	/// Attachment URLs in render order.
	pub attachments: Vec<String>,
}

/// Compares two snowflake ids numerically without parsing.
///
/// Snowflakes are decimal strings; a longer string is always the larger value,
/// equal lengths compare lexicographically. Used as the sole message sort key:
/// the service's own id ordering is more reliable than rendered timestamps.
pub fn snowflake_cmp(a: &str, b: &str) -> Ordering {
	let (a, b) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
	a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Channel {
	/// Classifies a channel from its display name.
	pub fn kind_from_name(name: &str) -> ChannelKind {
		let lower = name.to_lowercase();
		if lower.contains("announcement") || lower.contains("news") {
			ChannelKind::Announcement
		} else if name.is_empty() {
			ChannelKind::Other
		} else {
			ChannelKind::Text
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn snowflake_orders_numerically() {
		assert_eq!(snowflake_cmp("999", "1000"), Ordering::Less);
		assert_eq!(snowflake_cmp("1000", "999"), Ordering::Greater);
		assert_eq!(snowflake_cmp("123456789012345678", "123456789012345679"), Ordering::Less);
		assert_eq!(snowflake_cmp("42", "42"), Ordering::Equal);
	}

	#[test]
	fn snowflake_ignores_leading_zeros() {
		assert_eq!(snowflake_cmp("0042", "42"), Ordering::Equal);
		assert_eq!(snowflake_cmp("007", "10"), Ordering::Less);
	}

	#[test]
	fn channel_kind_heuristics() {
		assert_eq!(Channel::kind_from_name("announcements"), ChannelKind::Announcement);
		assert_eq!(Channel::kind_from_name("release-news"), ChannelKind::Announcement);
		assert_eq!(Channel::kind_from_name("general"), ChannelKind::Text);
		assert_eq!(Channel::kind_from_name(""), ChannelKind::Other);
	}
}
