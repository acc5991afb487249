//! Channel-to-server identity discovery and its process-lifetime cache.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::types::{Channel, Server};

/// Process-lifetime map from channel id to parent server id.
///
/// Populated as a side effect of channel listing. Membership is assumed stable
/// for the life of the process, so entries survive session resets; an
/// operation that observes a contradiction evicts the entry and re-resolves
/// once before giving up.
///
/// Reads are plain lock reads over settled data and do not require the
/// operation serializer; writes only happen inside serialized operations.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
	entries: RwLock<HashMap<String, String>>,
}

impl DiscoveryCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Looks up the parent server for a channel. `None` means unknown.
	pub fn resolve(&self, channel_id: &str) -> Option<String> {
		self.entries
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(channel_id)
			.cloned()
	}

	/// Records a resolved mapping. Last write wins.
	pub fn record(&self, channel_id: &str, server_id: &str) {
		self.entries
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(channel_id.to_string(), server_id.to_string());
	}

	/// Records every channel of a freshly listed server.
	pub fn record_channels(&self, channels: &[Channel]) {
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		for channel in channels {
			entries.insert(channel.id.clone(), channel.server_id.clone());
		}
	}

	/// Drops a mapping that contradicted the live UI.
	pub fn evict(&self, channel_id: &str) {
		self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(channel_id);
	}

	/// Drops everything. Only used on a full reset where stale UI state may
	/// have produced incorrect mappings.
	pub fn clear(&self) {
		self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
	}

	pub fn len(&self) -> usize {
		self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// A channel that matched a discovery scan, with the reason it matched.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelMatch {
	pub channel: Channel,
	pub server: Server,
	pub matched: Vec<String>,
}

/// Case-insensitive keyword containment against a channel name.
///
/// Returns the keywords that matched, empty when none did.
pub fn match_keywords(channel_name: &str, keywords: &[String]) -> Vec<String> {
	let name = channel_name.to_lowercase();
	keywords.iter().filter(|k| name.contains(&k.to_lowercase())).cloned().collect()
}

/// Compiles a case-insensitive channel-name search pattern.
///
/// `None` means the pattern does not compile; a scan treats that as matching
/// nothing rather than failing the operation.
pub fn compile_pattern(pattern: &str) -> Option<Regex> {
	RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::ChannelKind;

	fn channel(id: &str, name: &str, server_id: &str) -> Channel {
		Channel {
			id: id.to_string(),
			name: name.to_string(),
			kind: Channel::kind_from_name(name),
			server_id: server_id.to_string(),
		}
	}

	#[test]
	fn resolve_round_trip() {
		let cache = DiscoveryCache::new();
		assert_eq!(cache.resolve("42"), None);

		cache.record("42", "7");
		assert_eq!(cache.resolve("42"), Some("7".to_string()));

		cache.evict("42");
		assert_eq!(cache.resolve("42"), None);
	}

	#[test]
	fn record_channels_populates_every_entry() {
		let cache = DiscoveryCache::new();
		cache.record_channels(&[
			channel("1", "general", "100"),
			channel("2", "announcements", "100"),
		]);
		assert_eq!(cache.resolve("1"), Some("100".to_string()));
		assert_eq!(cache.resolve("2"), Some("100".to_string()));
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn clear_empties_the_cache() {
		let cache = DiscoveryCache::new();
		cache.record("1", "100");
		cache.clear();
		assert!(cache.is_empty());
	}

	#[test]
	fn keyword_matching_is_case_insensitive() {
		let keywords = vec!["News".to_string(), "feedback".to_string()];
		assert_eq!(match_keywords("release-news", &keywords), vec!["News".to_string()]);
		assert!(match_keywords("general", &keywords).is_empty());
		assert_eq!(
			match_keywords("NEWS-and-FEEDBACK", &keywords),
			vec!["News".to_string(), "feedback".to_string()]
		);
	}

	#[test]
	fn pattern_matching_is_case_insensitive() {
		let re = compile_pattern(r"^release-v\d+").unwrap();
		assert!(re.is_match("release-v42"));
		assert!(re.is_match("RELEASE-V1-notes"));
		assert!(!re.is_match("general"));
	}

	#[test]
	fn invalid_pattern_matches_nothing() {
		assert!(compile_pattern(r"[unclosed").is_none());
	}

	#[test]
	fn channel_kind_from_name() {
		assert_eq!(channel("1", "announcements", "s").kind, ChannelKind::Announcement);
		assert_eq!(channel("1", "general", "s").kind, ChannelKind::Text);
	}
}
