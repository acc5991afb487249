//! Pure message extraction: ordering, dedup, and time-window pagination.
//!
//! The markup-dependent scraping lives behind [`ChannelView`]; everything in
//! [`collect_window`] is deterministic and tested against synthetic views.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::{Error, Result};
use crate::types::{Message, snowflake_cmp};

/// A channel view that has already been navigated to and rendered.
///
/// The UI virtualizes its message list: only a window of messages exists in
/// the DOM at any instant, and content loads lazily as the view scrolls.
#[async_trait]
pub trait ChannelView {
	/// Forces the view to the absolute most-recent message and confirms
	/// arrival (the newest rendered id has stopped changing). Returns `false`
	/// if the live position could not be confirmed within the deadline.
	async fn seek_to_live(&mut self) -> Result<bool>;

	/// Extracts every message currently present in the rendered view.
	async fn extract_rendered_messages(&mut self) -> Result<Vec<Message>>;

	/// Scrolls one screen toward older content. Returns `false` once the top
	/// of the available history is reached.
	async fn scroll_back_one_page(&mut self) -> Result<bool>;
}

/// Snowflake-ordered map key, so the accumulator iterates oldest-first.
///
/// Equality must agree with the ordering for map-key coherence, so it goes
/// through `snowflake_cmp` too; ids that differ only in leading zeros are the
/// same key.
#[derive(Debug)]
struct IdKey(String);

impl Ord for IdKey {
	fn cmp(&self, other: &Self) -> Ordering {
		snowflake_cmp(&self.0, &other.0)
	}
}

impl PartialOrd for IdKey {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for IdKey {
	fn eq(&self, other: &Self) -> bool {
		snowflake_cmp(&self.0, &other.0) == Ordering::Equal
	}
}

impl Eq for IdKey {}

/// Collects up to `max_count` messages with timestamps in
/// `[now - time_window, now]`, newest first, deduplicated by id.
///
/// The view is seeked to the live position before anything is extracted, so
/// "newest" is anchored to the head of the channel and never to wherever the
/// view happened to be. That anchor is what makes the result a prefix-stable
/// function of `max_count`: a larger limit only extends the result further
/// into the past.
pub async fn collect_window<V: ChannelView + ?Sized>(
	view: &mut V,
	now: DateTime<Utc>,
	time_window: ChronoDuration,
	max_count: usize,
) -> Result<Vec<Message>> {
	if !view.seek_to_live().await? {
		return Err(Error::Transient("channel view never stabilized at live position".into()));
	}

	let cutoff = now - time_window;
	let mut seen: BTreeMap<IdKey, Message> = BTreeMap::new();
	let mut scrolled = false;

	loop {
		let rendered = view.extract_rendered_messages().await?;
		let before = seen.len();
		for message in rendered {
			// Same id observed twice collapses to one logical entry.
			seen.entry(IdKey(message.id.clone())).or_insert(message);
		}
		let grew = seen.len() > before;

		if seen.len() >= max_count {
			break;
		}
		if let Some((_, oldest)) = seen.first_key_value() {
			if oldest.timestamp < cutoff {
				break;
			}
		}
		// A scroll step that surfaces no new ids means we hit the top of
		// the available history.
		if scrolled && !grew {
			break;
		}
		if !view.scroll_back_one_page().await? {
			break;
		}
		scrolled = true;
	}

	let mut messages: Vec<Message> = seen
		.into_values()
		.rev()
		.filter(|m| m.timestamp >= cutoff && m.timestamp <= now)
		.collect();
	messages.truncate(max_count);
	Ok(messages)
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Synthetic virtualized view: a sequence of rendered screenfuls, one
	/// scroll step apart, newest screen first.
	struct FakeView {
		screens: Vec<Vec<Message>>,
		position: usize,
		live_ok: bool,
	}

	impl FakeView {
		fn new(screens: Vec<Vec<Message>>) -> Self {
			Self { screens, position: 0, live_ok: true }
		}
	}

	#[async_trait]
	impl ChannelView for FakeView {
		async fn seek_to_live(&mut self) -> Result<bool> {
			self.position = 0;
			Ok(self.live_ok)
		}

		async fn extract_rendered_messages(&mut self) -> Result<Vec<Message>> {
			Ok(self.screens.get(self.position).cloned().unwrap_or_default())
		}

		async fn scroll_back_one_page(&mut self) -> Result<bool> {
			if self.position + 1 < self.screens.len() {
				self.position += 1;
				Ok(true)
			} else {
				Ok(false)
			}
		}
	}

	fn now() -> DateTime<Utc> {
		"2026-08-30T12:00:00Z".parse().unwrap()
	}

	fn msg(id: u64, hours_ago: i64) -> Message {
		Message {
			id: id.to_string(),
			author_name: format!("user-{}", id % 5),
			content: format!("message {id}"),
			timestamp: now() - ChronoDuration::hours(hours_ago),
			attachments: Vec::new(),
		}
	}

	/// 25 messages spanning the last 48 hours, newest first across screens
	/// with one message of overlap between adjacent screens.
	fn overlapping_screens() -> Vec<Vec<Message>> {
		let all: Vec<Message> = (0..25).map(|i| msg(1000 - i as u64, i as i64 * 2)).collect();
		all.chunks(6)
			.enumerate()
			.map(|(i, chunk)| {
				let mut screen: Vec<Message> = chunk.to_vec();
				if i > 0 {
					screen.insert(0, all[i * 6 - 1].clone());
				}
				screen
			})
			.collect()
	}

	#[tokio::test]
	async fn window_filtering_newest_first() {
		let mut view = FakeView::new(overlapping_screens());
		let got = collect_window(&mut view, now(), ChronoDuration::hours(24), 100)
			.await
			.unwrap();

		// Messages are 2h apart; exactly 13 fall within the last 24 hours.
		assert_eq!(got.len(), 13);
		assert_eq!(got[0].id, "1000");
		assert_eq!(got[12].id, "988");
		for m in &got {
			assert!(m.timestamp >= now() - ChronoDuration::hours(24));
			assert!(m.timestamp <= now());
		}
	}

	#[tokio::test]
	async fn dedup_across_overlapping_screens() {
		let mut view = FakeView::new(overlapping_screens());
		let got = collect_window(&mut view, now(), ChronoDuration::hours(48), 100)
			.await
			.unwrap();

		assert_eq!(got.len(), 25);
		let mut ids: Vec<&str> = got.iter().map(|m| m.id.as_str()).collect();
		ids.dedup();
		assert_eq!(ids.len(), 25, "no id may appear twice");
	}

	#[tokio::test]
	async fn ids_strictly_descending() {
		let mut view = FakeView::new(overlapping_screens());
		let got = collect_window(&mut view, now(), ChronoDuration::hours(48), 100)
			.await
			.unwrap();

		for pair in got.windows(2) {
			assert_eq!(snowflake_cmp(&pair[0].id, &pair[1].id), Ordering::Greater);
		}
	}

	#[tokio::test]
	async fn larger_limit_only_extends_the_result() {
		let window = ChronoDuration::hours(48);

		let mut view = FakeView::new(overlapping_screens());
		let small = collect_window(&mut view, now(), window, 5).await.unwrap();

		let mut view = FakeView::new(overlapping_screens());
		let large = collect_window(&mut view, now(), window, 20).await.unwrap();

		assert_eq!(small.len(), 5);
		assert_eq!(large.len(), 20);
		assert_eq!(&large[..5], &small[..], "first entries must not shift with max_count");
	}

	#[tokio::test]
	async fn stops_at_top_of_history() {
		let screens = vec![vec![msg(10, 1), msg(9, 2)], vec![msg(9, 2), msg(8, 3)]];
		let mut view = FakeView::new(screens);
		let got = collect_window(&mut view, now(), ChronoDuration::hours(168), 50)
			.await
			.unwrap();

		assert_eq!(got.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["10", "9", "8"]);
	}

	#[tokio::test]
	async fn truncates_to_max_count_keeping_newest() {
		let mut view = FakeView::new(overlapping_screens());
		let got = collect_window(&mut view, now(), ChronoDuration::hours(48), 3)
			.await
			.unwrap();

		assert_eq!(got.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["1000", "999", "998"]);
	}

	#[tokio::test]
	async fn leading_zero_id_aliases_collapse_to_one_message() {
		// Rendered ids are only checked to be digits, so the same message may
		// surface with and without leading zeros across scroll steps.
		let canonical = msg(42, 1);
		let mut alias = canonical.clone();
		alias.id = "0042".to_string();

		let mut view = FakeView::new(vec![vec![canonical], vec![alias]]);
		let got = collect_window(&mut view, now(), ChronoDuration::hours(24), 10)
			.await
			.unwrap();

		assert_eq!(got.len(), 1);
		assert_eq!(got[0].id, "42");
	}

	#[tokio::test]
	async fn empty_channel_returns_empty() {
		let mut view = FakeView::new(vec![Vec::new()]);
		let got = collect_window(&mut view, now(), ChronoDuration::hours(24), 10)
			.await
			.unwrap();
		assert!(got.is_empty());
	}

	#[tokio::test]
	async fn unconfirmed_live_position_is_transient() {
		let mut view = FakeView::new(overlapping_screens());
		view.live_ok = false;
		let err = collect_window(&mut view, now(), ChronoDuration::hours(24), 10)
			.await
			.unwrap_err();
		assert!(matches!(err, Error::Transient(_)));
	}
}
