//! Interactive track selection for albums
//!
//! Before an album's tracks are downloaded, the [`SelectionGate`] asks a
//! [`TrackSelector`] (normally the UI) which entries to fetch. The album's
//! worker waits on the answer while every other worker keeps running.
//!
//! An empty confirmation is a user error and leads to a new prompt;
//! cancellation is a separate answer that drops the whole album.

use crate::resolver::AlbumEntry;
use crate::types::AlbumId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// What the selector is shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPrompt {
    /// Album being asked about
    pub album_id: AlbumId,
    /// Album title
    pub album_title: String,
    /// Available entries, in playlist order
    pub entries: Vec<AlbumEntry>,
    /// 1 for the first prompt; higher after an empty confirmation
    pub attempt: u32,
}

/// Answer to a [`SelectionPrompt`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "indices", rename_all = "snake_case")]
pub enum SelectionResponse {
    /// Indices into [`SelectionPrompt::entries`]
    Selected(Vec<usize>),
    /// Drop the album
    Canceled,
}

/// Trait for the party choosing album tracks
#[async_trait]
pub trait TrackSelector: Send + Sync {
    /// Ask which entries to download. May wait indefinitely for a human.
    async fn request_track_selection(&self, prompt: SelectionPrompt) -> SelectionResponse;
}

/// Selector that picks every available entry without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectAll;

#[async_trait]
impl TrackSelector for SelectAll {
    async fn request_track_selection(&self, prompt: SelectionPrompt) -> SelectionResponse {
        SelectionResponse::Selected((0..prompt.entries.len()).collect())
    }
}

/// A pending prompt handed to the presentation layer
///
/// Dropping it without calling [`respond`](Self::respond) cancels the album.
#[derive(Debug)]
pub struct SelectionRequest {
    /// What to show
    pub prompt: SelectionPrompt,
    responder: oneshot::Sender<SelectionResponse>,
}

impl SelectionRequest {
    /// Send the user's answer back to the waiting album worker
    pub fn respond(self, response: SelectionResponse) {
        // The batch may already be gone; nobody is left to tell
        self.responder.send(response).ok();
    }
}

/// Selector forwarding prompts over a channel
///
/// # Examples
///
/// ```
/// use trackfetch::selection::{ChannelTrackSelector, SelectionResponse};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (selector, mut requests) = ChannelTrackSelector::new(4);
/// tokio::spawn(async move {
///     while let Some(request) = requests.recv().await {
///         let all = (0..request.prompt.entries.len()).collect();
///         request.respond(SelectionResponse::Selected(all));
///     }
/// });
/// # drop(selector);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelTrackSelector {
    requests: mpsc::Sender<SelectionRequest>,
}

impl ChannelTrackSelector {
    /// Create a selector and the receiver the UI reads prompts from
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<SelectionRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl TrackSelector for ChannelTrackSelector {
    async fn request_track_selection(&self, prompt: SelectionPrompt) -> SelectionResponse {
        let (responder, response) = oneshot::channel();
        let request = SelectionRequest { prompt, responder };

        if self.requests.send(request).await.is_err() {
            tracing::warn!("track selection receiver closed, canceling album");
            return SelectionResponse::Canceled;
        }
        response.await.unwrap_or(SelectionResponse::Canceled)
    }
}

/// Exactly one of these is produced per album
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Entries to download, in playlist order
    Selected(Vec<AlbumEntry>),
    /// The album was dropped
    Canceled,
}

/// Runs the prompt/re-prompt protocol against a [`TrackSelector`]
#[derive(Clone)]
pub struct SelectionGate {
    selector: Arc<dyn TrackSelector>,
}

impl SelectionGate {
    /// Create a gate backed by `selector`
    pub fn new(selector: Arc<dyn TrackSelector>) -> Self {
        Self { selector }
    }

    /// Ask for a selection until a non-empty one or a cancellation arrives
    ///
    /// Out-of-range and duplicate indices are ignored; the result keeps
    /// playlist order regardless of the order the indices came in.
    pub async fn select(
        &self,
        album_id: AlbumId,
        album_title: &str,
        entries: &[AlbumEntry],
    ) -> SelectionOutcome {
        let mut attempt = 1;
        loop {
            let prompt = SelectionPrompt {
                album_id,
                album_title: album_title.to_string(),
                entries: entries.to_vec(),
                attempt,
            };

            match self.selector.request_track_selection(prompt).await {
                SelectionResponse::Canceled => {
                    tracing::info!(album = %album_title, "track selection canceled");
                    return SelectionOutcome::Canceled;
                }
                SelectionResponse::Selected(indices) => {
                    let chosen: BTreeSet<usize> =
                        indices.into_iter().filter(|&i| i < entries.len()).collect();
                    if chosen.is_empty() {
                        tracing::warn!(
                            album = %album_title,
                            attempt,
                            "empty track selection, asking again"
                        );
                        attempt += 1;
                        continue;
                    }

                    tracing::info!(
                        album = %album_title,
                        selected = chosen.len(),
                        available = entries.len(),
                        "tracks selected"
                    );
                    return SelectionOutcome::Selected(
                        chosen.into_iter().map(|i| entries[i].clone()).collect(),
                    );
                }
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_helpers::ScriptedSelector;

    fn entries(count: usize) -> Vec<AlbumEntry> {
        (0..count)
            .map(|i| AlbumEntry {
                position: i,
                title: format!("Track {i}"),
                artist: "Band".into(),
                source_url: format!("https://soundcloud.com/band/track-{i}"),
            })
            .collect()
    }

    fn titles(outcome: &SelectionOutcome) -> Vec<String> {
        match outcome {
            SelectionOutcome::Selected(entries) => entries.iter().map(|e| e.title.clone()).collect(),
            SelectionOutcome::Canceled => panic!("expected a selection"),
        }
    }

    #[tokio::test]
    async fn select_all_picks_every_entry() {
        let gate = SelectionGate::new(Arc::new(SelectAll));
        let outcome = gate.select(AlbumId(1), "Live", &entries(3)).await;

        assert_eq!(titles(&outcome), vec!["Track 0", "Track 1", "Track 2"]);
    }

    #[tokio::test]
    async fn indices_are_deduplicated_filtered_and_sorted() {
        let selector = Arc::new(ScriptedSelector::new([SelectionResponse::Selected(vec![
            3, 0, 3, 42,
        ])]));
        let gate = SelectionGate::new(selector);

        let outcome = gate.select(AlbumId(1), "Live", &entries(4)).await;
        assert_eq!(titles(&outcome), vec!["Track 0", "Track 3"]);
    }

    #[tokio::test]
    async fn empty_selection_prompts_again() {
        let selector = Arc::new(ScriptedSelector::new([
            SelectionResponse::Selected(vec![]),
            SelectionResponse::Selected(vec![99]),
            SelectionResponse::Selected(vec![1]),
        ]));
        let gate = SelectionGate::new(selector.clone());

        let outcome = gate.select(AlbumId(7), "Live", &entries(2)).await;
        assert_eq!(titles(&outcome), vec!["Track 1"]);

        let attempts: Vec<u32> = selector.prompts().iter().map(|p| p.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert!(selector.prompts().iter().all(|p| p.album_id == AlbumId(7)));
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_empty_selection() {
        let selector = Arc::new(ScriptedSelector::new([
            SelectionResponse::Selected(vec![]),
            SelectionResponse::Canceled,
        ]));
        let gate = SelectionGate::new(selector.clone());

        let outcome = gate.select(AlbumId(1), "Live", &entries(2)).await;
        assert_eq!(outcome, SelectionOutcome::Canceled);
        assert_eq!(selector.prompts().len(), 2);
    }

    #[tokio::test]
    async fn channel_selector_round_trips_through_ui_task() {
        let (selector, mut requests) = ChannelTrackSelector::new(1);
        let ui = tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            assert_eq!(request.prompt.album_title, "Live");
            request.respond(SelectionResponse::Selected(vec![1]));
        });

        let gate = SelectionGate::new(Arc::new(selector));
        let outcome = gate.select(AlbumId(1), "Live", &entries(2)).await;
        ui.await.unwrap();

        assert_eq!(titles(&outcome), vec!["Track 1"]);
    }

    #[tokio::test]
    async fn dropped_request_counts_as_cancellation() {
        let (selector, mut requests) = ChannelTrackSelector::new(1);
        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            drop(request);
        });

        let gate = SelectionGate::new(Arc::new(selector));
        assert_eq!(
            gate.select(AlbumId(1), "Live", &entries(2)).await,
            SelectionOutcome::Canceled
        );
    }

    #[tokio::test]
    async fn closed_channel_counts_as_cancellation() {
        let (selector, requests) = ChannelTrackSelector::new(1);
        drop(requests);

        let gate = SelectionGate::new(Arc::new(selector));
        assert_eq!(
            gate.select(AlbumId(1), "Live", &entries(2)).await,
            SelectionOutcome::Canceled
        );
    }
}
