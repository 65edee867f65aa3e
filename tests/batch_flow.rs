//! End-to-end batch flow through the public API
//!
//! These tests drive [`BatchCoordinator`] with an in-memory catalog instead
//! of yt-dlp, covering mixed batches of singles and albums from submission
//! to the final report.

mod common;

use common::{
    AnswersByAlbum, FakeCatalog, assert_counts, assert_files_exist, assert_single_finish,
    drain_events, fast_config,
};
use std::sync::Arc;
use tempfile::TempDir;
use trackfetch::{
    BatchCoordinator, BatchOutcome, BatchRequest, DownloadStatus, Error, Event, SelectAll,
    SelectionResponse,
};

const YT_LINK: &str = "https://www.youtube.com/watch?v=abcdefghijk";
const SC_SINGLE: &str = "https://soundcloud.com/artist/night-drive";
const SC_ALBUM: &str = "https://soundcloud.com/band/sets/first-light";

#[tokio::test]
async fn mixed_batch_downloads_everything_that_resolves() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(
        FakeCatalog::new()
            .track(YT_LINK, "Sunrise", "Artist")
            .track(SC_SINGLE, "Night Drive", "Artist")
            .album(
                SC_ALBUM,
                "First Light",
                "Band",
                &[Some("Intro"), None, Some("Outro")],
            ),
    );
    let coordinator = BatchCoordinator::new(
        fast_config(temp_dir.path()),
        catalog.clone(),
        Arc::new(SelectAll),
    )
    .unwrap();
    let mut events = coordinator.subscribe();

    // Short and pasted forms normalize to the canonical links above
    let text = format!("youtu.be/abcdefghijk\n\n@{SC_SINGLE}\n{SC_ALBUM}\n");
    let report = coordinator
        .submit_batch(BatchRequest::from_text(&text))
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_counts(&report, 4, 0, 4);
    assert!(report.is_success());
    assert_files_exist(
        temp_dir.path(),
        &[
            "Sunrise.mp3",
            "Night Drive.mp3",
            "First Light/Intro.mp3",
            "First Light/Outro.mp3",
        ],
    );

    let events = drain_events(&mut events);
    assert!(matches!(events.first(), Some(Event::BatchStarted { total: 3 })));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::TracksSkipped { skipped: 1, .. }))
    );
    assert_single_finish(&events, &report);
}

#[tokio::test]
async fn album_tracks_carry_album_tags_and_inherited_artist() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new().album(
        SC_ALBUM,
        "First Light",
        "Band",
        &[Some("Intro")],
    ));
    let coordinator =
        BatchCoordinator::new(fast_config(temp_dir.path()), catalog.clone(), Arc::new(SelectAll))
            .unwrap();

    coordinator
        .submit_batch(BatchRequest::from_text(SC_ALBUM))
        .await
        .unwrap();

    let downloads = catalog.downloads();
    assert_eq!(downloads.len(), 1);
    let tags = &downloads[0].tags;
    assert_eq!(tags.title, "Intro");
    assert_eq!(tags.artist, "Band");
    assert_eq!(tags.album, "First Light");
    assert_eq!(tags.source_url, format!("{SC_ALBUM}/track-0"));
    assert_eq!(tags.date.len(), "2024-01-01".len());
}

#[tokio::test]
async fn user_picks_a_subset_and_cancels_another_album() {
    let temp_dir = TempDir::new().unwrap();
    let second_album = "https://soundcloud.com/band/sets/second-light";
    let catalog = Arc::new(
        FakeCatalog::new()
            .album(
                SC_ALBUM,
                "First Light",
                "Band",
                &[Some("One"), Some("Two"), Some("Three")],
            )
            .album(second_album, "Second Light", "Band", &[Some("Four")]),
    );
    let answers = Arc::new(
        AnswersByAlbum::new()
            .answer("First Light", SelectionResponse::Selected(vec![2, 0]))
            .answer("Second Light", SelectionResponse::Canceled),
    );
    let coordinator =
        BatchCoordinator::new(fast_config(temp_dir.path()), catalog.clone(), answers.clone())
            .unwrap();

    let report = coordinator
        .submit_batch(BatchRequest::from_text(&format!("{SC_ALBUM}\n{second_album}")))
        .await
        .unwrap();

    assert_eq!(answers.seen().len(), 2);
    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.canceled, 1);
    assert_counts(&report, 2, 0, 2);
    assert_files_exist(temp_dir.path(), &["First Light/One.mp3", "First Light/Three.mp3"]);
    assert!(!temp_dir.path().join("First Light/Two.mp3").exists());
}

#[tokio::test]
async fn failures_are_reported_per_item() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(
        FakeCatalog::new()
            .track(YT_LINK, "Sunrise", "Artist")
            .track(SC_SINGLE, "Night Drive", "Artist")
            .broken(SC_SINGLE, "HTTP Error 404: Not Found"),
    );
    let coordinator =
        BatchCoordinator::new(fast_config(temp_dir.path()), catalog, Arc::new(SelectAll)).unwrap();
    let mut events = coordinator.subscribe();

    let report = coordinator
        .submit_batch(BatchRequest::from_text(&format!(
            "{YT_LINK}\n{SC_SINGLE}\nhttps://soundcloud.com/artist/deleted"
        )))
        .await
        .unwrap();

    assert_counts(&report, 1, 2, 3);
    assert!(!report.is_success());

    let reasons: Vec<String> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::Status {
                status: DownloadStatus::Failed { reason },
                ..
            } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(reasons.len(), 2);
    assert!(reasons.iter().any(|r| r.contains("404")));
}

#[tokio::test]
async fn unsupported_hosts_are_listed_back_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let coordinator =
        BatchCoordinator::new(fast_config(temp_dir.path()), catalog.clone(), Arc::new(SelectAll))
            .unwrap();

    let err = coordinator
        .submit_batch(BatchRequest::from_text(&format!(
            "{SC_SINGLE}\nhttps://vimeo.com/12345\n  ftp://nope  "
        )))
        .await
        .unwrap_err();

    match err {
        Error::InvalidUrls { invalid } => {
            assert_eq!(invalid, vec!["https://vimeo.com/12345", "  ftp://nope  "]);
        }
        other => panic!("expected InvalidUrls, got {other:?}"),
    }
    assert!(catalog.downloads().is_empty());
}
