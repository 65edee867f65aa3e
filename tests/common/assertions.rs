//! Event and report assertions for integration tests

use std::path::Path;
use tokio::sync::broadcast;
use trackfetch::{BatchReport, Event};

/// Everything buffered on `events` so far
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

/// Assert the counters of a finished batch
pub fn assert_counts(report: &BatchReport, succeeded: usize, failed: usize, total: usize) {
    assert_eq!(
        (report.succeeded, report.failed, report.total),
        (succeeded, failed, total),
        "unexpected counters in {report:?}"
    );
}

/// Assert exactly one BatchFinished event was sent and it carries `report`
pub fn assert_single_finish(events: &[Event], report: &BatchReport) {
    let finished: Vec<&BatchReport> = events
        .iter()
        .filter_map(|e| match e {
            Event::BatchFinished { report } => Some(report),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 1, "expected one BatchFinished, got {finished:?}");
    assert_eq!(finished[0], report);
}

/// Assert that files exist in the download directory
pub fn assert_files_exist(dir: &Path, expected_files: &[&str]) {
    for filename in expected_files {
        let path = dir.join(filename);
        assert!(
            path.exists(),
            "Expected file '{}' to exist in {:?}",
            filename,
            dir
        );
    }
}
