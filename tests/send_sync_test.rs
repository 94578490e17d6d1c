use scrobble_harvest::{
    Album, Artist, ChartEntries, ClientEvent, DuplicateCandidate, FmError, Page, Scrobble,
    ScrobbleEvent, Track, WeeklyChart,
};

fn assert_send_sync<T: Send + Sync>() {}

/// Records produced by the client can be handed to other threads.
#[test]
fn test_domain_records_are_send_sync() {
    assert_send_sync::<Page>();
    assert_send_sync::<Track>();
    assert_send_sync::<Album>();
    assert_send_sync::<Artist>();
    assert_send_sync::<Scrobble>();
    assert_send_sync::<WeeklyChart>();
    assert_send_sync::<ChartEntries>();
    assert_send_sync::<ScrobbleEvent>();
    assert_send_sync::<DuplicateCandidate>();
    assert_send_sync::<ClientEvent>();
    assert_send_sync::<FmError>();
}

/// Scanning can run on a blocking worker.
#[tokio::test]
async fn test_scan_on_blocking_thread() {
    let events: Vec<ScrobbleEvent> = Vec::new();
    let handle = tokio::task::spawn_blocking(move || {
        scrobble_harvest::duplicates::scan(&events, 7).map(|found| found.len())
    });
    assert_eq!(handle.await.unwrap().unwrap(), 0);
}
