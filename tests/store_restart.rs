// tests/store_restart.rs
mod common;

use chrono::Utc;
use common::Harness;
use history_dosis::ingest::types::Candidate;
use history_dosis::{fingerprint, PostState};

#[tokio::test]
async fn queued_survives_restart_and_published_stays_excluded() {
    let h = Harness::new();
    let id = h.identity("history", &["HistoryPorn"]);
    h.scraper.set(
        "HistoryPorn",
        vec![
            Candidate::new("Keep me queued", "https://i.example.test/q.jpg"),
            Candidate::new("Already out", "https://i.example.test/p.jpg"),
        ],
    );
    h.ingest().run_once(&id).await.unwrap();
    h.store
        .mark_published("history", fingerprint("Already out"), Utc::now())
        .unwrap();

    let reopened = h.reopen_store();
    assert_eq!(reopened.len().unwrap(), 2);
    assert!(reopened.exists("history", fingerprint("Already out")).unwrap());
    assert!(reopened.exists("history", fingerprint("Keep me queued")).unwrap());

    for _ in 0..20 {
        let picked = reopened.pick_one_queued("history").unwrap().unwrap();
        assert_eq!(picked.title, "Keep me queued");
    }
    let out = reopened.get("history", fingerprint("Already out")).unwrap().unwrap();
    assert_eq!(out.state, PostState::Published);
}

#[test]
fn duplicate_insert_after_reopen_is_rejected() {
    let h = Harness::new();
    let mut p = history_dosis::Post::discovered(
        "history",
        "Lamplighter, 1910",
        "https://i.example.test/l.jpg",
        "HistoryPorn",
        None,
        Utc::now(),
    );
    p.advance(PostState::Discarded);
    h.store.insert(p.clone()).unwrap();

    let reopened = h.reopen_store();
    assert!(reopened.insert(p).unwrap_err().is_duplicate());
}

#[test]
fn missing_snapshot_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = history_dosis::PostStore::open(dir.path().join("nested/posts.json")).unwrap();
    assert!(store.is_empty().unwrap());
}
