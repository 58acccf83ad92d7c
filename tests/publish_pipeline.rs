// tests/publish_pipeline.rs
mod common;

use common::{Harness, Step, MEDIA_BYTES};
use history_dosis::error::Error;
use history_dosis::ingest::types::Candidate;
use history_dosis::publish::PublishOutcome;
use history_dosis::{fingerprint, PostState};

async fn seed_one(h: &Harness, id: &history_dosis::config::Identity) {
    h.scraper.set(
        "HistoryPorn",
        vec![Candidate::new("Harbour at dawn, 1921", "https://i.example.test/a.jpg")
            .with_author("u/archivist")],
    );
    let r = h.ingest().run_once(id).await.unwrap();
    assert_eq!(r.queued, 1);
}

#[tokio::test]
async fn successful_publish_marks_done_and_archives() {
    let h = Harness::new();
    let id = h.identity("history", &["HistoryPorn"]);
    seed_one(&h, &id).await;
    let fp = fingerprint("Harbour at dawn, 1921");
    let active = id.media_path(&fp);

    let (got, receipt, text, archived_to) = match h.publish().run_once(&id).await.unwrap() {
        PublishOutcome::Published {
            fingerprint,
            receipt,
            text,
            archived_to,
        } => (fingerprint, receipt, text, archived_to),
        other => panic!("expected a publish, got {other:?}"),
    };

    assert_eq!(got, fp);
    assert_eq!(text, "Harbour at dawn, 1921 (u/archivist) #HistoryPorn");
    assert_eq!(receipt.permalink, "https://social.test/status/1");
    assert_eq!(*h.publisher.alt_texts.lock().unwrap(), vec![text.clone()]);
    assert_eq!(h.publisher.uploads.lock().unwrap()[0], MEDIA_BYTES);

    let archived = archived_to.unwrap();
    assert_eq!(archived, id.archive_dir.join(format!("{fp}.jpg")));
    assert!(archived.exists());
    assert!(!active.exists());

    let post = h.store.get("history", fp).unwrap().unwrap();
    assert_eq!(post.state, PostState::Published);
    assert!(post.published_at.is_some());
    assert_eq!(post.local_media_path.as_deref(), Some(archived.as_path()));

    assert!(h.store.pick_one_queued("history").unwrap().is_none());
    assert_eq!(
        h.publish().run_once(&id).await.unwrap(),
        PublishOutcome::NothingQueued
    );
}

#[tokio::test]
async fn failed_final_submit_leaves_post_queued() {
    let h = Harness::new();
    let id = h.identity("history", &["HistoryPorn"]);
    seed_one(&h, &id).await;
    let fp = fingerprint("Harbour at dawn, 1921");
    h.publisher.fail_at(Some(Step::Post));

    let err = h.publish().run_once(&id).await.unwrap_err();
    assert!(matches!(err, Error::Publish(_)));

    let post = h.store.get("history", fp).unwrap().unwrap();
    assert_eq!(post.state, PostState::Queued);
    assert!(post.published_at.is_none());
    assert!(id.media_path(&fp).exists());

    // next tick retries and succeeds
    h.publisher.fail_at(None);
    let out = h.publish().run_once(&id).await.unwrap();
    assert!(matches!(out, PublishOutcome::Published { .. }));
    assert_eq!(h.publisher.posts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failures_at_earlier_steps_do_not_publish() {
    for step in [Step::Upload, Step::AltText] {
        let h = Harness::new();
        let id = h.identity("history", &["HistoryPorn"]);
        seed_one(&h, &id).await;
        h.publisher.fail_at(Some(step));

        assert!(h.publish().run_once(&id).await.is_err());
        assert!(h.publisher.posts.lock().unwrap().is_empty());
        assert_eq!(h.store.counts("history").unwrap().queued, 1);
    }
}

#[tokio::test]
async fn nothing_queued_is_a_no_op() {
    let h = Harness::new();
    let id = h.identity("history", &["HistoryPorn"]);
    assert_eq!(
        h.publish().run_once(&id).await.unwrap(),
        PublishOutcome::NothingQueued
    );
    assert!(h.publisher.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_media_keeps_post_queued() {
    let h = Harness::new();
    let id = h.identity("history", &["HistoryPorn"]);
    seed_one(&h, &id).await;
    let fp = fingerprint("Harbour at dawn, 1921");
    std::fs::remove_file(id.media_path(&fp)).unwrap();

    let err = h.publish().run_once(&id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(
        h.store.get("history", fp).unwrap().unwrap().state,
        PostState::Queued
    );
}

#[tokio::test]
async fn hashtag_can_be_switched_off() {
    let h = Harness::new();
    let mut id = h.identity("history", &["HistoryPorn"]);
    id.hashtag = false;
    seed_one(&h, &id).await;

    match h.publish().run_once(&id).await.unwrap() {
        PublishOutcome::Published { text, .. } => {
            assert_eq!(text, "Harbour at dawn, 1921 (u/archivist)")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn long_titles_are_truncated_before_publishing() {
    let h = Harness::new();
    let id = h.identity("history", &["HistoryPorn"]);
    let title = "x".repeat(400);
    h.scraper.set(
        "HistoryPorn",
        vec![Candidate::new(title, "https://i.example.test/long.jpg")],
    );
    h.ingest().run_once(&id).await.unwrap();

    let out = h.publish().run_once(&id).await.unwrap();
    let PublishOutcome::Published { text, .. } = out else {
        panic!("expected a publish");
    };
    assert!(text.chars().count() <= 280);
    assert!(text.ends_with("... #HistoryPorn"));
}

#[tokio::test]
async fn unrecorded_publish_is_never_sent_twice() {
    let h = Harness::new();
    let id = h.identity("history", &["HistoryPorn"]);
    seed_one(&h, &id).await;
    let fp = fingerprint("Harbour at dawn, 1921");

    // block the snapshot temp file so every write fails
    let tmp = h.store.path().with_extension("json.tmp");
    std::fs::create_dir(&tmp).unwrap();

    let err = h.publish().run_once(&id).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)), "got {err:?}");
    assert_eq!(
        h.publish().run_once(&id).await.unwrap(),
        PublishOutcome::NothingQueued
    );
    assert_eq!(h.publisher.posts.lock().unwrap().len(), 1);

    // once the disk recovers the next tick writes the published state out
    std::fs::remove_dir(&tmp).unwrap();
    assert_eq!(
        h.publish().run_once(&id).await.unwrap(),
        PublishOutcome::NothingQueued
    );
    assert!(!h.store.is_dirty());
    let reopened = h.reopen_store();
    assert_eq!(
        reopened.get("history", fp).unwrap().unwrap().state,
        PostState::Published
    );
}
