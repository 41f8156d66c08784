use super::*;
use crate::config::CollisionPolicy;
use crate::pipeline::test_helpers::{
    ScriptedProbe, StubFetcher, StubTranscoder, fast_retry, item, monitor,
};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    scheduler: Scheduler,
    rx: broadcast::Receiver<Event>,
    dir: TempDir,
}

fn harness_with(
    fetcher: Arc<StubFetcher>,
    transcoder: Arc<StubTranscoder>,
    policy: CollisionPolicy,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.download.output_dir = dir.path().join("downloads");
    config.download.temp_dir = dir.path().join("temp");
    config.download.collision_policy = policy;
    config.retry = fast_retry();

    let (tx, rx) = broadcast::channel(1024);
    let scheduler = Scheduler::new(
        fetcher,
        transcoder,
        monitor(ScriptedProbe::online(), None),
        tx,
        &config,
    );
    Harness { scheduler, rx, dir }
}

fn harness(fetcher: Arc<StubFetcher>, transcoder: Arc<StubTranscoder>) -> Harness {
    harness_with(fetcher, transcoder, CollisionPolicy::AppendId)
}

fn batch(items: Vec<Item>) -> Batch {
    Batch {
        playlist_id: "PLtest1234567".to_string(),
        name: "Test Mix".to_string(),
        owner: None,
        items,
    }
}

fn numbered(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| item(&format!("id{i}"), "Artist", &format!("Song {i}")))
        .collect()
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn returns_one_result_per_item_in_batch_order() {
    let fetcher = Arc::new(StubFetcher::new().with_delay(Duration::from_millis(5)));
    let h = harness(fetcher, Arc::new(StubTranscoder::new()));
    let batch = batch(numbered(7));

    let results = h.scheduler.run_batch(&batch, 3).await.unwrap();

    assert_eq!(results.len(), 7);
    for (position, (result, item)) in results.iter().zip(&batch.items).enumerate() {
        assert_eq!(result.position, position);
        assert_eq!(result.item_id, item.id);
        assert!(result.success);
    }
    let ids: HashSet<_> = results.iter().map(|r| r.item_id.clone()).collect();
    assert_eq!(ids.len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn active_jobs_never_exceed_concurrency() {
    for concurrency in [1, 2, 3] {
        let fetcher = Arc::new(StubFetcher::new().with_delay(Duration::from_millis(20)));
        let h = harness(fetcher.clone(), Arc::new(StubTranscoder::new()));

        let results = h
            .scheduler
            .run_batch(&batch(numbered(8)), concurrency)
            .await
            .unwrap();

        assert_eq!(results.len(), 8);
        let max = fetcher.max_active.load(Ordering::SeqCst);
        assert!(
            max <= concurrency,
            "concurrency {concurrency}: saw {max} active fetches"
        );
        assert!(max >= 1);
    }
}

#[tokio::test]
async fn item_recovering_from_timeouts_succeeds_with_three_attempts() {
    let fetcher = Arc::new(
        StubFetcher::new().failing("id1", &["ERROR: Read timed out.", "ERROR: Read timed out."]),
    );
    let h = harness(fetcher.clone(), Arc::new(StubTranscoder::new()));

    let results = h.scheduler.run_batch(&batch(numbered(3)), 2).await.unwrap();

    assert!(results.iter().all(|r| r.success), "{results:?}");
    assert_eq!(results[1].attempts, 3);
    assert_eq!(results[0].attempts, 1);
    assert_eq!(results[2].attempts, 1);
    assert_eq!(fetcher.calls("id1"), 3);
}

#[tokio::test]
async fn transcode_failure_only_fails_its_item() {
    let transcoder = Arc::new(StubTranscoder::new().failing_for("Artist - Song 0"));
    let h = harness(Arc::new(StubFetcher::new()), transcoder);

    let results = h.scheduler.run_batch(&batch(numbered(2)), 2).await.unwrap();

    assert!(!results[0].success);
    assert!(results[0].error.as_ref().unwrap().contains("Invalid data"));
    assert!(results[1].success);
}

#[tokio::test]
async fn empty_batch_is_rejected_before_any_work() {
    let fetcher = Arc::new(StubFetcher::new());
    let mut h = harness(fetcher, Arc::new(StubTranscoder::new()));

    let err = h.scheduler.run_batch(&batch(vec![]), 2).await.unwrap_err();

    assert!(matches!(err, Error::EmptyBatch));
    assert!(!h.dir.path().join("temp").exists(), "no directories created");
    assert!(drain(&mut h.rx).is_empty(), "no events for a rejected batch");
}

#[tokio::test]
async fn zero_concurrency_is_a_config_error() {
    let h = harness(Arc::new(StubFetcher::new()), Arc::new(StubTranscoder::new()));

    let err = h.scheduler.run_batch(&batch(numbered(1)), 0).await.unwrap_err();

    match err {
        Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("concurrency")),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[tokio::test]
async fn unwritable_staging_directory_aborts_the_run() {
    let h = harness(Arc::new(StubFetcher::new()), Arc::new(StubTranscoder::new()));
    // a regular file where the staging directory should go
    std::fs::write(h.dir.path().join("temp"), b"not a dir").unwrap();

    let err = h.scheduler.run_batch(&batch(numbered(2)), 2).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn panicking_job_fails_only_its_item() {
    let fetcher = Arc::new(StubFetcher::new().panicking_on("id1"));
    let h = harness(fetcher, Arc::new(StubTranscoder::new()));

    let results = h.scheduler.run_batch(&batch(numbered(3)), 2).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(results[1].error.as_ref().unwrap().contains("panicked"));
    assert!(results[2].success);
}

#[tokio::test]
async fn panicking_job_reports_a_failed_phase() {
    let fetcher = Arc::new(StubFetcher::new().panicking_on("id1"));
    let mut h = harness(fetcher, Arc::new(StubTranscoder::new()));

    h.scheduler.run_batch(&batch(numbered(2)), 1).await.unwrap();
    let events = drain(&mut h.rx);

    let last_phase = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(p) if p.item_id.as_str() == "id1" => Some(p),
            _ => None,
        })
        .last()
        .expect("progress for the panicking item");
    assert_eq!(last_phase.phase, Phase::Failed);
    assert!(last_phase.error.as_deref().unwrap().contains("panicked"));
}

#[tokio::test]
async fn events_report_lifecycle_and_running_counts() {
    let fetcher = Arc::new(StubFetcher::new().failing("id2", &["Video unavailable"]));
    let mut h = harness(fetcher, Arc::new(StubTranscoder::new()));

    h.scheduler.run_batch(&batch(numbered(3)), 1).await.unwrap();
    let events = drain(&mut h.rx);

    assert!(matches!(
        events.first(),
        Some(Event::BatchStarted {
            total: 3,
            concurrency: 1,
            ..
        })
    ));
    assert!(matches!(
        events.last(),
        Some(Event::BatchFinished {
            succeeded: 2,
            failed: 1
        })
    ));

    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::ItemFinished {
                finished,
                succeeded,
                failed,
                total,
                ..
            } => Some((*finished, *succeeded, *failed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![(1, 1, 0, 3), (2, 2, 0, 3), (3, 2, 1, 3)]);
}

#[tokio::test]
async fn colliding_names_get_distinct_outputs_by_default() {
    let items = vec![
        item("aaa", "Artist", "Song"),
        item("bbb", "Artist", "Song"),
    ];
    let h = harness(Arc::new(StubFetcher::new()), Arc::new(StubTranscoder::new()));

    let results = h.scheduler.run_batch(&batch(items), 2).await.unwrap();

    let paths: Vec<_> = results
        .iter()
        .map(|r| r.output_path.clone().unwrap())
        .collect();
    assert_ne!(paths[0], paths[1]);
    assert!(paths[1].to_string_lossy().ends_with("Artist - Song [bbb].mp3"));
}

#[tokio::test]
async fn overwrite_policy_shares_one_output_path() {
    let items = vec![
        item("aaa", "Artist", "Song"),
        item("bbb", "Artist", "Song"),
    ];
    let h = harness_with(
        Arc::new(StubFetcher::new()),
        Arc::new(StubTranscoder::new()),
        CollisionPolicy::Overwrite,
    );

    let results = h.scheduler.run_batch(&batch(items), 1).await.unwrap();

    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[0].output_path, results[1].output_path);
}

#[tokio::test]
async fn outputs_land_in_the_playlist_directory() {
    let h = harness(Arc::new(StubFetcher::new()), Arc::new(StubTranscoder::new()));
    let batch = batch(numbered(1));

    let results = h.scheduler.run_batch(&batch, 1).await.unwrap();

    let expected_dir = h.dir.path().join("downloads").join("Test Mix");
    assert_eq!(h.scheduler.output_dir_for(&batch), expected_dir);
    assert_eq!(
        results[0].output_path.as_ref().unwrap().parent().unwrap(),
        expected_dir
    );
}
