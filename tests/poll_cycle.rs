// tests/poll_cycle.rs
// Orchestrator behavior: dedup across cycles, failure isolation, delivery modes.

mod common;

use common::{incident, FailingSource, RecordingNotifier, ScriptedSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wildfire_watch::ingest::providers::{inciweb_rss::InciwebRssProvider, SourceMeta};
use wildfire_watch::{
    CycleReport, DedupStore, DeliveryMode, IncidentSource, MemoryDedupStore, Pipeline,
    RelevancePolicy,
};

fn pipeline(
    sources: Vec<Box<dyn IncidentSource>>,
    notifier: Arc<RecordingNotifier>,
) -> Pipeline<MemoryDedupStore> {
    Pipeline::new(sources, notifier, MemoryDedupStore::new())
}

#[tokio::test]
async fn feed_scenario_delivers_exactly_one_alert() {
    let meta = SourceMeta::new(
        "InciWeb",
        "InciWeb",
        "https://inciweb.nwcg.gov/",
        RelevancePolicy::simple(&["Oregon"]),
    );
    let xml = r#"<rss><channel>
        <item><title>Evergreen Fire near Mt Hood, Oregon</title><guid>evergreen</guid></item>
        <item><title>City Council Meeting</title><guid>council</guid></item>
    </channel></rss>"#;
    let notifier = RecordingNotifier::new();
    let mut p = pipeline(
        vec![Box::new(InciwebRssProvider::from_fixture(meta, xml))],
        notifier.clone(),
    );

    let r = p.run_cycle().await;
    assert_eq!(r.fetched, 1);
    assert_eq!(notifier.delivered(), vec!["InciWeb-evergreen"]);
}

#[tokio::test]
async fn same_id_across_cycles_is_delivered_once() {
    let notifier = RecordingNotifier::new();
    let src = ScriptedSource::new(
        "InciWeb",
        vec![
            vec![incident("InciWeb-1", "InciWeb")],
            vec![incident("InciWeb-1", "InciWeb"), incident("InciWeb-2", "InciWeb")],
            vec![incident("InciWeb-2", "InciWeb"), incident("InciWeb-1", "InciWeb")],
        ],
    );
    let mut p = pipeline(vec![Box::new(src)], notifier.clone());

    let r1 = p.run_cycle().await;
    let r2 = p.run_cycle().await;
    let r3 = p.run_cycle().await;

    assert_eq!(notifier.delivered(), vec!["InciWeb-1", "InciWeb-2"]);
    assert_eq!(r1.delivered, 1);
    assert_eq!(r2, CycleReport { fetched: 2, skipped: 1, delivered: 1, failed: 0 });
    assert_eq!(r3.skipped, 2);
    assert_eq!(p.store.len(), 2);
}

#[tokio::test]
async fn duplicate_ids_within_one_cycle_are_sent_once_in_adapter_order() {
    let notifier = RecordingNotifier::new();
    let a = ScriptedSource::constant("A", vec![incident("X-1", "A"), incident("X-2", "A")]);
    let b = ScriptedSource::constant("B", vec![incident("X-1", "B"), incident("Y-1", "B")]);
    let mut p = pipeline(vec![Box::new(a), Box::new(b)], notifier.clone());

    let r = p.run_cycle().await;
    assert_eq!(notifier.delivered(), vec!["X-1", "X-2", "Y-1"]);
    assert_eq!(r.skipped, 1);
}

#[tokio::test]
async fn failing_source_does_not_block_others() {
    let notifier = RecordingNotifier::new();
    let ok = ScriptedSource::constant("NASA", vec![incident("NASA-9", "NASA EONET")]);
    let mut p = pipeline(vec![Box::new(FailingSource), Box::new(ok)], notifier.clone());

    let r = p.run_cycle().await;
    assert_eq!(r.fetched, 1);
    assert_eq!(notifier.delivered(), vec!["NASA-9"]);
}

#[tokio::test]
async fn at_most_once_drops_failed_delivery() {
    let notifier = RecordingNotifier::failing_for(&["A-1"]);
    let src = ScriptedSource::constant("A", vec![incident("A-1", "A"), incident("A-2", "A")]);
    let mut p = pipeline(vec![Box::new(src)], notifier.clone());

    let r1 = p.run_cycle().await;
    assert_eq!((r1.delivered, r1.failed), (1, 1));

    notifier.heal();
    let r2 = p.run_cycle().await;
    assert_eq!(r2.delivered, 0);
    // A-1 was attempted once and never again.
    assert_eq!(notifier.attempts(), vec!["A-1", "A-2"]);
    assert!(p.store.contains("A-1"));
}

#[tokio::test]
async fn at_least_once_retries_failed_delivery_next_cycle() {
    let notifier = RecordingNotifier::failing_for(&["A-1"]);
    let src = ScriptedSource::constant("A", vec![incident("A-1", "A")]);
    let mut p = pipeline(vec![Box::new(src)], notifier.clone())
        .with_mode(DeliveryMode::AtLeastOnce);

    let r1 = p.run_cycle().await;
    assert_eq!(r1.failed, 1);
    assert!(!p.store.contains("A-1"));

    notifier.heal();
    let r2 = p.run_cycle().await;
    assert_eq!(r2.delivered, 1);

    let r3 = p.run_cycle().await;
    assert_eq!(r3.skipped, 1);
    assert_eq!(notifier.delivered(), vec!["A-1"]);
}

#[tokio::test(start_paused = true)]
async fn loop_runs_immediately_and_stops_on_shutdown() {
    let notifier = RecordingNotifier::new();
    let src = ScriptedSource::new(
        "A",
        vec![
            vec![incident("A-1", "A")],
            vec![incident("A-1", "A"), incident("A-2", "A")],
        ],
    );
    let p = pipeline(vec![Box::new(src)], notifier.clone());

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(p.run_until_shutdown(Duration::from_secs(600), rx));

    // First cycle runs without waiting for the interval.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(notifier.delivered(), vec!["A-1"]);

    // Second cycle after one interval.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(notifier.delivered(), vec!["A-1", "A-2"]);

    tx.send(true).unwrap();
    handle.await.unwrap();
    assert_eq!(notifier.delivered().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_shutdown_sender_stops_the_loop() {
    let notifier = RecordingNotifier::new();
    let p = pipeline(vec![Box::new(FailingSource)], notifier);
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(p.run_until_shutdown(Duration::from_secs(600), rx));
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(tx);
    handle.await.unwrap();
}
