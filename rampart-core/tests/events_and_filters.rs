//! Event delivery, listener isolation, exclude lists and the demo engine.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rampart_core::{
    config::OrchestratorConfig,
    demo::{DemoEngine, DemoSite, EXTERNAL_ROOT},
    orchestration::{ScanOrchestrator, listener_fn},
};
use rampart_model::{
    Mode, ScanEvent, ScanEventPayload, ScanState, SiteNode, Target,
};

#[path = "support/mod.rs"]
mod support;

use support::{
    engine::GatedEngine, events::EventLog, orchestrator_with, root_target,
    wait_for_sent, wait_for_state, wait_until,
};

fn demo_orchestrator(site: DemoSite) -> ScanOrchestrator {
    ScanOrchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(DemoEngine::new(Arc::new(site))),
    )
    .expect("valid config")
}

#[tokio::test]
async fn lifecycle_events_arrive_in_transition_order() {
    let engine = Arc::new(GatedEngine::new(2));
    let orchestrator = orchestrator_with(Mode::Standard, engine.clone());
    let log = EventLog::attach(&orchestrator);

    let id = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");
    orchestrator.pause_scan(id);
    orchestrator.resume_scan(id);
    engine.open();
    wait_for_state(&orchestrator, id, ScanState::Finished).await;
    orchestrator.remove_scan(id).await.expect("present");

    wait_until("scan_removed event", || log.count(id, "scan_removed") == 1).await;
    let labels = log.labels_for(id);
    assert_eq!(&labels[..4], ["scan_added", "started", "paused", "resumed"]);
    assert_eq!(log.count(id, "finished"), 1);
    assert_eq!(log.count(id, "host_started"), 1);
    assert_eq!(log.count(id, "host_completed"), 1);
    assert_eq!(labels.last(), Some(&"scan_removed"));

    let sequences = log.sequences_for(id);
    assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
}

#[tokio::test]
async fn panicking_listener_leaves_scans_and_other_listeners_intact() {
    let engine = Arc::new(GatedEngine::new(3));
    let orchestrator = orchestrator_with(Mode::Standard, engine.clone());

    let _faulty = orchestrator.register_listener(listener_fn(
        "faulty",
        |event: &ScanEvent| {
            if matches!(event.payload, ScanEventPayload::Started) {
                panic!("observer bug");
            }
            Ok(())
        },
    ));
    let failing_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failing_calls);
    let _failing = orchestrator.register_listener(listener_fn(
        "failing",
        move |_: &ScanEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("refusing every event")
        },
    ));
    let log = EventLog::attach(&orchestrator);

    let id = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");
    engine.open();
    wait_for_state(&orchestrator, id, ScanState::Finished).await;

    wait_until("finished event", || log.count(id, "finished") == 1).await;
    assert!(failing_calls.load(Ordering::SeqCst) > 0);
    assert_eq!(
        orchestrator.get_scan(id).map(|s| s.progress.requests_sent),
        Some(3)
    );

    // The orchestrator keeps accepting work.
    orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start after listener failures");
}

#[tokio::test]
async fn listeners_may_call_back_into_the_orchestrator() {
    let engine = Arc::new(GatedEngine::new(5));
    let orchestrator = orchestrator_with(Mode::Standard, engine);

    let weak = Arc::downgrade(&orchestrator);
    let _handle = orchestrator.register_listener(listener_fn(
        "pause-on-start",
        move |event: &ScanEvent| {
            if matches!(event.payload, ScanEventPayload::Started)
                && let Some(orchestrator) = weak.upgrade()
            {
                orchestrator.pause_scan(event.scan_id());
            }
            Ok(())
        },
    ));

    let id = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");
    wait_for_state(&orchestrator, id, ScanState::Paused).await;
}

#[tokio::test]
async fn exclude_list_changes_apply_to_pending_units_only() {
    let engine = Arc::new(GatedEngine::new(6));
    let orchestrator = orchestrator_with(Mode::Standard, engine.clone());
    let id = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");

    engine.release(2);
    wait_for_sent(&orchestrator, id, 2).await;
    // page-0 and page-1 were requested already; page-1 matches too.
    orchestrator.set_exclude_list(&[r"https://app\.test/page-[1-3]"]);
    engine.open();
    wait_for_state(&orchestrator, id, ScanState::Finished).await;

    let snapshot = orchestrator.get_scan(id).expect("present");
    assert_eq!(snapshot.exclude_list, [r"https://app\.test/page-[1-3]"]);

    let results = orchestrator.scan_results(id).expect("present");
    let skipped: Vec<&str> = results
        .iter()
        .filter(|r| r.skipped)
        .map(|r| r.uri.as_str())
        .collect();
    // page-2 may already have been dequeued when the list changed.
    assert!((1..=2).contains(&skipped.len()));
    assert!(skipped.contains(&"https://app.test/page-3"));
    assert!(!skipped.contains(&"https://app.test/page-1"));
    assert_eq!(
        snapshot.progress.requests_sent + snapshot.progress.requests_skipped,
        6
    );
}

#[tokio::test]
async fn demo_scan_crawls_the_whole_subtree() {
    let orchestrator = demo_orchestrator(DemoSite::generate(1, 2, 3));
    let id = orchestrator
        .start_scan_subtree(SiteNode::in_scope("https://host0.demo/"))
        .expect("start");
    wait_for_state(&orchestrator, id, ScanState::Finished).await;

    let snapshot = orchestrator.get_scan(id).expect("present");
    // 1 + 3 + 9 pages on the host, plus the external link.
    assert_eq!(snapshot.progress.requests_sent, 14);
    assert_eq!(snapshot.progress.hosts_total, 2);
    assert_eq!(snapshot.progress.hosts_processed, 2);
    assert_eq!(snapshot.result_count, 14);
}

#[tokio::test]
async fn single_node_scans_do_not_follow_links() {
    let orchestrator = demo_orchestrator(DemoSite::generate(1, 2, 3));
    let id = orchestrator
        .start_scan_node(SiteNode::in_scope("https://host0.demo/"))
        .expect("start");
    wait_for_state(&orchestrator, id, ScanState::Finished).await;
    assert_eq!(
        orchestrator.get_scan(id).map(|s| s.progress.requests_sent),
        Some(1)
    );
}

#[tokio::test]
async fn all_in_scope_scan_skips_out_of_scope_pages() {
    let orchestrator = demo_orchestrator(DemoSite::generate(2, 1, 2));
    let id = orchestrator.start_scan_all_in_scope().expect("start");
    wait_for_state(&orchestrator, id, ScanState::Finished).await;

    let snapshot = orchestrator.get_scan(id).expect("present");
    assert_eq!(snapshot.name, "All in scope");
    assert_eq!(snapshot.progress.requests_sent, 6);
    assert_eq!(snapshot.progress.requests_skipped, 1);

    let results = orchestrator.scan_results(id).expect("present");
    let external = results
        .iter()
        .find(|r| r.uri == EXTERNAL_ROOT)
        .expect("external page recorded");
    assert!(external.skipped);
    assert_eq!(external.flags, "out_of_scope");
}

#[tokio::test]
async fn unknown_start_node_finishes_with_error() {
    let orchestrator = demo_orchestrator(DemoSite::generate(1, 1, 1));
    let target = Target::new(SiteNode::in_scope("https://missing.demo/"), true);
    let id = orchestrator
        .start_scan(None, target, None, Vec::new())
        .expect("start");
    wait_for_state(&orchestrator, id, ScanState::Finished).await;

    let progress = orchestrator.get_scan(id).expect("present").progress;
    assert_eq!(progress.errors, 1);
    assert!(
        progress
            .last_error
            .is_some_and(|e| e.contains("https://missing.demo/"))
    );
}

#[tokio::test]
async fn remove_does_not_wait_on_slow_requests() {
    let site = Arc::new(DemoSite::generate(1, 3, 3));
    let engine = DemoEngine::new(site).with_latency(Duration::from_secs(30));
    let orchestrator =
        ScanOrchestrator::new(OrchestratorConfig::default(), Arc::new(engine))
            .expect("valid config");
    let id = orchestrator
        .start_scan_subtree(SiteNode::in_scope("https://host0.demo/"))
        .expect("start");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let removed = tokio::time::timeout(Duration::from_secs(2), orchestrator.remove_scan(id))
        .await
        .expect("removal is bounded")
        .expect("present");
    assert_eq!(removed.state, ScanState::Stopped);
    assert_eq!(removed.progress.requests_sent, 0);
}

#[tokio::test]
async fn shutdown_clears_scans_and_detaches_listeners() {
    let engine = Arc::new(GatedEngine::new(3));
    let orchestrator = orchestrator_with(Mode::Standard, engine);
    let handle = orchestrator.register_listener(listener_fn("noop", |_: &ScanEvent| Ok(())));
    orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");

    orchestrator.shutdown().await;

    assert!(orchestrator.get_all_scans().is_empty());
    wait_until("listener to detach", || !handle.is_active()).await;
}

#[tokio::test]
async fn instant_engine_scan_can_be_stopped_partway() {
    let site = DemoSite::generate(2, 4, 4);
    let pages = site.len() as u64;
    let orchestrator = demo_orchestrator(site);
    let id = orchestrator
        .start_scan_subtree(SiteNode::in_scope("https://host0.demo/"))
        .expect("start");

    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    orchestrator.stop_scan(id);

    let stopped = orchestrator.get_scan(id).expect("present");
    assert_eq!(stopped.state, ScanState::Stopped);
    let sent = stopped.progress.requests_sent;
    assert!(sent < pages / 4, "sent {sent} of {pages} before the stop");

    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        orchestrator.get_scan(id).map(|s| s.progress.requests_sent),
        Some(sent)
    );
}

#[tokio::test]
async fn listeners_keep_up_with_an_instant_engine() {
    let orchestrator = demo_orchestrator(DemoSite::generate(2, 4, 4));
    let log = EventLog::attach(&orchestrator);
    let id = orchestrator
        .start_scan_subtree(SiteNode::in_scope("https://host0.demo/"))
        .expect("start");

    wait_for_state(&orchestrator, id, ScanState::Finished).await;
    wait_until("finished event", || log.count(id, "finished") == 1).await;

    let last = orchestrator.get_scan(id).expect("present").sequence;
    // Well past the channel capacity, yet nothing was skipped.
    assert!(last > 1_024);
    assert_eq!(log.sequences_for(id), (1..=last).collect::<Vec<_>>());
}
