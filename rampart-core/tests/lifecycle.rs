//! End-to-end lifecycle behaviour of the scan orchestrator.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use rampart_core::error::ScanError;
use rampart_model::{Mode, ScanId, ScanState, SessionInfo, SiteNode, Target};

#[path = "support/mod.rs"]
mod support;

use support::{
    engine::GatedEngine, orchestrator_with, root_target, wait_for_sent,
    wait_for_state, wait_until,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_get_distinct_increasing_ids() {
    let engine = Arc::new(GatedEngine::new(1));
    let orchestrator = orchestrator_with(Mode::Standard, engine);

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                let node = SiteNode::in_scope(format!("https://h{i}.test/"));
                orchestrator.start_scan_subtree(node).expect("start")
            })
        })
        .collect();
    let ids: Vec<ScanId> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task"))
        .collect();

    let unique: BTreeSet<ScanId> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 32);
    assert_eq!(unique.first(), Some(&ScanId(1)));
    assert_eq!(unique.last(), Some(&ScanId(32)));

    let listed: Vec<ScanId> =
        orchestrator.get_all_scans().iter().map(|s| s.id).collect();
    assert_eq!(listed, unique.into_iter().collect::<Vec<_>>());
    assert_eq!(orchestrator.get_last_scan().map(|s| s.id), Some(ScanId(32)));
}

#[tokio::test]
async fn mode_gate_decides_before_anything_is_registered() {
    let engine = Arc::new(GatedEngine::new(1));
    let orchestrator = orchestrator_with(Mode::Safe, engine);

    let err = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect_err("safe mode denies");
    assert!(err.is_policy_denied());
    assert!(orchestrator.get_all_scans().is_empty());

    orchestrator.handle_mode_change(Mode::Protect);
    let outside = Target::new(SiteNode::out_of_scope("https://elsewhere.test/"), true);
    assert!(matches!(
        orchestrator.start_scan(None, outside.clone(), None, Vec::new()),
        Err(ScanError::PolicyDenied { mode: Mode::Protect, .. })
    ));
    assert!(orchestrator.get_all_scans().is_empty());

    for mode in [Mode::Standard, Mode::Attack] {
        orchestrator.handle_mode_change(mode);
        orchestrator
            .start_scan(None, outside.clone(), None, Vec::new())
            .expect("allowed outside protect mode");
    }
    assert_eq!(orchestrator.get_all_scans().len(), 2);
}

#[tokio::test]
async fn removing_twice_is_a_no_op() {
    let engine = Arc::new(GatedEngine::new(3));
    let orchestrator = orchestrator_with(Mode::Standard, engine);
    let id = orchestrator
        .start_scan(Some("once".into()), root_target(), None, Vec::new())
        .expect("start");

    let removed = orchestrator.remove_scan(id).await.expect("first removal");
    assert_eq!(removed.state, ScanState::Stopped);
    assert!(orchestrator.remove_scan(id).await.is_none());
    assert!(orchestrator.get_scan(id).is_none());

    // Ids are never handed out again.
    let next = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");
    assert_eq!(next, ScanId(2));
}

#[tokio::test]
async fn pause_resume_round_trip_loses_no_work() {
    let engine = Arc::new(GatedEngine::new(10));
    let orchestrator = orchestrator_with(Mode::Standard, engine.clone());
    let id = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");

    engine.release(3);
    wait_for_sent(&orchestrator, id, 3).await;
    orchestrator.pause_scan(id);
    let paused = orchestrator.get_scan(id).expect("present");
    assert_eq!(paused.state, ScanState::Paused);

    // At most the request already in flight completes while paused.
    engine.release(5);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let still_paused = orchestrator.get_scan(id).expect("present");
    assert_eq!(still_paused.state, ScanState::Paused);
    assert!((3..=4).contains(&still_paused.progress.requests_sent));
    assert!(still_paused.progress.requests_sent >= paused.progress.requests_sent);
    assert_eq!(
        still_paused.progress.requests_sent as usize + still_paused.progress.pending,
        10
    );

    orchestrator.resume_scan(id);
    assert_eq!(
        orchestrator.get_scan(id).map(|s| s.state),
        Some(ScanState::Running)
    );
    engine.open();
    wait_for_state(&orchestrator, id, ScanState::Finished).await;

    let finished = orchestrator.get_scan(id).expect("present");
    assert_eq!(finished.progress.requests_sent, 10);
    assert_eq!(finished.progress.percent, 100);
    assert_eq!(engine.dispatched(), 10);
    assert_eq!(orchestrator.scan_results(id).map(|r| r.len()), Some(10));
}

#[tokio::test]
async fn entering_safe_mode_stops_running_scans_before_returning() {
    let engine = Arc::new(GatedEngine::new(5));
    let orchestrator = orchestrator_with(Mode::Attack, engine);
    let ids: Vec<ScanId> = (0..3)
        .map(|_| {
            orchestrator
                .start_scan(None, root_target(), None, Vec::new())
                .expect("start")
        })
        .collect();

    orchestrator.handle_mode_change(Mode::Safe);

    for id in &ids {
        assert_eq!(
            orchestrator.get_scan(*id).map(|s| s.state),
            Some(ScanState::Stopped)
        );
    }
    assert_eq!(orchestrator.mode(), Mode::Safe);
    assert!(orchestrator.get_active_scans().is_empty());
}

#[tokio::test]
async fn session_about_to_change_empties_the_registry() {
    let engine = Arc::new(GatedEngine::new(5));
    let orchestrator = orchestrator_with(Mode::Standard, engine);
    let first = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");
    orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");
    orchestrator.pause_scan(first);

    orchestrator.handle_session_about_to_change().await;

    assert!(orchestrator.get_all_scans().is_empty());
    assert!(orchestrator.get_last_scan().is_none());
}

#[tokio::test]
async fn only_closing_the_session_clears_scans() {
    let engine = Arc::new(GatedEngine::new(5));
    let orchestrator = orchestrator_with(Mode::Standard, engine);
    orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");

    orchestrator
        .handle_session_changed(Some(&SessionInfo::new("loaded")))
        .await;
    assert_eq!(orchestrator.get_all_scans().len(), 1);

    orchestrator.handle_session_changed(None).await;
    assert!(orchestrator.get_all_scans().is_empty());
}

#[tokio::test]
async fn two_scans_paused_stopped_and_collected() {
    let engine = Arc::new(GatedEngine::new(4));
    let orchestrator = orchestrator_with(Mode::Standard, engine);

    let a = orchestrator
        .start_scan(Some("A".into()), root_target(), None, Vec::new())
        .expect("start A");
    assert_eq!(a, ScanId(1));
    assert_eq!(
        orchestrator.get_scan(a).map(|s| s.state),
        Some(ScanState::Running)
    );
    let b = orchestrator
        .start_scan(Some("B".into()), root_target(), None, Vec::new())
        .expect("start B");
    assert_eq!(b, ScanId(2));
    let ids: Vec<ScanId> =
        orchestrator.get_all_scans().iter().map(|s| s.id).collect();
    assert_eq!(ids, [a, b]);

    orchestrator.pause_scan(a);
    assert_eq!(
        orchestrator.get_scan(a).map(|s| s.state),
        Some(ScanState::Paused)
    );

    assert_eq!(orchestrator.stop_all_scans(), 2);
    for id in [a, b] {
        assert_eq!(
            orchestrator.get_scan(id).map(|s| s.state),
            Some(ScanState::Stopped)
        );
    }

    // Stopped scans count as finished for collection by default.
    assert_eq!(orchestrator.remove_finished_scans().await, 2);
    assert!(orchestrator.get_all_scans().is_empty());
}

#[tokio::test]
async fn bulk_pause_and_resume_only_touch_eligible_scans() {
    let engine = Arc::new(GatedEngine::new(4));
    let orchestrator = orchestrator_with(Mode::Standard, engine);
    let ids: Vec<ScanId> = (0..3)
        .map(|_| {
            orchestrator
                .start_scan(None, root_target(), None, Vec::new())
                .expect("start")
        })
        .collect();
    orchestrator.stop_scan(ids[2]);

    assert_eq!(orchestrator.pause_all_scans(), 2);
    assert_eq!(orchestrator.pause_all_scans(), 0);
    assert_eq!(orchestrator.resume_all_scans(), 2);

    // Resuming leaves every scan in place.
    assert_eq!(orchestrator.get_all_scans().len(), 3);
    assert_eq!(orchestrator.get_active_scans().len(), 2);
}

#[tokio::test]
async fn illegal_commands_on_terminal_scans_are_ignored() {
    let engine = Arc::new(GatedEngine::new(2));
    let orchestrator = orchestrator_with(Mode::Standard, engine.clone());
    let id = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");
    engine.open();
    wait_for_state(&orchestrator, id, ScanState::Finished).await;

    orchestrator.resume_scan(id);
    orchestrator.pause_scan(id);
    orchestrator.stop_scan(id);
    assert_eq!(
        orchestrator.get_scan(id).map(|s| s.state),
        Some(ScanState::Finished)
    );
    assert!(orchestrator.get_scan(id).and_then(|s| s.terminal_at).is_some());
}

#[tokio::test]
async fn empty_plan_finishes_immediately() {
    let engine = Arc::new(GatedEngine::new(0));
    let orchestrator = orchestrator_with(Mode::Standard, engine);
    let id = orchestrator
        .start_scan(None, root_target(), None, Vec::new())
        .expect("start");

    // An empty plan drains immediately.
    wait_for_state(&orchestrator, id, ScanState::Finished).await;
    wait_until("terminal timestamp", || {
        orchestrator
            .get_scan(id)
            .is_some_and(|s| s.terminal_at.is_some())
    })
    .await;
}
