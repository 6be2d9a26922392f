mod common;

use common::*;
use loomcanvas::canvas::{NodeActivity, NodeType, Position};
use loomcanvas::compiler::GraphSnapshot;
use loomcanvas::run::{ExecutorError, RunEvent};
use loomcanvas::scope::Scope;
use loomcanvas::types::RunStatus;
use uuid::Uuid;

fn skill_id() -> String {
    Uuid::new_v4().to_string()
}

#[tokio::test]
async fn start_run_submits_the_snapshot_and_goes_pending() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    let input = session
        .create_node(NodeType::Input, Position::new(0.0, 0.0), "Input")
        .unwrap();
    let output = session
        .create_node(NodeType::Output, Position::new(100.0, 0.0), "Output")
        .unwrap();
    session.add_edge(input.id, None, output.id, None).unwrap();

    let executor = RecordingExecutor::new();
    let run_id = session
        .start_run(&executor, &test_buddy(), false)
        .await
        .expect("submission succeeds");

    assert_eq!(executor.submission_count(), 1);
    let bridge = session.run_bridge();
    assert_eq!(bridge.status(), RunStatus::Pending);
    assert_eq!(bridge.run_id(), Some(run_id));
    assert_eq!(bridge.error(), None);
    assert!(!bridge.stop_requested());

    // The executor received the full graph as method_data.
    let submissions = executor.submissions.lock();
    let request = &submissions[0];
    assert_eq!(request.method_id, session.skill_id());
    assert_eq!(request.buddy, test_buddy());
    let snapshot: GraphSnapshot = serde_json::from_value(request.method_data.clone()).unwrap();
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.edges.len(), 1);
    drop(submissions);
    session.close();
}

#[tokio::test]
async fn rejected_submission_leaves_the_run_idle() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;

    let err = session
        .start_run(&RejectingExecutor, &test_buddy(), false)
        .await
        .expect_err("rejection propagates");
    assert!(matches!(err, ExecutorError::Rejected { .. }));
    assert_eq!(session.run_bridge().status(), RunStatus::Idle);
    session.close();
}

#[tokio::test]
async fn run_progress_converges_on_every_client() {
    let hub = test_hub();
    let id = skill_id();
    let initiator = open_session(&hub, &id, Scope::ReadWrite).await;
    let observer = open_session(&hub, &id, Scope::ReadOnly).await;

    let prompt = initiator
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "Work")
        .unwrap();
    eventually(|| observer.model().node(prompt.id).ok().flatten().is_some()).await;

    // The executor (simulated here on the initiator's replica) writes
    // progress; the observer sees it without polling any service.
    let bridge = initiator.run_bridge();
    bridge.mark_running();
    bridge
        .write_node_progress(prompt.id, Some(NodeActivity::Executing), Some(40), None)
        .unwrap();

    eventually(|| observer.run_bridge().status() == RunStatus::Running).await;
    eventually(|| {
        observer
            .model()
            .node(prompt.id)
            .ok()
            .flatten()
            .map(|n| n.run.progress)
            == Some(Some(40))
    })
    .await;

    bridge.complete();
    eventually(|| observer.run_bridge().status() == RunStatus::Success).await;

    initiator.close();
    observer.close();
}

#[tokio::test]
async fn stop_is_advisory_and_tolerates_a_late_completion() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    let executor = RecordingExecutor::new();
    session
        .start_run(&executor, &test_buddy(), false)
        .await
        .unwrap();

    let bridge = session.run_bridge();
    let token = bridge.cancel_token();
    bridge.request_stop();
    assert!(token.is_cancelled());
    assert!(bridge.stop_requested());
    // Stopping does not rewrite the status by itself.
    assert_eq!(bridge.status(), RunStatus::Pending);

    // A task already dispatched completes anyway; the late terminal
    // status is accepted and recorded.
    bridge.complete();
    assert_eq!(bridge.status(), RunStatus::Success);
    assert!(bridge.stop_requested());
    session.close();
}

#[tokio::test]
async fn progress_for_a_deleted_node_is_dropped_not_fatal() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    let node = session
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "Gone")
        .unwrap();
    session.remove_node(node.id).unwrap();

    session
        .run_bridge()
        .write_node_progress(node.id, Some(NodeActivity::Active), Some(10), None)
        .expect("progress for a deleted node is tolerated");
    session.close();
}

#[tokio::test]
async fn starting_a_new_run_clears_stale_node_state() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    let node = session
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "Work")
        .unwrap();

    let bridge = session.run_bridge();
    bridge
        .write_node_progress(node.id, Some(NodeActivity::Executing), Some(80), Some("boom".into()))
        .unwrap();

    let executor = RecordingExecutor::new();
    session
        .start_run(&executor, &test_buddy(), false)
        .await
        .unwrap();

    let fresh = session.model().node(node.id).unwrap().unwrap();
    assert_eq!(fresh.run.state, None);
    assert_eq!(fresh.run.progress, None);
    assert_eq!(fresh.run.error, None);
    session.close();
}

#[tokio::test]
async fn watch_surfaces_status_and_stop_events() {
    let hub = test_hub();
    let id = skill_id();
    let initiator = open_session(&hub, &id, Scope::ReadWrite).await;
    let observer = open_session(&hub, &id, Scope::ReadOnly).await;

    let events = observer.run_bridge().watch();
    let executor = RecordingExecutor::new();
    initiator
        .start_run(&executor, &test_buddy(), false)
        .await
        .unwrap();
    initiator.run_bridge().mark_running();
    initiator.run_bridge().request_stop();
    initiator.run_bridge().fail("stopped midway");

    let mut saw_running = false;
    let mut saw_stop = false;
    let mut saw_error_status = false;
    let mut saw_message = false;
    for _ in 0..40 {
        let Ok(event) =
            tokio::time::timeout(std::time::Duration::from_secs(1), events.recv_async()).await
        else {
            break;
        };
        match event.unwrap() {
            RunEvent::StatusChanged(RunStatus::Running) => saw_running = true,
            RunEvent::StatusChanged(RunStatus::Error) => saw_error_status = true,
            RunEvent::StopRequested => saw_stop = true,
            RunEvent::ErrorChanged(Some(message)) => saw_message = message == "stopped midway",
            _ => {}
        }
        if saw_running && saw_stop && saw_error_status && saw_message {
            break;
        }
    }
    assert!(saw_running && saw_stop && saw_error_status && saw_message);

    initiator.close();
    observer.close();
}
