mod common;

use common::*;
use loomcanvas::canvas::{NodeType, Position};
use loomcanvas::scope::Scope;
use loomcanvas::session::SessionError;
use uuid::Uuid;

fn skill_id() -> String {
    Uuid::new_v4().to_string()
}

#[tokio::test]
async fn read_only_create_makes_zero_store_calls() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadOnly).await;

    let events = session.canvas_events();
    let err = session
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "nope")
        .expect_err("read-only scope must deny node creation");
    assert!(matches!(err, SessionError::Permission(_)));

    // The gate fired before any store mutation: no change event exists.
    assert!(events.try_recv().is_err());
    assert!(session.model().nodes().is_empty());
    session.close();
}

#[tokio::test]
async fn read_write_permits_full_editing() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;

    let input = session
        .create_node(NodeType::Input, Position::new(0.0, 0.0), "Input")
        .unwrap();
    let prompt = session
        .create_node(NodeType::Prompt, Position::new(200.0, 0.0), "Summarize")
        .unwrap();
    let edge = session.add_edge(input.id, None, prompt.id, None).unwrap();

    assert_eq!(session.model().nodes().len(), 2);
    assert_eq!(session.model().edges().len(), 1);
    assert_eq!(session.model().title(prompt.id).unwrap().as_deref(), Some("Summarize"));

    session.remove_edge(&edge.id).unwrap();
    assert!(session.model().live_edges().is_empty());
    session.close();
}

#[tokio::test]
async fn with_input_scope_may_only_edit_skill_inputs() {
    let hub = test_hub();
    let id = skill_id();

    // An author builds the skill with read-write scope.
    let author = open_session(&hub, &id, Scope::ReadWrite).await;
    let source = author
        .create_node(NodeType::Default, Position::new(0.0, 0.0), "Question")
        .unwrap();
    let input = author
        .create_node(NodeType::Input, Position::new(100.0, 0.0), "Input")
        .unwrap();
    let prompt = author
        .create_node(NodeType::Prompt, Position::new(200.0, 0.0), "Answer")
        .unwrap();
    author.add_edge(source.id, None, input.id, None).unwrap();
    author.add_edge(input.id, None, prompt.id, None).unwrap();

    // An end user opens the published skill with input-only scope.
    let user = open_session(&hub, &id, Scope::ReadOnlyWithInput).await;
    assert!(user.is_skill_input(source.id));

    user.update_node(source.id, |n| n.position = Position::new(5.0, 5.0))
        .expect("live inputs are editable under read-only-with-input");

    let err = user
        .update_node(prompt.id, |n| n.position = Position::new(9.0, 9.0))
        .expect_err("workflow nodes are not editable under read-only-with-input");
    assert!(matches!(err, SessionError::Permission(_)));

    let err = user
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "nope")
        .expect_err("structural edits are denied");
    assert!(matches!(err, SessionError::Permission(_)));

    author.close();
    user.close();
}

#[tokio::test]
async fn scope_is_reevaluated_per_operation() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;

    let node = session
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "Draft")
        .unwrap();

    // The draft gets published: the same session is demoted.
    session.set_scope(Scope::ReadOnly);
    let err = session
        .update_node(node.id, |n| n.position = Position::new(1.0, 1.0))
        .expect_err("demoted scope must deny further edits");
    assert!(matches!(err, SessionError::Permission(_)));

    // And promoted again.
    session.set_scope(Scope::ReadWrite);
    session
        .update_node(node.id, |n| n.position = Position::new(1.0, 1.0))
        .expect("restored scope permits edits");
    session.close();
}

#[tokio::test]
async fn removing_a_node_removes_its_incident_edges_and_title() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;

    let a = session
        .create_node(NodeType::Input, Position::new(0.0, 0.0), "A")
        .unwrap();
    let b = session
        .create_node(NodeType::Prompt, Position::new(100.0, 0.0), "B")
        .unwrap();
    let c = session
        .create_node(NodeType::Output, Position::new(200.0, 0.0), "C")
        .unwrap();
    session.add_edge(a.id, None, b.id, None).unwrap();
    session.add_edge(b.id, None, c.id, None).unwrap();

    session.remove_node(b.id).unwrap();

    assert_eq!(session.model().nodes().len(), 2);
    assert!(session.model().live_edges().is_empty());
    assert_eq!(session.model().title(b.id).unwrap(), None);
    session.close();
}

#[tokio::test]
async fn session_undo_reverts_the_last_batch() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;

    let node = session
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "Draft")
        .unwrap();
    assert_eq!(session.model().nodes().len(), 1);

    assert!(session.undo().unwrap());
    assert!(session.model().nodes().is_empty());

    assert!(session.redo().unwrap());
    assert_eq!(session.model().nodes().len(), 1);
    assert_eq!(session.model().node(node.id).unwrap().map(|n| n.id), Some(node.id));

    // Undo itself is a mutation and is denied once the session is
    // read-only.
    session.set_scope(Scope::ReadOnly);
    assert!(matches!(
        session.undo(),
        Err(SessionError::Permission(_))
    ));
    session.close();
}

#[tokio::test]
async fn two_sessions_converge_on_the_same_canvas() {
    let hub = test_hub();
    let id = skill_id();
    let alice = open_session(&hub, &id, Scope::ReadWrite).await;
    let bob = open_session(&hub, &id, Scope::ReadWrite).await;

    let node = alice
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "Shared")
        .unwrap();

    eventually(|| bob.model().node(node.id).ok().flatten().is_some()).await;
    assert_eq!(
        bob.model().title(node.id).unwrap().as_deref(),
        Some("Shared")
    );

    bob.update_node(node.id, |n| n.position = Position::new(50.0, 50.0))
        .unwrap();
    eventually(|| {
        alice
            .model()
            .node(node.id)
            .ok()
            .flatten()
            .map(|n| n.position.x)
            == Some(50.0)
    })
    .await;

    alice.close();
    bob.close();
}
