mod common;

use common::*;
use loomcanvas::canvas::{NodeType, Position};
use loomcanvas::scope::Scope;
use rustc_hash::FxHashMap;
use uuid::Uuid;

fn skill_id() -> String {
    Uuid::new_v4().to_string()
}

#[tokio::test]
async fn export_normalizes_positions_to_the_bounding_box() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;

    let a = session
        .create_node(NodeType::Input, Position::new(300.0, 150.0), "A")
        .unwrap();
    let b = session
        .create_node(NodeType::Prompt, Position::new(500.0, 400.0), "B")
        .unwrap();

    let payload = session.export(&FxHashMap::default());
    let exported_a = payload.nodes.iter().find(|n| n.id == a.id).unwrap();
    let exported_b = payload.nodes.iter().find(|n| n.id == b.id).unwrap();

    // The minimum bounding box corner becomes the origin.
    assert_eq!((exported_a.position.x, exported_a.position.y), (0.0, 0.0));
    assert_eq!((exported_b.position.x, exported_b.position.y), (200.0, 250.0));
    session.close();
}

#[tokio::test]
async fn export_carries_titles_types_and_content() {
    let hub = test_hub();
    let session = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    let prompt = session
        .create_node(NodeType::Prompt, Position::new(0.0, 0.0), "Summarize")
        .unwrap();
    let note = session
        .create_node(NodeType::Default, Position::new(10.0, 10.0), "Note")
        .unwrap();

    let mut contents = FxHashMap::default();
    contents.insert(prompt.id, "Summarize the input".to_string());

    let payload = session.export(&contents);
    let exported_prompt = payload.nodes.iter().find(|n| n.id == prompt.id).unwrap();
    assert_eq!(exported_prompt.title, "Summarize");
    assert_eq!(exported_prompt.node_type.as_deref(), Some("prompt"));
    assert_eq!(exported_prompt.content.as_deref(), Some("Summarize the input"));

    // Default-typed nodes omit the type tag entirely.
    let exported_note = payload.nodes.iter().find(|n| n.id == note.id).unwrap();
    assert_eq!(exported_note.node_type, None);
    assert_eq!(exported_note.content, None);
    session.close();
}

#[tokio::test]
async fn round_trip_into_a_fresh_canvas() {
    let hub = test_hub();
    let source = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    let input = source
        .create_node(NodeType::Input, Position::new(0.0, 0.0), "Input")
        .unwrap();
    let output = source
        .create_node(NodeType::Output, Position::new(100.0, 0.0), "Output")
        .unwrap();
    source.add_edge(input.id, None, output.id, None).unwrap();

    let payload = source.export(&FxHashMap::default());
    let json = serde_json::to_string(&payload).unwrap();
    let parsed = serde_json::from_str(&json).unwrap();

    let target = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    target.import(&parsed).unwrap();

    assert_eq!(target.model().nodes().len(), 2);
    assert_eq!(target.model().live_edges().len(), 1);
    assert_eq!(
        target.model().title(input.id).unwrap().as_deref(),
        Some("Input")
    );
    assert_eq!(
        target
            .model()
            .node(input.id)
            .unwrap()
            .unwrap()
            .node_type(),
        NodeType::Input
    );

    // Importing the same payload again is idempotent.
    target.import(&parsed).unwrap();
    assert_eq!(target.model().nodes().len(), 2);
    assert_eq!(target.model().live_edges().len(), 1);

    source.close();
    target.close();
}

#[tokio::test]
async fn import_tolerates_an_edge_that_outlived_its_node() {
    let hub = test_hub();
    let source = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    let a = source
        .create_node(NodeType::Input, Position::new(0.0, 0.0), "A")
        .unwrap();
    let b = source
        .create_node(NodeType::Output, Position::new(100.0, 0.0), "B")
        .unwrap();
    source.add_edge(a.id, None, b.id, None).unwrap();

    let mut payload = source.export(&FxHashMap::default());
    // The exporter's node was deleted between capture and import.
    payload.nodes.retain(|n| n.id != b.id);

    let target = open_session(&hub, &skill_id(), Scope::ReadWrite).await;
    target.import(&payload).expect("dangling edges import fine");

    assert_eq!(target.model().nodes().len(), 1);
    assert_eq!(target.model().edges().len(), 1);
    assert!(target.model().live_edges().is_empty());

    source.close();
    target.close();
}
