//! In-memory integration tests for node creation and value updates.

use super::helpers::{Fleet, fleet};
use opcua_fleet::node::{
    domain::{DataType, NodeDomainError, NodeSpec, ValueChangeKind},
    ports::NodeRepositoryError,
    services::{Direction, GeneratorCursor, NodeValueServiceError},
};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_creates_one_node_per_index(fleet: Fleet) {
    let created = fleet
        .nodes
        .create_batch(&NodeSpec::new("Pump{1-4}", "ns=2;s=Pump{1-4}", DataType::Bool))
        .await
        .expect("batch should be created");

    let names: Vec<&str> = created.iter().map(|node| node.definition().name()).collect();
    assert_eq!(names, vec!["Pump1", "Pump2", "Pump3", "Pump4"]);
    assert_eq!(
        created
            .get(3)
            .map(|node| node.definition().address().as_str()),
        Some("ns=2;s=Pump4")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn oversized_batch_stores_nothing(fleet: Fleet) {
    let result = fleet
        .nodes
        .create_batch(&NodeSpec::new("Valve{1-101}", "ns=2;s=Valve{1-101}", DataType::Bool))
        .await;

    assert!(matches!(
        result,
        Err(NodeValueServiceError::Domain(NodeDomainError::PatternTooLarge { .. }))
    ));
    let retry = fleet
        .nodes
        .create(NodeSpec::new("Valve1", "ns=2;s=Valve1", DataType::Bool))
        .await
        .expect("address should still be free");
    assert_eq!(retry.id().value(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_address_is_rejected(fleet: Fleet) {
    fleet
        .nodes
        .create(NodeSpec::new("Level", "ns=2;s=Level", DataType::Double))
        .await
        .expect("first node should be created");

    let result = fleet
        .nodes
        .create(NodeSpec::new("Level copy", "ns=2;s=Level", DataType::Double))
        .await;

    assert!(matches!(
        result,
        Err(NodeValueServiceError::Repository(
            NodeRepositoryError::DuplicateAddress(_)
        ))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn trigger_evaluates_expression_against_both_values(fleet: Fleet) {
    let trigger = fleet
        .nodes
        .create(NodeSpec::new("Setpoint", "ns=2;s=Setpoint", DataType::Double).with_initial_value("10"))
        .await
        .expect("trigger node should be created");
    let follower = fleet
        .nodes
        .create(
            NodeSpec::new("Output", "ns=2;s=Output", DataType::Double)
                .with_initial_value("4")
                .with_value_change(
                    ValueChangeKind::Conditional,
                    Some(json!({
                        "trigger_node_id": trigger.id().value(),
                        "trigger_value": "10",
                        "change_value": "trigger_value * 2 + current_value"
                    })),
                ),
        )
        .await
        .expect("follower node should be created");

    let updated = fleet
        .nodes
        .apply_trigger(follower.id(), trigger.id())
        .await
        .expect("trigger should apply");

    assert_eq!(updated.definition().initial_value(), Some("24.0"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn non_matching_trigger_leaves_value(fleet: Fleet) {
    let trigger = fleet
        .nodes
        .create(NodeSpec::new("Alarm", "ns=2;s=Alarm", DataType::Bool).with_initial_value("false"))
        .await
        .expect("trigger node should be created");
    let follower = fleet
        .nodes
        .create(
            NodeSpec::new("Mode", "ns=2;s=Mode", DataType::String)
                .with_initial_value("normal")
                .with_value_change(
                    ValueChangeKind::Conditional,
                    Some(json!({
                        "trigger_node_id": trigger.id().value(),
                        "trigger_value": "true",
                        "change_value": "alarm"
                    })),
                ),
        )
        .await
        .expect("follower node should be created");

    let unchanged = fleet
        .nodes
        .apply_trigger(follower.id(), trigger.id())
        .await
        .expect("trigger should be evaluated");

    assert_eq!(unchanged.definition().initial_value(), Some("normal"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linear_ramp_turns_at_upper_bound(fleet: Fleet) {
    let node = fleet
        .nodes
        .create(
            NodeSpec::new("Ramp", "ns=2;s=Ramp", DataType::Int32)
                .with_initial_value("8")
                .with_value_change(
                    ValueChangeKind::Linear,
                    Some(json!({
                        "min_value": 0,
                        "max_value": 10,
                        "update_interval": 500,
                        "step_size": 2,
                        "reset_on_bounds": false
                    })),
                ),
        )
        .await
        .expect("ramp node should be created");

    let first = fleet
        .nodes
        .step(node.id(), GeneratorCursor::default())
        .await
        .expect("step should succeed")
        .expect("linear node should step");
    assert_eq!(first.node.definition().initial_value(), Some("10"));
    assert_eq!(first.cursor.direction, Direction::Falling);

    let second = fleet
        .nodes
        .step(node.id(), first.cursor)
        .await
        .expect("step should succeed")
        .expect("linear node should step");
    assert_eq!(second.node.definition().initial_value(), Some("8"));
    assert_eq!(second.delay.as_millis(), 500);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn step_skips_nodes_without_generator(fleet: Fleet) {
    let node = fleet
        .nodes
        .create(NodeSpec::new("Static", "ns=2;s=Static", DataType::String).with_initial_value("x"))
        .await
        .expect("node should be created");

    let outcome = fleet
        .nodes
        .step(node.id(), GeneratorCursor::default())
        .await
        .expect("step should succeed");

    assert!(outcome.is_none());
}
