//! In-memory integration tests for server start, stop, and sweeps.

use std::time::Duration;

use super::helpers::{Fleet, fleet};
use opcua_fleet::node::domain::{DataType, NodeSpec};
use opcua_fleet::server::{
    domain::{ServerDomainError, ServerStatus, ServerStatusUpdate},
    ports::ServerRepository,
    services::{LifecycleError, ProvisionWarning},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_publishes_linked_nodes_only(fleet: Fleet) {
    let boiler = fleet.add_server("Boiler House", 4840).await;
    let chiller = fleet.add_server("Chiller Plant", 4841).await;
    fleet
        .nodes
        .create_batch(
            &NodeSpec::new("Temp{1-2}", "ns=2;s=Temp{1-2}", DataType::Double)
                .with_initial_value("21.5")
                .on_server(boiler.id()),
        )
        .await
        .expect("boiler nodes should be created");
    fleet
        .nodes
        .create(
            NodeSpec::new("Flow", "ns=2;s=Flow", DataType::Double).on_server(chiller.id()),
        )
        .await
        .expect("chiller node should be created");

    let outcome = fleet
        .orchestrator
        .start(boiler.id())
        .await
        .expect("start should succeed");

    assert_eq!(outcome.endpoint, "opc.tcp://0.0.0.0:4840/freeopcua/server/");
    assert!(outcome.warnings.is_empty());
    let published = fleet
        .host
        .published(&outcome.endpoint)
        .expect("host state should be readable")
        .expect("instance should be bound");
    assert_eq!(published.namespaces, vec!["urn:Boiler House".to_owned()]);
    let addresses: Vec<&str> = published
        .variables
        .iter()
        .map(|variable| variable.address.as_str())
        .collect();
    assert_eq!(addresses, vec!["ns=2;s=Temp1", "ns=2;s=Temp2"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsupported_node_type_is_skipped_with_warning(fleet: Fleet) {
    let server = fleet.add_server("Packaging", 4850).await;
    let skipped = fleet
        .nodes
        .create(NodeSpec::new("Label", "ns=2;s=Label", DataType::Localizedtext).on_server(server.id()))
        .await
        .expect("node should be created");
    fleet
        .nodes
        .create(NodeSpec::new("Count", "ns=2;s=Count", DataType::Int32).on_server(server.id()))
        .await
        .expect("node should be created");

    let outcome = fleet
        .orchestrator
        .start(server.id())
        .await
        .expect("start should succeed despite the skipped node");

    assert_eq!(outcome.server.status(), ServerStatus::Running);
    assert!(matches!(
        outcome.warnings.as_slice(),
        [ProvisionWarning::UnsupportedDataType { node_id, .. }] if *node_id == skipped.id()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_starts_admit_exactly_one(fleet: Fleet) {
    let server = fleet.add_server("Boiler House", 4840).await;
    fleet
        .host
        .set_start_delay(Duration::from_millis(50))
        .expect("delay should be set");

    let (first, second) = tokio::join!(
        fleet.orchestrator.start(server.id()),
        fleet.orchestrator.start(server.id())
    );

    let admitted = [first.is_ok(), second.is_ok()];
    assert_eq!(admitted.iter().filter(|ok| **ok).count(), 1);
    assert!(
        matches!(first, Err(LifecycleError::AlreadyRunning(_)))
            || matches!(second, Err(LifecycleError::AlreadyRunning(_)))
    );
    assert_eq!(fleet.host.bound_count().expect("host readable"), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_during_start_reports_operation_in_progress(fleet: Fleet) {
    let server = fleet.add_server("Boiler House", 4840).await;
    fleet
        .host
        .set_start_delay(Duration::from_millis(50))
        .expect("delay should be set");

    let (started, stopped) = tokio::join!(
        fleet.orchestrator.start(server.id()),
        fleet.orchestrator.stop(server.id())
    );

    started.expect("start should finish");
    assert!(matches!(stopped, Err(LifecycleError::OperationInProgress(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_server_on_same_port_conflicts(fleet: Fleet) {
    let first = fleet.add_server("Line A", 4840).await;
    let second = fleet.add_server("Line B", 4840).await;
    fleet
        .orchestrator
        .start(first.id())
        .await
        .expect("first start should succeed");

    let result = fleet.orchestrator.start(second.id()).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Domain(ServerDomainError::PortInUse { owner, .. })) if owner == first.id()
    ));
    let stored = fleet
        .servers
        .find_by_id(second.id())
        .await
        .expect("lookup should succeed")
        .expect("server should exist");
    assert_eq!(stored.status(), ServerStatus::Stopped);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_stop_cycle_publishes_each_transition(fleet: Fleet) {
    let server = fleet.add_server("Boiler House", 4840).await;

    fleet
        .orchestrator
        .start(server.id())
        .await
        .expect("start should succeed");
    let outcome = fleet
        .orchestrator
        .stop(server.id())
        .await
        .expect("stop should succeed");

    assert!(outcome.was_running);
    assert_eq!(outcome.server.endpoint(), None);
    assert_eq!(
        fleet.publisher.statuses(),
        vec![ServerStatus::Starting, ServerStatus::Running, ServerStatus::Stopped]
    );
    assert_eq!(fleet.host.bound_count().expect("host readable"), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_start_leaves_error_and_allows_retry(fleet: Fleet) {
    let server = fleet.add_server("Boiler House", 4840).await;
    let endpoint = "opc.tcp://0.0.0.0:4840/freeopcua/server/";
    fleet.host.fail_start(endpoint).expect("failure should be set");

    let failed = fleet.orchestrator.start(server.id()).await;
    assert!(matches!(failed, Err(LifecycleError::Protocol(_))));
    let stored = fleet
        .servers
        .find_by_id(server.id())
        .await
        .expect("lookup should succeed")
        .expect("server should exist");
    assert_eq!(stored.status(), ServerStatus::Error);

    fleet.host.clear_failures().expect("failures should clear");
    let retried = fleet
        .orchestrator
        .start(server.id())
        .await
        .expect("retry should succeed");
    assert_eq!(retried.server.status(), ServerStatus::Running);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn recovery_resets_stale_statuses(fleet: Fleet) {
    let stale = fleet.add_server("Boiler House", 4840).await;
    fleet.add_server("Chiller Plant", 4841).await;
    fleet
        .servers
        .update_status(
            stale.id(),
            ServerStatusUpdate {
                status: ServerStatus::Running,
                endpoint: Some("opc.tcp://0.0.0.0:4840/freeopcua/server/".to_owned()),
                last_started: None,
                uptime_seconds: 0,
            },
        )
        .await
        .expect("status should be stored");

    let reset = fleet
        .orchestrator
        .recover()
        .await
        .expect("recovery should succeed");

    assert_eq!(reset, 1);
    let events = fleet.publisher.events();
    assert_eq!(events.len(), 1);
    assert!(
        events
            .iter()
            .all(|event| event.id == stale.id() && event.status == ServerStatus::Stopped)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_every_live_instance(fleet: Fleet) {
    for (name, port) in [("North", 4840), ("South", 4841), ("East", 4842)] {
        let server = fleet.add_server(name, port).await;
        fleet
            .orchestrator
            .start(server.id())
            .await
            .expect("start should succeed");
    }

    let summary = fleet.orchestrator.shutdown().await;

    assert_eq!(summary.stopped, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(fleet.host.bound_count().expect("host readable"), 0);
    let servers = fleet.servers.list_all().await.expect("listing should succeed");
    assert!(servers.iter().all(|server| server.status() == ServerStatus::Stopped));
}
