//! End-to-end tests for the complete sighting to webhook workflow.
//!
//! Exercises broker fan-out into both the activity directory and the
//! notifier, real HTTP delivery against wiremock, and graceful shutdown.

use std::{sync::Arc, time::Duration};

use beagle_activity::ActivityDirectory;
use beagle_core::{
    Clock, Endpoint, InMemoryEventBroker, Peripheral, PeripheralEvent, Subscriber,
};
use beagle_delivery::{
    ClientConfig, Dispatcher, DispatcherConfig, HttpTransport, Notifier, Target,
};
use beagle_testing::{generic, ibeacon, CollectingListener, TestClock};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

struct Service {
    broker: InMemoryEventBroker,
    directory: Arc<ActivityDirectory>,
    dispatcher: Arc<Dispatcher>,
    listener: CollectingListener,
}

fn service(targets: Vec<Target>, clock: Arc<dyn Clock>) -> Service {
    let broker = InMemoryEventBroker::new();
    let directory = Arc::new(ActivityDirectory::new(clock.clone())).use_broker(&broker);

    let config = DispatcherConfig {
        worker_count: 2,
        queue_capacity: 16,
        shutdown_timeout: Duration::from_secs(5),
        client_config: ClientConfig { timeout: Duration::from_secs(2), ..Default::default() },
    };
    let transport = Arc::new(HttpTransport::new(config.client_config.clone()).unwrap());
    let dispatcher = Arc::new(Dispatcher::start(config, transport, clock));
    let listener = CollectingListener::new();
    dispatcher.add_listener(Arc::new(listener.clone()));

    Arc::new(Notifier::new(dispatcher.clone(), targets)).use_broker(&broker);

    Service { broker, directory, dispatcher, listener }
}

/// The golden path: a registered beacon appears and disappears.
///
/// Both subscribers hear about each transition, the directory follows the
/// beacon in and out, and shutdown drains cleanly.
#[tokio::test]
async fn registered_beacon_round_trip() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/ops"))
        .and(matchers::body_partial_json(json!({"name": "front-door", "kind": "ibeacon"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/audit"))
        .and(matchers::query_param("name", "front-door"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let beacon = ibeacon(1, 2);
    let target = Target {
        name: "front-door".into(),
        key: beacon.unique_key().to_string(),
        subscribers: vec![
            Subscriber::new("ops", Endpoint::new("ops", "POST", format!("{}/ops", server.uri()))),
            Subscriber::new(
                "audit",
                Endpoint::new("audit", "get", format!("{}/audit", server.uri())),
            ),
            Subscriber::without_endpoint("not-yet-configured"),
        ],
    };

    let clock = TestClock::new();
    let svc = service(vec![target], Arc::new(clock.clone()));

    svc.broker.publish(PeripheralEvent::Found, beacon.clone(), true);
    let batches = svc.listener.wait_for_batches(1).await;

    assert_eq!(svc.directory.quantity(), 1);
    assert!(svc.directory.records(0, 0)[0].registered);
    assert_eq!(batches[0].len(), 3);
    assert!(batches[0].iter().all(|o| o.delivered), "{:?}", batches[0]);
    assert!(batches[0].iter().all(|o| o.event == PeripheralEvent::Found));

    clock.advance(Duration::from_secs(60));
    svc.broker.publish(PeripheralEvent::Lost, beacon, true);
    let batches = svc.listener.wait_for_batches(2).await;

    assert_eq!(svc.directory.quantity(), 0);
    assert!(batches[1].iter().all(|o| o.event == PeripheralEvent::Lost && o.delivered));
    assert_eq!(batches[1][0].timestamp, clock.now());

    svc.dispatcher.shutdown().await.unwrap();
}

/// Unregistered peripherals show up in the directory but never reach
/// subscribers.
#[tokio::test]
async fn unregistered_peripherals_are_tracked_but_not_notified() {
    let server = MockServer::start().await;

    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let svc = service(Vec::new(), Arc::new(TestClock::new()));

    for key in ["b", "a", "c"] {
        svc.broker.publish(PeripheralEvent::Found, generic(key), false);
    }

    svc.listener.assert_quiet_for(Duration::from_millis(100)).await;

    let keys: Vec<_> = svc.directory.records(2, 0).into_iter().map(|r| r.key).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(svc.directory.quantity(), 3);

    svc.dispatcher.shutdown().await.unwrap();
}

/// A failing subscriber does not block the others and nothing is retried.
#[tokio::test]
async fn failing_subscriber_is_reported_once() {
    let server = MockServer::start().await;

    Mock::given(matchers::path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::path("/healthy"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let beacon = ibeacon(5, 5);
    let target = Target {
        name: "vault".into(),
        key: beacon.unique_key().to_string(),
        subscribers: vec![
            Subscriber::new(
                "broken",
                Endpoint::new("broken", "POST", format!("{}/broken", server.uri())),
            ),
            Subscriber::new(
                "healthy",
                Endpoint::new("healthy", "POST", format!("{}/healthy", server.uri())),
            ),
        ],
    };

    let svc = service(vec![target], Arc::new(TestClock::new()));
    svc.broker.publish(PeripheralEvent::Found, beacon, true);

    let batches = svc.listener.wait_for_batches(1).await;
    svc.dispatcher.shutdown().await.unwrap();

    let outcomes = &batches[0];
    assert!(!outcomes[0].delivered);
    assert!(outcomes[0].error.as_ref().unwrap().to_string().contains("500"));
    assert!(outcomes[1].delivered);

    let stats = svc.dispatcher.stats().await;
    assert_eq!(stats.successful_deliveries, 1);
    assert_eq!(stats.failed_deliveries, 1);
}
