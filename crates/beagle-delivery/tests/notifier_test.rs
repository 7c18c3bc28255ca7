//! Integration tests for the broker to dispatcher bridge.

#![allow(clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use beagle_core::{InMemoryEventBroker, Peripheral, PeripheralEvent};
use beagle_delivery::{Dispatcher, DispatcherConfig, Notifier, Target};
use beagle_testing::{
    generic, ibeacon, post_subscriber, CollectingListener, RecordingTransport, TestClock,
};

struct Fixture {
    broker: InMemoryEventBroker,
    notifier: Arc<Notifier>,
    dispatcher: Arc<Dispatcher>,
    listener: CollectingListener,
    transport: RecordingTransport,
}

fn fixture() -> Fixture {
    let transport = RecordingTransport::new();
    let dispatcher = Arc::new(Dispatcher::start(
        DispatcherConfig { worker_count: 1, ..Default::default() },
        Arc::new(transport.clone()),
        Arc::new(TestClock::new()),
    ));
    let listener = CollectingListener::new();
    dispatcher.add_listener(Arc::new(listener.clone()));

    let target = Target {
        name: "front-door".into(),
        key: ibeacon(1, 2).unique_key().to_string(),
        subscribers: vec![post_subscriber("ops", "http://hooks.local/ops")],
    };
    let notifier = Arc::new(Notifier::new(dispatcher.clone(), [target]));

    let broker = InMemoryEventBroker::new();
    notifier.use_broker(&broker);

    Fixture { broker, notifier, dispatcher, listener, transport }
}

#[tokio::test]
async fn registered_sighting_is_dispatched_under_target_name() {
    let f = fixture();

    f.broker.publish(PeripheralEvent::Lost, ibeacon(1, 2), true);

    let batches = f.listener.wait_for_batches(1).await;
    assert_eq!(batches[0][0].event, PeripheralEvent::Lost);
    assert_eq!(batches[0][0].target_name, "front-door");

    let body = f.transport.requests()[0].body_json();
    assert_eq!(body["name"], "front-door");

    f.dispatcher.shutdown().await.unwrap();
}

#[tokio::test]
async fn unregistered_sightings_are_ignored() {
    let f = fixture();

    f.broker.publish(PeripheralEvent::Found, ibeacon(1, 2), false);
    f.broker.publish(PeripheralEvent::Found, generic("stranger"), false);

    f.listener.assert_quiet_for(Duration::from_millis(100)).await;
    f.dispatcher.shutdown().await.unwrap();
    assert_eq!(f.transport.request_count(), 0);
}

#[tokio::test]
async fn registered_flag_without_target_is_skipped() {
    let f = fixture();

    let queued = f.notifier.notify(PeripheralEvent::Found, &generic("stranger"), true).unwrap();
    assert!(!queued);

    let queued = f.notifier.notify(PeripheralEvent::Found, &ibeacon(1, 2), true).unwrap();
    assert!(queued);

    f.listener.wait_for_batches(1).await;
    f.dispatcher.shutdown().await.unwrap();
}

#[test]
fn target_lookup_uses_peripheral_key() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let _guard = runtime.enter();

    let dispatcher = Arc::new(Dispatcher::start(
        DispatcherConfig::default(),
        Arc::new(RecordingTransport::new()),
        Arc::new(TestClock::new()),
    ));
    let key = ibeacon(7, 8).unique_key().to_string();
    let notifier = Notifier::new(
        dispatcher,
        [Target { name: "vault".into(), key: key.clone(), subscribers: vec![] }],
    );

    assert!(notifier.is_registered(&key));
    assert!(!notifier.is_registered("other"));
    assert_eq!(notifier.target(&key).map(|t| t.name.as_str()), Some("vault"));
}

#[tokio::test]
async fn dispatch_failures_after_shutdown_are_swallowed_by_broker_handler() {
    let f = fixture();
    f.dispatcher.shutdown().await.unwrap();

    // Handler logs the rejection instead of panicking.
    assert_eq!(f.broker.publish(PeripheralEvent::Found, ibeacon(1, 2), true), 1);
    assert!(f.notifier.notify(PeripheralEvent::Found, &ibeacon(1, 2), true).is_err());
}
