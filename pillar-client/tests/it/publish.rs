use crate::helper::{self, EXCHANGE, TOPIC};
use crate::unwrap_failure;
use pillar_client::memory::{BrokerOp, MemoryBroker};
use pillar_client::*;
use serde_json::json;

fn no_consume() -> ClientOptions {
    ClientOptions {
        consume: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn publish_before_the_channel_exists_fails_without_the_driver() {
    let broker = MemoryBroker::new();
    broker.fail_with(BrokerOp::Connect, 320, "connection refused");

    let client = BrokerClient::new(
        broker.clone(),
        helper::test_config(),
        TOPIC,
        ClientOptions::default(),
    )
    .unwrap();
    let mut events = client.subscribe();

    let sent = client.publish(&json!({"id": 1})).await;

    assert!(!sent);

    let failure = unwrap_failure(helper::next_event(&mut events).await);
    assert_eq!(failure, Failure::NotReady);
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn publish_after_setup_reaches_the_driver_verbatim() {
    let (broker, client, mut events) = helper::start(no_consume());

    helper::wait_for_ready(&mut events).await;

    let message = json!({"greeting": "hello"});
    let sent = client.publish(&message).await;

    assert!(sent);
    assert_eq!(
        broker.published(),
        vec![(
            EXCHANGE.to_string(),
            TOPIC.to_string(),
            serde_json::to_vec(&message).unwrap(),
        )]
    );

    match helper::next_event(&mut events).await {
        ClientEvent::Published { accepted, body } => {
            assert!(accepted);
            assert_eq!(body, message);
        }
        other => panic!("{other:?} is not a Published event"),
    }
}

#[tokio::test]
async fn backpressure_is_surfaced_not_retried() {
    let (broker, client, mut events) = helper::start(no_consume());

    helper::wait_for_ready(&mut events).await;
    broker.set_backpressure(true);

    let sent = client.publish(&json!({"id": 1})).await;

    assert!(sent);
    assert_eq!(broker.published().len(), 1);

    match helper::next_event(&mut events).await {
        ClientEvent::Published { accepted, .. } => assert!(!accepted),
        other => panic!("{other:?} is not a Published event"),
    }
}

#[tokio::test]
async fn refused_publish_returns_false_and_reports() {
    let (broker, client, mut events) = helper::start(no_consume());

    helper::wait_for_ready(&mut events).await;
    broker.fail_with(BrokerOp::Publish, 501, "frame error");

    let sent = client.publish(&json!({"id": 1})).await;

    assert!(!sent);

    let failure = unwrap_failure(helper::next_event(&mut events).await);
    assert!(matches!(failure, Failure::Channel(_)));
}

struct Unserializable;

impl serde::Serialize for Unserializable {
    fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("always refused"))
    }
}

#[tokio::test]
async fn unserializable_message_never_reaches_the_driver() {
    let (broker, client, mut events) = helper::start(no_consume());

    helper::wait_for_ready(&mut events).await;

    let sent = client.publish(&Unserializable).await;

    assert!(!sent);

    let failure = unwrap_failure(helper::next_event(&mut events).await);
    assert!(matches!(failure, Failure::Encode(_)));
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn published_message_loops_back_to_the_consumer() {
    let (_broker, client, mut events) = helper::start(ClientOptions::default());

    helper::wait_for_ready(&mut events).await;
    helper::wait_until("client consuming", || client.state() == SetupState::Consuming).await;

    let sent = client.publish(&json!({"id": 42})).await;
    assert!(sent);

    loop {
        match helper::next_event(&mut events).await {
            ClientEvent::Delivery(inbound) => {
                assert_eq!(inbound.message["id"], 42);
                assert_eq!(inbound.routing_key, TOPIC);
                break;
            }
            ClientEvent::Published { accepted, .. } => assert!(accepted),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
