use crate::helper::{self, EXCHANGE, TOPIC};
use crate::{unwrap_delivery, unwrap_failure};
use pillar_client::*;
use serde_json::json;

async fn start_consuming(
    options: ClientOptions,
) -> (
    pillar_client::memory::MemoryBroker,
    BrokerClient<pillar_client::memory::MemoryBroker>,
    tokio::sync::broadcast::Receiver<ClientEvent>,
) {
    let (broker, client, mut events) = helper::start(options);

    helper::wait_for_ready(&mut events).await;
    helper::wait_until("client consuming", || client.state() == SetupState::Consuming).await;

    (broker, client, events)
}

#[tokio::test]
async fn well_formed_delivery_is_emitted_and_acked() {
    let (broker, _client, mut events) = start_consuming(ClientOptions::default()).await;

    broker.push(EXCHANGE, TOPIC, br#"{"id":1}"#);

    let inbound = unwrap_delivery(helper::next_event(&mut events).await);

    assert_eq!(inbound.message, json!({"id": 1}));
    assert_eq!(inbound.message["id"], 1);
    assert_eq!(inbound.exchange, EXCHANGE);
    assert_eq!(inbound.routing_key, TOPIC);
    assert_eq!(inbound.body, br#"{"id":1}"#);
    assert!(!inbound.redelivered);

    helper::wait_until("delivery acked", || broker.acked() == vec![inbound.delivery_tag]).await;
}

#[tokio::test]
async fn malformed_delivery_reports_parse_failure_and_is_still_acked() {
    let (broker, _client, mut events) = start_consuming(ClientOptions::default()).await;

    broker.push(EXCHANGE, TOPIC, b"not-json");

    let failure = unwrap_failure(helper::next_event(&mut events).await);
    assert!(matches!(failure, Failure::Parse(_)));

    helper::wait_until("delivery acked", || broker.acked().len() == 1).await;
}

#[tokio::test]
async fn a_malformed_delivery_does_not_stop_the_loop() {
    let (broker, _client, mut events) = start_consuming(ClientOptions::default()).await;

    broker.push(EXCHANGE, TOPIC, b"not-json");
    broker.push(EXCHANGE, TOPIC, br#"{"id":2}"#);

    let failure = unwrap_failure(helper::next_event(&mut events).await);
    assert!(matches!(failure, Failure::Parse(_)));

    let inbound = unwrap_delivery(helper::next_event(&mut events).await);
    assert_eq!(inbound.message["id"], 2);

    helper::wait_until("both deliveries acked", || broker.acked().len() == 2).await;
}

#[tokio::test]
async fn acknowledge_flag_off_never_acks() {
    let options = ClientOptions {
        acknowledge: false,
        ..Default::default()
    };
    let (broker, _client, mut events) = start_consuming(options).await;

    broker.push(EXCHANGE, TOPIC, br#"{"id":1}"#);
    broker.push(EXCHANGE, TOPIC, b"not-json");

    unwrap_delivery(helper::next_event(&mut events).await);
    unwrap_failure(helper::next_event(&mut events).await);

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(broker.acked().is_empty());
}

#[tokio::test]
async fn ack_failure_is_reported() {
    let (broker, _client, mut events) = start_consuming(ClientOptions::default()).await;

    broker.fail_with(pillar_client::memory::BrokerOp::Ack, 504, "channel gone");
    broker.push(EXCHANGE, TOPIC, br#"{"id":1}"#);

    unwrap_delivery(helper::next_event(&mut events).await);

    let failure = unwrap_failure(helper::next_event(&mut events).await);
    assert!(matches!(failure, Failure::Ack(_)));
    assert!(broker.acked().is_empty());
}

#[tokio::test]
async fn deliveries_queued_before_the_consumer_are_received() {
    let (broker, client, mut events) = helper::start(ClientOptions::default());

    helper::wait_for_ready(&mut events).await;

    // Setup emitted Ready but may not have subscribed yet; the broker
    // holds the message until it does.
    broker.push(EXCHANGE, TOPIC, br#"{"id":7}"#);

    helper::wait_until("client consuming", || client.state() == SetupState::Consuming).await;

    let inbound = unwrap_delivery(helper::next_event(&mut events).await);
    assert_eq!(inbound.message["id"], 7);
}
