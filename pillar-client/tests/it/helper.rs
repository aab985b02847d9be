use pillar_client::memory::MemoryBroker;
use pillar_client::{
    BrokerClient, BrokerConfig, ClientEvent, ClientOptions, ExchangeConfig, QueueInfo,
};
use std::time::Duration;
use tokio::sync::broadcast;

pub const EXCHANGE: &str = "pillar";
pub const TOPIC: &str = "orders";

pub fn test_config() -> BrokerConfig {
    BrokerConfig {
        hostname: "localhost".to_string(),
        exchange: ExchangeConfig {
            name: EXCHANGE.to_string(),
            kind: "topic".to_string(),
        },
        ..Default::default()
    }
}

/// An in-process broker, a client bound to `orders` on it and the client's
/// event stream, subscribed before the setup task had a chance to run.
pub fn start(
    options: ClientOptions,
) -> (
    MemoryBroker,
    BrokerClient<MemoryBroker>,
    broadcast::Receiver<ClientEvent>,
) {
    let broker = MemoryBroker::new();
    let client = BrokerClient::new(broker.clone(), test_config(), TOPIC, options).unwrap();
    let events = client.subscribe();

    (broker, client, events)
}

pub async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

/// Receive events until the `Ready` event arrives, returning its payload.
pub async fn wait_for_ready(events: &mut broadcast::Receiver<ClientEvent>) -> QueueInfo {
    loop {
        if let ClientEvent::Ready(queue) = next_event(events).await {
            return queue;
        }
    }
}

/// Let the background tasks run until the condition holds.
pub async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..1000 {
        if cond() {
            return;
        }

        tokio::task::yield_now().await;
    }

    panic!("gave up waiting: {what}");
}
