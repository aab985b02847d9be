use anyhow::Result;
use pillar_client::memory::MemoryBroker;
use pillar_client::{BrokerClient, BrokerConfig, ClientEvent, ClientOptions, ExchangeConfig};
use serde_json::json;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let message_count = 1024u32;

    pillar_client::setup_logger();

    let broker = MemoryBroker::new();
    let config = BrokerConfig {
        hostname: "localhost".to_string(),
        exchange: ExchangeConfig {
            name: "x_pubsub".to_string(),
            kind: "topic".to_string(),
        },
        ..Default::default()
    };

    let client = BrokerClient::new(broker, config, "q_pubsub", ClientOptions::default())?;
    let mut events = client.subscribe();

    loop {
        if let ClientEvent::Ready(_) = events.recv().await? {
            break;
        }
    }

    let start = Instant::now();

    for n in 0..message_count {
        client.publish(&json!({ "seq": n })).await;

        loop {
            if let ClientEvent::Delivery(_) = events.recv().await? {
                break;
            }
        }
    }

    println!(
        "Send and receive {} messages: {:?}",
        message_count,
        Instant::elapsed(&start)
    );

    Ok(())
}
