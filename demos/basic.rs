use anyhow::Result;
use pillar_client::memory::MemoryBroker;
use pillar_client::{BrokerClient, BrokerConfig, ClientEvent, ClientOptions, ExchangeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    pillar_client::setup_logger();

    let broker = MemoryBroker::new();
    let config = BrokerConfig {
        hostname: "localhost".to_string(),
        exchange: ExchangeConfig {
            name: "pillar".to_string(),
            kind: "topic".to_string(),
        },
        ..Default::default()
    };

    let client = BrokerClient::new(broker.clone(), config, "orders", ClientOptions::default())?;
    let mut events = client.subscribe();

    loop {
        match events.recv().await? {
            ClientEvent::Connected => println!("connected"),
            ClientEvent::Ready(queue) => {
                println!("bound queue {:?}", queue);

                broker.push("pillar", "orders", br#"{"id": 1, "item": "book"}"#);
            }
            ClientEvent::Delivery(inbound) => {
                println!("order arrived: {}", inbound.message);
                break;
            }
            ClientEvent::Failure(failure) => {
                eprintln!("failure: {}", failure);
                break;
            }
            other => println!("event: {:?}", other),
        }
    }

    Ok(())
}
