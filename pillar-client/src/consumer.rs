use crate::config::ClientOptions;
use crate::driver::{Channel, Delivery};
use crate::error::Failure;
use crate::event::{ClientEvent, InboundMessage};
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// The consumption loop. Runs until the driver drops the delivery stream,
/// i.e. for the lifetime of the channel.
///
/// A malformed body never ends the loop: it is reported as a `Parse`
/// failure and the delivery is acknowledged exactly like a well-formed one,
/// so it is never redelivered. Acknowledgment is the last step for every
/// delivery which entered the decode step, whatever the parse or emission
/// outcome was.
pub(crate) async fn run<C: Channel>(
    channel: Arc<C>,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    options: ClientOptions,
    events: broadcast::Sender<ClientEvent>,
) {
    while let Some(delivery) = deliveries.recv().await {
        let delivery_tag = delivery.delivery_tag;

        match serde_json::from_slice::<Value>(&delivery.body) {
            Ok(message) => {
                debug!("delivery {} on {}", delivery_tag, delivery.routing_key);

                let _ = events.send(ClientEvent::Delivery(InboundMessage::new(delivery, message)));
            }
            Err(e) => {
                warn!("delivery {} has a malformed body: {}", delivery_tag, e);

                let _ = events.send(ClientEvent::Failure(Failure::Parse(e.to_string())));
            }
        }

        // The ack is not awaited before the next delivery is accepted.
        if options.acknowledge {
            let channel = channel.clone();
            let events = events.clone();

            tokio::spawn(async move {
                if let Err(e) = channel.ack(delivery_tag).await {
                    let _ = events.send(ClientEvent::Failure(Failure::Ack(e.to_string())));
                }
            });
        }
    }

    debug!("delivery stream closed, consumption ends");
}
