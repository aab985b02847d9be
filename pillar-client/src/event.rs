use crate::driver::{Delivery, QueueInfo};
use crate::error::Failure;
use serde_json::Value;

/// Capacity of the broadcast event stream. A listener which lags behind by
/// more than this many events observes a `Lagged` error from its receiver.
pub(crate) const EVENT_BUFFER: usize = 128;

/// An inbound delivery whose body was successfully decoded. All broker
/// metadata of the original delivery is preserved next to the parsed
/// `message`.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Vec<u8>,
    pub message: Value,
}

impl InboundMessage {
    pub(crate) fn new(delivery: Delivery, message: Value) -> Self {
        Self {
            consumer_tag: delivery.consumer_tag,
            delivery_tag: delivery.delivery_tag,
            exchange: delivery.exchange,
            routing_key: delivery.routing_key,
            redelivered: delivery.redelivered,
            body: delivery.body,
            message,
        }
    }
}

/// Everything a client reports, success and failure alike, delivered on a
/// single multi-consumer stream obtained from [`crate::BrokerClient::subscribe`].
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// The broker connection is established.
    Connected,
    /// Exchange declared, queue declared and bound; carries the
    /// queue-declare result.
    Ready(QueueInfo),
    /// An inbound delivery with a well-formed body.
    Delivery(InboundMessage),
    /// A publish went out; `accepted` is the driver's flow-control
    /// indicator and `body` the published payload for traceability.
    Published { accepted: bool, body: Value },
    /// Any runtime error of the client.
    Failure(Failure),
}
