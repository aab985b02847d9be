mod consume;
mod helper;
mod publish;

use pillar_client::*;

pub fn unwrap_delivery(event: ClientEvent) -> InboundMessage {
    match event {
        ClientEvent::Delivery(inbound) => inbound,
        other => panic!("{other:?} is not a Delivery event"),
    }
}

pub fn unwrap_failure(event: ClientEvent) -> Failure {
    match event {
        ClientEvent::Failure(failure) => failure,
        other => panic!("{other:?} is not a Failure event"),
    }
}

pub fn unwrap_ready(event: ClientEvent) -> QueueInfo {
    match event {
        ClientEvent::Ready(queue) => queue,
        other => panic!("{other:?} is not a Ready event"),
    }
}
