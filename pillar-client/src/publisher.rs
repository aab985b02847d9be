use crate::client::BrokerClient;
use crate::driver::{Channel, Driver};
use crate::error::Failure;
use crate::event::ClientEvent;
use log::{debug, warn};
use serde::Serialize;

impl<D: Driver> BrokerClient<D> {
    /// Publish a message to the configured exchange with the topic as
    /// routing key.
    ///
    /// Returns `false` without touching the driver when the channel does
    /// not exist yet, reporting a `NotReady` failure; the caller may retry
    /// once setup finished. On success a [`ClientEvent::Published`] event
    /// carries the driver's flow-control indicator together with the
    /// payload; backpressure is only surfaced there, nothing is queued or
    /// retried internally.
    pub async fn publish<T: Serialize>(&self, message: &T) -> bool {
        let channel = self.shared.lock().unwrap().channel.clone();

        let Some(channel) = channel else {
            warn!("publish before the channel exists");

            let _ = self.events.send(ClientEvent::Failure(Failure::NotReady));

            return false;
        };

        let body = match serde_json::to_value(message) {
            Ok(body) => body,
            Err(e) => {
                let _ = self.events.send(ClientEvent::Failure(Failure::Encode(e.to_string())));

                return false;
            }
        };

        let bytes = body.to_string().into_bytes();

        match channel
            .publish(&self.config.exchange.name, &self.topic, bytes)
            .await
        {
            Ok(accepted) => {
                debug!("published to {}/{}, accepted: {}", self.config.exchange.name, self.topic, accepted);

                let _ = self.events.send(ClientEvent::Published { accepted, body });

                true
            }
            Err(e) => {
                let _ = self.events.send(ClientEvent::Failure(Failure::Channel(e.to_string())));

                false
            }
        }
    }
}
