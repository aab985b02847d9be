//! The contract a broker driver fulfills. The client issues every wire-level
//! operation through these traits and never touches the network itself, so
//! an in-process driver (see [`crate::memory`]) can stand in for a real one.

use crate::config::BrokerConfig;
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;

/// Error reported by a driver operation or pushed on an error stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverError {
    pub code: u16,
    pub message: String,
}

impl DriverError {
    pub fn new(code: u16, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

impl std::error::Error for DriverError {}

/// Result of declaring a queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueInfo {
    pub queue: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

/// One message instance handed to a consumer, body bytes plus the metadata
/// the broker assigned to the delivery.
#[derive(Clone, Debug, Default)]
pub struct Delivery {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Vec<u8>,
}

/// Entry point of a driver: opens connections to a broker.
pub trait Driver: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(
        &self,
        config: &BrokerConfig,
    ) -> impl Future<Output = Result<Self::Connection, DriverError>> + Send;
}

/// A live socket-level session to the broker.
pub trait Connection: Send + Sync + 'static {
    type Channel: Channel;

    fn create_channel(&self) -> impl Future<Output = Result<Self::Channel, DriverError>> + Send;

    /// Stream of asynchronous errors of this connection. Each call replaces
    /// the previous stream; the client takes it once, for the lifetime of
    /// the connection.
    fn take_error_stream(&mut self) -> mpsc::UnboundedReceiver<DriverError>;
}

/// A logical multiplexed session over one connection, the handle every
/// protocol operation is issued on.
pub trait Channel: Send + Sync + 'static {
    /// Declare an exchange. Declaring an existing exchange with matching
    /// attributes is a no-op; conflicting attributes are an error.
    fn declare_exchange(
        &self,
        name: &str,
        kind: &str,
    ) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Declare a queue, idempotent the same way.
    fn declare_queue(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<QueueInfo, DriverError>> + Send;

    fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Subscribe to a queue. Deliveries arrive on the returned stream in
    /// the order the broker dispatches them.
    fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> impl Future<Output = Result<mpsc::UnboundedReceiver<Delivery>, DriverError>> + Send;

    fn ack(&self, delivery_tag: u64) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Publish a message. The returned flag is the driver's flow-control
    /// indicator: `false` signals backpressure, not a lost message.
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<bool, DriverError>> + Send;

    /// Stream of asynchronous errors of this channel, taken once by the
    /// client like [`Connection::take_error_stream`].
    fn take_error_stream(&mut self) -> mpsc::UnboundedReceiver<DriverError>;
}
