//! An in-process driver. It keeps exchanges, queues and bindings in plain
//! maps, routes on exact routing-key match and records every call, which
//! makes it the broker the demos and the integration tests run against.
//! Faults can be injected per operation and asynchronous connection or
//! channel errors can be raised from the outside.

use crate::config::BrokerConfig;
use crate::driver::{Channel, Connection, Delivery, Driver, DriverError, QueueInfo};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// The driver operations, used for call recording and fault injection.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BrokerOp {
    Connect,
    OpenChannel,
    DeclareExchange,
    DeclareQueue,
    BindQueue,
    Consume,
    Ack,
    Publish,
}

#[derive(Default)]
struct BrokerState {
    connects: u32,
    connected_urls: Vec<String>,
    calls: Vec<BrokerOp>,
    /// Exchange name to exchange type.
    exchanges: HashMap<String, String>,
    /// Queue name to deliveries waiting for a consumer.
    queues: HashMap<String, Vec<Delivery>>,
    /// (queue, exchange, routing key) triples.
    bindings: Vec<(String, String, String)>,
    /// Queue name to the consumer tag and sink of its consumer.
    consumers: HashMap<String, (String, mpsc::UnboundedSender<Delivery>)>,
    acked: Vec<u64>,
    published: Vec<(String, String, Vec<u8>)>,
    next_delivery_tag: u64,
    faults: HashMap<BrokerOp, DriverError>,
    backpressure: bool,
    connection_errors: Option<mpsc::UnboundedSender<DriverError>>,
    channel_errors: Option<mpsc::UnboundedSender<DriverError>>,
}

impl BrokerState {
    fn check_fault(&mut self, op: BrokerOp) -> Result<(), DriverError> {
        self.calls.push(op);

        match self.faults.get(&op) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn route(&mut self, exchange: &str, routing_key: &str, body: Vec<u8>) {
        let targets = self
            .bindings
            .iter()
            .filter(|(_, x, key)| x == exchange && key == routing_key)
            .map(|(queue, _, _)| queue.clone())
            .collect::<Vec<_>>();

        for queue in targets {
            self.next_delivery_tag += 1;

            let consumer_tag = self
                .consumers
                .get(&queue)
                .map(|(tag, _)| tag.clone())
                .unwrap_or_default();

            let delivery = Delivery {
                consumer_tag,
                delivery_tag: self.next_delivery_tag,
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                redelivered: false,
                body: body.clone(),
            };

            match self.consumers.get(&queue) {
                Some((_, sink)) if sink.send(delivery.clone()).is_ok() => (),
                _ => self.queues.entry(queue).or_default().push(delivery),
            }
        }
    }
}

/// Handle of the in-process broker. Cloning shares the broker; one clone is
/// handed to the client as its driver, another stays with the test or demo
/// to push messages and inspect what happened.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make one operation fail with the given reply code and text.
    pub fn fail_with(&self, op: BrokerOp, code: u16, message: &str) {
        self.state
            .lock()
            .unwrap()
            .faults
            .insert(op, DriverError::new(code, message));
    }

    /// Route a message into the broker as if another client published it.
    pub fn push(&self, exchange: &str, routing_key: &str, body: &[u8]) {
        self.state.lock().unwrap().route(exchange, routing_key, body.to_vec());
    }

    /// Pre-create an exchange, e.g. one with attributes conflicting with
    /// what the client will declare.
    pub fn seed_exchange(&self, name: &str, kind: &str) {
        self.state
            .lock()
            .unwrap()
            .exchanges
            .insert(name.to_string(), kind.to_string());
    }

    /// Raise an asynchronous error on the connection error stream.
    pub fn break_connection(&self, message: &str) {
        if let Some(tx) = &self.state.lock().unwrap().connection_errors {
            let _ = tx.send(DriverError::new(320, message));
        }
    }

    /// Raise an asynchronous error on the channel error stream.
    pub fn break_channel(&self, message: &str) {
        if let Some(tx) = &self.state.lock().unwrap().channel_errors {
            let _ = tx.send(DriverError::new(504, message));
        }
    }

    /// Signal backpressure on subsequent publishes.
    pub fn set_backpressure(&self, on: bool) {
        self.state.lock().unwrap().backpressure = on;
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub fn connected_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().connected_urls.clone()
    }

    pub fn calls(&self) -> Vec<BrokerOp> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn acked(&self) -> Vec<u64> {
        self.state.lock().unwrap().acked.clone()
    }

    pub fn published(&self) -> Vec<(String, String, Vec<u8>)> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn exchange_kind(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().exchanges.get(name).cloned()
    }

    pub fn has_binding(&self, queue: &str, exchange: &str, routing_key: &str) -> bool {
        self.state.lock().unwrap().bindings.contains(&(
            queue.to_string(),
            exchange.to_string(),
            routing_key.to_string(),
        ))
    }
}

pub struct MemoryConnection {
    state: Arc<Mutex<BrokerState>>,
}

pub struct MemoryChannel {
    state: Arc<Mutex<BrokerState>>,
}

impl Driver for MemoryBroker {
    type Connection = MemoryConnection;

    async fn connect(&self, config: &BrokerConfig) -> Result<MemoryConnection, DriverError> {
        let url = config
            .url()
            .map_err(|e| DriverError::new(402, &e.to_string()))?;

        let mut state = self.state.lock().unwrap();

        state.connects += 1;
        state.check_fault(BrokerOp::Connect)?;
        state.connected_urls.push(url.to_string());

        Ok(MemoryConnection {
            state: self.state.clone(),
        })
    }
}

impl Connection for MemoryConnection {
    type Channel = MemoryChannel;

    async fn create_channel(&self) -> Result<MemoryChannel, DriverError> {
        self.state.lock().unwrap().check_fault(BrokerOp::OpenChannel)?;

        Ok(MemoryChannel {
            state: self.state.clone(),
        })
    }

    fn take_error_stream(&mut self) -> mpsc::UnboundedReceiver<DriverError> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.state.lock().unwrap().connection_errors = Some(tx);

        rx
    }
}

impl Channel for MemoryChannel {
    async fn declare_exchange(&self, name: &str, kind: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();

        state.check_fault(BrokerOp::DeclareExchange)?;

        match state.exchanges.get(name) {
            Some(existing) if existing != kind => Err(DriverError::new(
                406,
                &format!("PRECONDITION_FAILED - exchange '{}' is of type '{}'", name, existing),
            )),
            _ => {
                state.exchanges.insert(name.to_string(), kind.to_string());

                Ok(())
            }
        }
    }

    async fn declare_queue(&self, name: &str) -> Result<QueueInfo, DriverError> {
        let mut state = self.state.lock().unwrap();

        state.check_fault(BrokerOp::DeclareQueue)?;

        let pending = state.queues.entry(name.to_string()).or_default().len();

        Ok(QueueInfo {
            queue: name.to_string(),
            message_count: pending as u32,
            consumer_count: state.consumers.contains_key(name) as u32,
        })
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();

        state.check_fault(BrokerOp::BindQueue)?;

        if !state.queues.contains_key(queue) {
            return Err(DriverError::new(404, &format!("NOT_FOUND - no queue '{}'", queue)));
        }

        if !state.exchanges.contains_key(exchange) {
            return Err(DriverError::new(404, &format!("NOT_FOUND - no exchange '{}'", exchange)));
        }

        let binding = (queue.to_string(), exchange.to_string(), routing_key.to_string());

        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }

        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<mpsc::UnboundedReceiver<Delivery>, DriverError> {
        let mut state = self.state.lock().unwrap();

        state.check_fault(BrokerOp::Consume)?;

        if !state.queues.contains_key(queue) {
            return Err(DriverError::new(404, &format!("NOT_FOUND - no queue '{}'", queue)));
        }

        let (tx, rx) = mpsc::unbounded_channel();

        // Deliveries which arrived before the consumer.
        for mut delivery in state.queues.entry(queue.to_string()).or_default().drain(..) {
            delivery.consumer_tag = consumer_tag.to_string();

            let _ = tx.send(delivery);
        }

        state
            .consumers
            .insert(queue.to_string(), (consumer_tag.to_string(), tx));

        Ok(rx)
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();

        state.check_fault(BrokerOp::Ack)?;
        state.acked.push(delivery_tag);

        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: Vec<u8>) -> Result<bool, DriverError> {
        let mut state = self.state.lock().unwrap();

        state.check_fault(BrokerOp::Publish)?;
        state
            .published
            .push((exchange.to_string(), routing_key.to_string(), body.clone()));
        state.route(exchange, routing_key, body);

        Ok(!state.backpressure)
    }

    fn take_error_stream(&mut self) -> mpsc::UnboundedReceiver<DriverError> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.state.lock().unwrap().channel_errors = Some(tx);

        rx
    }
}
