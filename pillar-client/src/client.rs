use crate::config::{BrokerConfig, ClientOptions};
use crate::consumer;
use crate::driver::{Channel, Connection, Driver, DriverError};
use crate::error::{ConfigError, Failure};
use crate::event::{ClientEvent, EVENT_BUFFER};
use crate::state::{SetupState, SetupStep};
use log::{debug, error, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

pub(crate) type ConnectionOf<D> = <D as Driver>::Connection;
pub(crate) type ChannelOf<D> = <ConnectionOf<D> as Connection>::Channel;

/// State shared between the client handle, the setup task and the
/// consumption loop. The connection is parked here to keep it alive; there
/// is no explicit close, its lifetime is the lifetime of the process.
pub(crate) struct Shared<D: Driver> {
    pub(crate) state: SetupState,
    pub(crate) connection: Option<ConnectionOf<D>>,
    pub(crate) channel: Option<Arc<ChannelOf<D>>>,
}

/// Client of one exchange/queue binding on a topic broker.
///
/// Construction validates the config synchronously and then drives the
/// whole setup in the background: connect, open a channel, declare the
/// exchange, declare the queue named by the topic, bind them, and start
/// consuming when [`ClientOptions::consume`] is set. Progress and failure
/// are reported as [`ClientEvent`]s; apart from the constructor, no
/// lifecycle error is returned to a caller directly.
///
/// ```no_run
/// use pillar_client::{BrokerClient, BrokerConfig, ClientEvent, ClientOptions};
/// use pillar_client::memory::MemoryBroker;
///
/// async fn run(config: BrokerConfig) {
///     let broker = MemoryBroker::new();
///     let client = BrokerClient::new(broker, config, "orders", ClientOptions::default()).unwrap();
///     let mut events = client.subscribe();
///
///     while let Ok(event) = events.recv().await {
///         if let ClientEvent::Delivery(inbound) = event {
///             println!("got {}", inbound.message);
///         }
///     }
/// }
/// ```
pub struct BrokerClient<D: Driver> {
    pub(crate) config: BrokerConfig,
    pub(crate) topic: String,
    pub(crate) options: ClientOptions,
    pub(crate) events: broadcast::Sender<ClientEvent>,
    /// Receiver created before the setup task starts, handed out by the
    /// first `subscribe`. Without it the setup events would race the first
    /// subscriber and a broadcast without receivers drops what it sends.
    pub(crate) first_events: Mutex<Option<broadcast::Receiver<ClientEvent>>>,
    pub(crate) shared: Arc<Mutex<Shared<D>>>,
}

impl<D: Driver> BrokerClient<D> {
    /// Create a client and start connecting. Fails synchronously only when
    /// the config is unusable; every later failure arrives as a
    /// [`ClientEvent::Failure`], so attach a listener with [`subscribe`]
    /// before awaiting anything.
    ///
    /// [`subscribe`]: BrokerClient::subscribe
    pub fn new(
        driver: D,
        config: BrokerConfig,
        topic: &str,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (events, first_events) = broadcast::channel(EVENT_BUFFER);
        let shared = Arc::new(Mutex::new(Shared {
            state: SetupState::Idle,
            connection: None,
            channel: None,
        }));

        let client = Self {
            config,
            topic: topic.to_string(),
            options,
            events,
            first_events: Mutex::new(Some(first_events)),
            shared,
        };

        client.spawn_setup(driver);

        Ok(client)
    }

    /// Subscribe to the event stream. The first subscriber gets a stream
    /// which existed before the setup task started, so the `Connected`,
    /// `Ready` and setup `Failure` events are never lost to it; every
    /// later subscriber gets the events from the point of subscription on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.first_events
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SetupState {
        self.shared.lock().unwrap().state
    }

    /// The queue name the client binds to and the routing key it publishes
    /// with.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn spawn_setup(&self, driver: D) {
        let config = self.config.clone();
        let topic = self.topic.clone();
        let options = self.options;
        let events = self.events.clone();
        let shared = self.shared.clone();

        tokio::spawn(async move {
            if let Err(failure) = setup(&driver, &config, &topic, options, &events, &shared).await {
                let step = failure.step().unwrap_or(SetupStep::Connect);

                error!("setup aborted at {}: {}", step, failure);
                transition(&shared, SetupState::Failed(step));

                let _ = events.send(ClientEvent::Failure(failure));
            }
        });
    }
}

fn transition<D: Driver>(shared: &Arc<Mutex<Shared<D>>>, next: SetupState) {
    let mut shared = shared.lock().unwrap();

    debug!("lifecycle {} -> {}", shared.state, next);
    shared.state = next;
}

/// The sequential setup. Every failure returns here and is turned into a
/// single `Failure` event by the caller, the channel-level steps included.
async fn setup<D: Driver>(
    driver: &D,
    config: &BrokerConfig,
    topic: &str,
    options: ClientOptions,
    events: &broadcast::Sender<ClientEvent>,
    shared: &Arc<Mutex<Shared<D>>>,
) -> Result<(), Failure> {
    transition(shared, SetupState::Connecting);

    let mut connection = driver
        .connect(config)
        .await
        .map_err(|e| Failure::Connect(e.to_string()))?;

    spawn_error_relay(connection.take_error_stream(), events.clone(), Failure::Connection);

    let _ = events.send(ClientEvent::Connected);

    transition(shared, SetupState::ChannelOpening);

    let mut channel = connection
        .create_channel()
        .await
        .map_err(|e| Failure::Channel(e.to_string()))?;

    spawn_error_relay(channel.take_error_stream(), events.clone(), Failure::Channel);

    let channel = Arc::new(channel);

    transition(shared, SetupState::DeclaringExchange);

    channel
        .declare_exchange(&config.exchange.name, &config.exchange.kind)
        .await
        .map_err(|e| setup_failure(SetupStep::DeclareExchange, e))?;

    transition(shared, SetupState::DeclaringQueue);

    let queue = channel
        .declare_queue(topic)
        .await
        .map_err(|e| setup_failure(SetupStep::DeclareQueue, e))?;

    transition(shared, SetupState::Binding);

    channel
        .bind_queue(topic, &config.exchange.name, topic)
        .await
        .map_err(|e| setup_failure(SetupStep::BindQueue, e))?;

    {
        let mut shared = shared.lock().unwrap();

        debug!("lifecycle {} -> {}", shared.state, SetupState::Ready);
        shared.state = SetupState::Ready;
        shared.connection = Some(connection);
        shared.channel = Some(channel.clone());
    }

    let _ = events.send(ClientEvent::Ready(queue));

    if options.consume {
        let consumer_tag = format!("pillar-{}", rand::random::<u64>());

        let deliveries = channel
            .consume(topic, &consumer_tag)
            .await
            .map_err(|e| setup_failure(SetupStep::Consume, e))?;

        transition(shared, SetupState::Consuming);

        tokio::spawn(consumer::run(channel, deliveries, options, events.clone()));
    }

    Ok(())
}

fn setup_failure(step: SetupStep, e: DriverError) -> Failure {
    Failure::Setup {
        step,
        reason: e.to_string(),
    }
}

/// Forward asynchronous driver errors to the event stream for the lifetime
/// of the watched handle.
fn spawn_error_relay(
    mut errors: mpsc::UnboundedReceiver<DriverError>,
    events: broadcast::Sender<ClientEvent>,
    wrap: fn(String) -> Failure,
) {
    tokio::spawn(async move {
        while let Some(e) = errors.recv().await {
            warn!("driver reported: {}", e);

            let _ = events.send(ClientEvent::Failure(wrap(e.to_string())));
        }
    });
}
