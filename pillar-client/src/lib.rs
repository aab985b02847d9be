mod dev;
pub use dev::setup_logger;

mod client;
pub use client::BrokerClient;

mod config;
pub use config::{BrokerConfig, ClientOptions, ExchangeConfig};

mod consumer;

mod driver;
pub use driver::{Channel, Connection, Delivery, Driver, DriverError, QueueInfo};

mod error;
pub use error::{ConfigError, Failure};

mod event;
pub use event::{ClientEvent, InboundMessage};

pub mod memory;

mod publisher;

mod state;
pub use state::{SetupState, SetupStep};
