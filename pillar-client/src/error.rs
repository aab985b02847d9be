use crate::state::SetupStep;
use std::fmt;

/// Error of the client constructor when the broker config is absent or
/// unusable. This is the one failure which cannot travel on the event
/// stream, no listener can be attached before construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// A runtime failure of the client, reported on the event stream instead of
/// being returned to a caller. None of these are retried by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// The initial connect to the broker failed.
    Connect(String),
    /// The established connection reported an asynchronous error.
    Connection(String),
    /// Channel creation failed, the channel reported an asynchronous error
    /// or a publish was refused by the driver.
    Channel(String),
    /// One of the sequential setup steps failed; the steps after it were
    /// not attempted.
    Setup { step: SetupStep, reason: String },
    /// An inbound message body was not well-formed JSON. The delivery is
    /// still acknowledged.
    Parse(String),
    /// An outbound message could not be serialized; nothing was published.
    Encode(String),
    /// Publish was called before the channel existed. The caller may retry
    /// after setup finished.
    NotReady,
    /// Acknowledging a delivery failed, the channel is no longer usable.
    Ack(String),
}

impl Failure {
    /// The lifecycle step a setup-time failure aborted, when there is one.
    pub fn step(&self) -> Option<SetupStep> {
        match self {
            Failure::Connect(_) | Failure::Connection(_) => Some(SetupStep::Connect),
            Failure::Channel(_) => Some(SetupStep::OpenChannel),
            Failure::Setup { step, .. } => Some(*step),
            Failure::Parse(_) | Failure::Encode(_) | Failure::NotReady | Failure::Ack(_) => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Connect(reason) => write!(f, "connect failed: {}", reason),
            Failure::Connection(reason) => write!(f, "connection error: {}", reason),
            Failure::Channel(reason) => write!(f, "channel error: {}", reason),
            Failure::Setup { step, reason } => write!(f, "setup failed at {}: {}", step, reason),
            Failure::Parse(reason) => write!(f, "malformed message body: {}", reason),
            Failure::Encode(reason) => write!(f, "unserializable message: {}", reason),
            Failure::NotReady => write!(f, "publish before the channel exists"),
            Failure::Ack(reason) => write!(f, "ack failed: {}", reason),
        }
    }
}

impl std::error::Error for Failure {}
