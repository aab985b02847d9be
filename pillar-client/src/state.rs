use std::fmt;

/// The asynchronous setup step a failure is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupStep {
    Connect,
    OpenChannel,
    DeclareExchange,
    DeclareQueue,
    BindQueue,
    Consume,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStep::Connect => "connect",
            SetupStep::OpenChannel => "open-channel",
            SetupStep::DeclareExchange => "declare-exchange",
            SetupStep::DeclareQueue => "declare-queue",
            SetupStep::BindQueue => "bind-queue",
            SetupStep::Consume => "consume",
        };

        write!(f, "{}", name)
    }
}

/// Lifecycle of a client instance. Each transition is gated on the success
/// of the prior asynchronous broker operation; `Failed` is reachable from
/// every state before `Consuming` and carries the step which triggered it.
///
/// A client constructed with `consume: false` rests in `Ready`; otherwise
/// starting the consumption moves `Ready` on to `Consuming`, or to
/// `Failed(Consume)` when the subscription is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupState {
    Idle,
    Connecting,
    ChannelOpening,
    DeclaringExchange,
    DeclaringQueue,
    Binding,
    Ready,
    Consuming,
    Failed(SetupStep),
}

impl SetupState {
    /// No further transition happens out of a terminal state. `Ready` is
    /// not one: consumption start may still move out of it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SetupState::Consuming | SetupState::Failed(_))
    }
}

impl fmt::Display for SetupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupState::Idle => write!(f, "idle"),
            SetupState::Connecting => write!(f, "connecting"),
            SetupState::ChannelOpening => write!(f, "channel-opening"),
            SetupState::DeclaringExchange => write!(f, "declaring-exchange"),
            SetupState::DeclaringQueue => write!(f, "declaring-queue"),
            SetupState::Binding => write!(f, "binding"),
            SetupState::Ready => write!(f, "ready"),
            SetupState::Consuming => write!(f, "consuming"),
            SetupState::Failed(step) => write!(f, "failed at {}", step),
        }
    }
}
