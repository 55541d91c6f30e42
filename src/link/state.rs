use crate::link::LinkError;
use crate::types::SiloAddress;
use tokio::sync::watch;

/// Lifecycle of one link. The peer's address is only known from `Active` onwards.
#[derive(Clone, Debug)]
pub enum LinkState {
    Connecting,
    HandshakePending,
    Active { remote: SiloAddress },
    /// Closing gracefully: queued sends are flushed, new ones are refused.
    Draining { remote: SiloAddress },
    /// `cause` is `None` for a graceful close.
    Closed { cause: Option<LinkError> },
}

impl LinkState {
    pub fn remote_address(&self) -> Option<SiloAddress> {
        match self {
            LinkState::Active { remote } | LinkState::Draining { remote } => Some(*remote),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LinkState::Active { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, LinkState::Closed { .. })
    }

    /// Whether new outbound messages are still accepted.
    pub fn accepts_sends(&self) -> bool {
        matches!(
            self,
            LinkState::Connecting | LinkState::HandshakePending | LinkState::Active { .. }
        )
    }

    fn name(&self) -> &'static str {
        match self {
            LinkState::Connecting => "Connecting",
            LinkState::HandshakePending => "HandshakePending",
            LinkState::Active { .. } => "Active",
            LinkState::Draining { .. } => "Draining",
            LinkState::Closed { .. } => "Closed",
        }
    }

    fn can_become(&self, next: &LinkState) -> bool {
        match (self, next) {
            (LinkState::Closed { .. }, _) => false,
            (_, LinkState::Closed { .. }) => true,
            (LinkState::Connecting, LinkState::HandshakePending) => true,
            (LinkState::HandshakePending, LinkState::Active { .. }) => true,
            (LinkState::Active { remote }, LinkState::Draining { remote: draining }) => remote == draining,
            _ => false,
        }
    }
}

/// Owns the current state of one link and publishes every change to the link's handles.
pub(crate) struct LinkStateMachine {
    logger: slog::Logger,
    current: LinkState,
    publisher: watch::Sender<LinkState>,
}

impl LinkStateMachine {
    pub(crate) fn new(logger: slog::Logger) -> (Self, watch::Receiver<LinkState>) {
        let (tx, rx) = watch::channel(LinkState::Connecting);
        let machine = LinkStateMachine {
            logger,
            current: LinkState::Connecting,
            publisher: tx,
        };

        (machine, rx)
    }

    pub(crate) fn begin_handshake(&mut self) -> bool {
        self.transition(LinkState::HandshakePending)
    }

    pub(crate) fn activate(&mut self, remote: SiloAddress) -> bool {
        self.transition(LinkState::Active { remote })
    }

    pub(crate) fn drain(&mut self) -> bool {
        match self.current.remote_address() {
            Some(remote) => self.transition(LinkState::Draining { remote }),
            None => false,
        }
    }

    pub(crate) fn close(&mut self, cause: Option<LinkError>) -> bool {
        self.transition(LinkState::Closed { cause })
    }

    fn transition(&mut self, next: LinkState) -> bool {
        if !self.current.can_become(&next) {
            slog::error!(
                self.logger,
                "Refusing link transition {} -> {}",
                self.current.name(),
                next.name()
            );
            return false;
        }

        slog::info!(self.logger, "Link {} -> {}", self.current.name(), next.name());
        self.current = next;
        // Nobody listening is fine; the task keeps its own copy.
        let _ = self.publisher.send(self.current.clone());
        true
    }
}
