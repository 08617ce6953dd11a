use crate::engine::ConnectivityState;
use std::fmt;

/// Negotiation progress of one peer session.
///
/// ```text
/// Idle -> Offering | AwaitingOffer -> DescriptionExchanged -> IceGathering
///      -> IceChecking -> Connected -> Disconnected | Failed | Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    Offering,
    AwaitingOffer,
    DescriptionExchanged,
    IceGathering,
    IceChecking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Failed | NegotiationState::Closed)
    }

    fn rank(self) -> u8 {
        match self {
            NegotiationState::Idle => 0,
            NegotiationState::Offering | NegotiationState::AwaitingOffer => 1,
            NegotiationState::DescriptionExchanged => 2,
            NegotiationState::IceGathering => 3,
            NegotiationState::IceChecking => 4,
            NegotiationState::Connected | NegotiationState::Disconnected => 5,
            NegotiationState::Failed | NegotiationState::Closed => 6,
        }
    }

    /// Step driven by the offer/answer exchange. Never moves backwards, so an
    /// answer accepted after the engine already reported gathering leaves the
    /// session where it is.
    pub fn advance_to(self, next: NegotiationState) -> NegotiationState {
        if self.is_terminal() || next.rank() <= self.rank() {
            self
        } else {
            next
        }
    }

    /// Step driven by an engine connectivity callback.
    pub fn on_connectivity(self, reported: ConnectivityState) -> NegotiationState {
        if self.is_terminal() {
            return self;
        }
        match reported {
            ConnectivityState::IceGathering => self.advance_to(NegotiationState::IceGathering),
            ConnectivityState::IceChecking if self == NegotiationState::Disconnected => {
                NegotiationState::IceChecking
            }
            ConnectivityState::IceChecking => self.advance_to(NegotiationState::IceChecking),
            ConnectivityState::Connected => NegotiationState::Connected,
            ConnectivityState::Disconnected => NegotiationState::Disconnected,
            ConnectivityState::Failed => NegotiationState::Failed,
            ConnectivityState::Closed => NegotiationState::Closed,
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
