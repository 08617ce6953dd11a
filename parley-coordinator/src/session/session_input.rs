use parley_core::SignalMessage;

/// Work the coordinator loop hands to one peer session.
#[derive(Debug)]
pub(crate) enum SessionInput {
    /// Negotiation traffic from the remote peer, already deduplicated.
    Signal(SignalMessage),
    /// Presence glare was resolved in our favour: start offering.
    Promote,
    Close,
}
