mod candidate_queue;
mod peer_session;
mod session_context;
mod session_input;
mod session_state;

pub use candidate_queue::CandidateQueue;
pub(crate) use peer_session::{SessionHandle, SessionStatus, spawn_session};
pub(crate) use session_context::SessionContext;
pub(crate) use session_input::SessionInput;
pub use session_state::NegotiationState;
