mod memory_relay;
mod message_board;
mod polling_transport;
mod signaling_transport;

pub use memory_relay::*;
pub use message_board::*;
pub use polling_transport::*;
pub use signaling_transport::*;
