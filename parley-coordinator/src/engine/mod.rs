mod engine_event;
mod negotiation_engine;
mod rtc_engine;

pub use engine_event::*;
pub use negotiation_engine::*;
pub use rtc_engine::*;
