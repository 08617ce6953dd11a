pub use parley_core::model::PeerId;

pub mod model {
    pub use parley_core::model::*;
}

#[cfg(feature = "coordinator")]
pub mod coordinator {
    pub use parley_coordinator::*;
}
