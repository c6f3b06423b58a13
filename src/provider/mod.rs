pub mod speech;
pub mod simulated;
pub mod types;

pub use speech::SpeechProvider;
pub use simulated::SimulatedProvider;
pub use types::*;
