pub mod abort_signal;
pub mod secrets;

pub use abort_signal::AbortHandle;
