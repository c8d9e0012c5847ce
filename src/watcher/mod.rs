//! Stream readiness detection

pub mod readiness;

pub use readiness::{ReadinessSignal, ReadinessWatcher, WatchTask};
