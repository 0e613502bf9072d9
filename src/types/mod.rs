//! Core data types shared across the engine

mod host;
mod result;
mod task;

pub use host::HostSlot;
pub use result::{CachedResult, ScoreValue};
pub use task::{validate_identifier, Task, CACHE_KEY_SEPARATOR};
