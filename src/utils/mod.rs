//! Injected capabilities shared by the project modules.

pub mod clock;
pub mod id;

pub use clock::{Clock, SystemClock};
pub use id::{IdGenerator, NanoIdGenerator};
