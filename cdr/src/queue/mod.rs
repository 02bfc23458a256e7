//! Access to the list of pending records.

mod base;
pub mod redis;

pub use base::CdrQueue;
