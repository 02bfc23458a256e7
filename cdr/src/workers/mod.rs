//! Periodic dispatch of queue draining work.

pub mod coordinator;
pub mod pool;
pub mod route;
