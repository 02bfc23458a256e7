//! In-memory collaborators and fixtures for exercising the pipeline without Redis or
//! Postgres.

pub mod fixtures;
pub mod memory_queue;
pub mod memory_store;
