//! Asynchronous single-writer storage engine.
//!
//! All store operations run on one dedicated executor thread fed by a
//! serialized FIFO task queue; callers block on a per-call result slot.
//! Because exactly one thread drains the queue, every operation observes a
//! single total order equal to enqueue order, which gives sequential
//! consistency for log writes and the configuration read without any
//! multi-writer coordination.

pub mod engine;
pub mod value;

pub use engine::{Database, StorageError};
pub use value::{Value, ValueKind};
