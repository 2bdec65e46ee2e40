//! Connection dispatch engine.
//!
//! One acceptor thread blocks in `accept` and feeds accepted connections
//! into a FIFO guarded by a mutex and condition variable. A fixed pool of
//! worker threads pops connections in arrival order and processes each to
//! completion: one request/response cycle, no keep-alive, one worker
//! occupied per in-flight connection.
//!
//! - **`socket`**: owned listening socket and the handle that unblocks a
//!   parked accept during shutdown
//! - **`dispatch`**: the acceptor/worker-pool engine itself
//! - **`router`**: request parsing, access logging and path dispatch

pub mod dispatch;
pub mod router;
pub mod socket;

pub use dispatch::Server;
