use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::http::connection::Connection;
use crate::server::router::Router;
use crate::server::socket::{Listener, ShutdownHandle};
use crate::shutdown::Shutdown;
use crate::storage::Database;

/// Shared dispatch state: the connection FIFO and its wakeup machinery.
struct Shared {
    queue: Mutex<VecDeque<Connection>>,
    available: Condvar,
    running: AtomicBool,
    shutdown: Shutdown,
    router: Router,
    db: Arc<Database>,
}

impl Shared {
    fn stopping(&self) -> bool {
        !self.running.load(Ordering::SeqCst) || self.shutdown.is_cancelled()
    }
}

/// The connection dispatch engine.
///
/// One acceptor thread blocks in `accept` and pushes accepted connections
/// onto the FIFO; a fixed pool of workers pops them in arrival order and
/// processes each to completion. FIFO pop order is the only cross-worker
/// ordering guarantee.
pub struct Server {
    shared: Arc<Shared>,
    listener_shutdown: ShutdownHandle,
    local_addr: SocketAddr,
    acceptor: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Server {
    /// Binds the listening socket and starts the acceptor plus `threads`
    /// workers. A bind failure is fatal to startup.
    pub fn start(
        port: u16,
        threads: usize,
        db: Arc<Database>,
        shutdown: Shutdown,
    ) -> anyhow::Result<Self> {
        let listener = Listener::bind(port)
            .with_context(|| format!("failed to bind listening socket on port {port}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read listener address")?;
        let listener_shutdown = listener.shutdown_handle();

        if let Err(e) = db.log_system("Starting server") {
            warn!(error = %e, "Failed to record server start");
        }
        info!(addr = %local_addr, threads, "Listening");

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            running: AtomicBool::new(true),
            shutdown,
            router: Router::new(Arc::clone(&db)),
            db,
        });

        let acceptor = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("acceptor".into())
                .spawn(move || accept_loop(listener, &shared))
                .context("failed to spawn acceptor thread")?
        };

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            if let Err(e) = shared.db.log_system(&format!("Starting worker {i}")) {
                warn!(error = %e, worker = i, "Failed to record worker start");
            }
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || worker_loop(&shared))
                .context("failed to spawn worker thread")?;
            workers.push(handle);
        }

        Ok(Self {
            shared,
            listener_shutdown,
            local_addr,
            acceptor: Some(acceptor),
            workers,
        })
    }

    /// Address the listener actually bound, useful when `port` was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the engine: clears the running flag, discards queued
    /// connections unprocessed, broadcast-wakes the workers, unblocks the
    /// acceptor, then joins the acceptor followed by the workers.
    /// Idempotent.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.shared.db.log_system("Stopping server") {
            warn!(error = %e, "Failed to record server stop");
        }

        {
            let mut queue = self.shared.queue.lock().unwrap();
            if !queue.is_empty() {
                info!(discarded = queue.len(), "Discarding queued connections");
            }
            // Dropping a queued connection closes its socket; no reset
            // response is sent.
            queue.clear();
            self.shared.available.notify_all();
        }

        // Unblock the thread parked in accept.
        self.listener_shutdown.shutdown();

        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(listener: Listener, shared: &Shared) {
    while !shared.stopping() {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "Accepted connection");
                {
                    let mut queue = shared.queue.lock().unwrap();
                    queue.push_back(Connection::new(stream));
                }
                shared.available.notify_one();
            }
            Err(e) => {
                // Transient accept failures are swallowed and retried; the
                // error induced by the shutdown sequence exits through the
                // loop condition.
                if shared.stopping() {
                    break;
                }
                warn!(error = %e, "Accept failed");
            }
        }
    }
    debug!("Acceptor exiting");
}

fn worker_loop(shared: &Shared) {
    loop {
        let connection = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(connection) = queue.pop_front() {
                    break connection;
                }
                if shared.stopping() {
                    return;
                }
                queue = shared.available.wait(queue).unwrap();
            }
        };

        let peer = connection.peer_addr();
        if !shared.router.handle(connection) {
            debug!(peer = ?peer, "Request not handled");
        }
    }
}
