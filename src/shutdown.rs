//! Cancellation and signal wiring.
//!
//! The process entry point owns one [`Shutdown`] token; the dispatch engine
//! and the storage engine receive clones and observe it in their blocking
//! wait predicates.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use anyhow::Context;
use tracing::info;

/// Cooperative cancellation token.
///
/// Cloning is cheap; all clones share the same state. [`cancel`] is
/// idempotent and wakes every thread parked in [`wait`].
///
/// [`cancel`]: Shutdown::cancel
/// [`wait`]: Shutdown::wait
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            // Taking the lock closes the window where a waiter has checked
            // the flag but not yet parked on the condvar.
            let _guard = self.inner.lock.lock().unwrap();
            self.inner.cond.notify_all();
        }
    }

    /// Blocks the calling thread until the token is cancelled.
    pub fn wait(&self) {
        let mut guard = self.inner.lock.lock().unwrap();
        while !self.is_cancelled() {
            guard = self.inner.cond.wait(guard).unwrap();
        }
    }
}

// Write end of the self-pipe shared with the signal handler. Handlers may
// only touch async-signal-safe state; write(2) qualifies.
static SIGNAL_PIPE_WR: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_signal(_signal: libc::c_int) {
    let fd = SIGNAL_PIPE_WR.load(Ordering::Relaxed);
    if fd >= 0 {
        unsafe {
            libc::write(fd, b"s".as_ptr().cast(), 1);
        }
    }
}

/// Installs SIGINT/SIGTERM handlers and returns the token they cancel.
///
/// The handler writes one byte into a pipe; a watcher thread blocks on the
/// read end and performs the actual cancellation, so nothing beyond the
/// write happens in signal context.
pub fn install_signal_handler() -> anyhow::Result<Shutdown> {
    let shutdown = Shutdown::new();

    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error()).context("failed to create signal pipe");
    }
    SIGNAL_PIPE_WR.store(fds[1], Ordering::Relaxed);

    unsafe {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }

    let read_fd = fds[0];
    let token = shutdown.clone();
    std::thread::Builder::new()
        .name("signal".into())
        .spawn(move || {
            let mut byte = [0u8; 1];
            loop {
                let n = unsafe { libc::read(read_fd, byte.as_mut_ptr().cast(), 1) };
                if n == 1 {
                    break;
                }
                let interrupted =
                    n < 0 && std::io::Error::last_os_error().kind() == std::io::ErrorKind::Interrupted;
                if !interrupted {
                    break;
                }
            }
            info!("Shutdown signal received");
            token.cancel();
        })
        .context("failed to spawn signal watcher thread")?;

    Ok(shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_observable() {
        let token = Shutdown::new();
        assert!(!token.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());

        // wait returns immediately once cancelled
        token.wait();
    }

    #[test]
    fn cancel_wakes_a_waiting_thread() {
        let token = Shutdown::new();
        let waiter = {
            let token = token.clone();
            std::thread::spawn(move || token.wait())
        };

        token.cancel();
        waiter.join().unwrap();
    }
}
