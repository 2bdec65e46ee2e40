use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

/// Owned listening socket.
///
/// `bind` performs create, bind and listen in one step; failure here is
/// fatal to server startup. Ownership semantics come from the wrapped
/// [`TcpListener`]: move-only, fd released exactly once on drop.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub fn bind(port: u16) -> io::Result<Self> {
        let inner = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        Ok(Self { inner })
    }

    /// Address actually bound, useful when `port` was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Blocks until a peer connects, returning the owned stream.
    pub fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.inner.accept()
    }

    /// Handle used to unblock a thread parked in [`Listener::accept`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            fd: self.inner.as_raw_fd(),
        }
    }
}

/// Raw-fd handle onto a [`Listener`].
///
/// Must not outlive the listener it came from. The dispatch engine joins
/// the acceptor thread, which owns the listener, only after calling
/// [`shutdown`](ShutdownHandle::shutdown).
pub struct ShutdownHandle {
    fd: RawFd,
}

impl ShutdownHandle {
    /// Issues `shutdown(2)` on the listening socket so a thread blocked in
    /// `accept` returns with an error instead of waiting forever.
    pub fn shutdown(&self) {
        unsafe {
            libc::shutdown(self.fd, libc::SHUT_RDWR);
        }
    }
}
