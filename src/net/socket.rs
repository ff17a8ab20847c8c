//! Pre-bind socket construction.
//!
//! tokio's `bind` helpers give no hook between `socket()` and `bind()`, so
//! the options the daemon cares about (type-of-service hint, fast-open) are
//! applied on a raw `socket2` socket before it is handed to the runtime.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;

/// IPTOS_LOWDELAY: interactive traffic, prioritize latency over throughput.
pub const TOS_LOW_DELAY: u32 = 0x10;

/// Bind a stream listener with the daemon's socket options applied.
pub fn bind_stream(
    addr: SocketAddr,
    backlog: i32,
    fast_open: bool,
) -> io::Result<tokio::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    set_low_delay(&socket, addr);
    socket.bind(&addr.into())?;
    if fast_open {
        set_fast_open(&socket);
    }
    socket.listen(backlog)?;
    tokio::net::TcpListener::from_std(socket.into())
}

/// Bind a datagram socket with the daemon's socket options applied.
pub fn bind_datagram(addr: SocketAddr) -> io::Result<tokio::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    set_low_delay(&socket, addr);
    socket.bind(&addr.into())?;
    tokio::net::UdpSocket::from_std(socket.into())
}

/// Low-latency priority hint. Best effort: a refused option never fails the
/// bind.
fn set_low_delay(socket: &Socket, addr: SocketAddr) {
    if addr.is_ipv6() {
        // IPV6_TCLASS would be the equivalent; left untouched.
        return;
    }
    if let Err(e) = socket.set_tos(TOS_LOW_DELAY) {
        tracing::debug!(error = %e, "Could not set low-delay TOS");
    }
}

/// TCP fast-open server queue. Best effort, Linux only; `socket2` does not
/// expose the option.
#[cfg(target_os = "linux")]
fn set_fast_open(socket: &Socket) {
    use std::os::fd::AsRawFd;

    let qlen: libc::c_int = 5;
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_TCP,
            libc::TCP_FASTOPEN,
            &qlen as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        tracing::debug!(
            error = %io::Error::last_os_error(),
            "TCP fast-open not enabled"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn set_fast_open(_socket: &Socket) {}
