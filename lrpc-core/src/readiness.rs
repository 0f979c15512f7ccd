//! Non-blocking readiness polling for raw sockets.
//!
//! Grounded directly on `luarpc_socket.c`'s `transport_readable`: a
//! zero-timeout `select()` on the socket's file descriptor. `true` means a
//! read (or, for a listening socket, an `accept`) would not block; it does
//! not consume anything, unlike `TcpStream::peek`, which can't be used on a
//! listener at all.

#[cfg(unix)]
pub fn fd_readable(fd: std::os::fd::RawFd) -> std::io::Result<bool> {
    let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
    unsafe {
        libc::FD_ZERO(&mut read_fds);
        libc::FD_SET(fd, &mut read_fds);
    }
    let mut timeout = libc::timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    let ret = unsafe {
        libc::select(
            fd + 1,
            &mut read_fds,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut timeout,
        )
    };
    if ret < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(ret > 0)
    }
}

#[cfg(not(unix))]
pub fn fd_readable(_fd: i32) -> std::io::Result<bool> {
    // No portable zero-cost readiness poll without a platform socket API;
    // callers fall back to treating the transport as always readable.
    Ok(true)
}
