// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Raw stderr emission for signal-handler context. `write(2)` only: no
//! buffering, no allocation, no locks.

use std::os::unix::io::RawFd;

/// Writes the whole message to `fd`, retrying short writes and EINTR.
/// Best-effort: any other error abandons the message, since there is nothing
/// sane to do about a failing stderr mid-crash.
pub(crate) fn write_all(fd: RawFd, msg: &[u8]) {
    let mut rest = msg;
    while !rest.is_empty() {
        // SAFETY: the pointer/length pair comes from a live slice.
        let rc = unsafe { libc::write(fd, rest.as_ptr().cast(), rest.len()) };
        if rc >= 0 {
            rest = &rest[rc as usize..];
        } else if errno::errno().0 != libc::EINTR {
            break;
        }
    }
}

pub(crate) fn write_str(msg: &str) {
    write_all(libc::STDERR_FILENO, msg.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::RawFd;

    fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn test_write_all_round_trips() {
        let (rd, wr) = pipe();
        write_all(wr, b"SIGSEGV received.");

        let mut buf = [0u8; 64];
        let n = unsafe { libc::read(rd, buf.as_mut_ptr().cast(), buf.len()) };
        assert_eq!(&buf[..n as usize], b"SIGSEGV received.");

        unsafe {
            libc::close(rd);
            libc::close(wr);
        }
    }

    #[test]
    fn test_write_all_tolerates_empty_message() {
        let (rd, wr) = pipe();
        write_all(wr, b"");
        unsafe {
            libc::close(rd);
            libc::close(wr);
        }
    }
}
