// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The SIGSEGV handler itself.
//!
//! Everything on this path must be async-signal-safe:
//! <https://man7.org/linux/man-pages/man7/signal-safety.7.html>
//! - write
//! - _exit
//! - backtrace / backtrace_symbols_fd (glibc extensions; both documented not
//!   to call malloc)
//! No heap allocation, no buffered output, no locks, and all storage is
//! static. A fault inside this handler has no recovery path and falls
//! through to default process termination.

use crate::handler::emitters::write_str;
use crate::handler::signal_handler_manager::{chain_to_original, host_handler_available};
use crate::handler::trace_buffer::TraceBuffer;
use crate::shared::constants::*;
use libc::{c_int, c_void, siginfo_t};
use std::ptr::addr_of_mut;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;

// Static because the handler cannot allocate; reused storage is safe because
// a fault that gets here is fatal and serviced at most once.
static mut TRACE_BUFFER: TraceBuffer = TraceBuffer::new();
static TIMES_ENTERED: AtomicU64 = AtomicU64::new(0);

/// Exit status for the no-host-handler path: marker bit plus the faulting
/// signal number in the low 7 bits.
pub(crate) const fn fault_exit_status(signum: c_int) -> c_int {
    DD_SEGVTRACE_EXIT_MARKER | signum
}

/// Responds to a segmentation fault: prints a symbolic backtrace to stderr,
/// then either hands the fault to the host's original handler or terminates
/// with the marked exit status. Never returns to the faulting code on its own
/// account; only the chained host handler can resume anything.
pub(crate) extern "C" fn handle_fault(
    signum: c_int,
    sig_info: *mut siginfo_t,
    ucontext: *mut c_void,
) {
    // One capture per process. A second entry (repeated delivery, or a fault
    // inside the capture itself once the kernel re-arms us) skips straight to
    // the disposal step instead of emitting again.
    if TIMES_ENTERED.fetch_add(1, SeqCst) == 0 {
        write_str(DD_SEGVTRACE_MSG_BANNER);
        // SAFETY: sole accessor; signal handlers for one signal number do not
        // re-enter themselves, and the guard above covers redelivery.
        let buffer = unsafe { &mut *addr_of_mut!(TRACE_BUFFER) };
        buffer.capture();
        buffer.emit(libc::STDERR_FILENO);
        write_str(DD_SEGVTRACE_MSG_TRAILER);
    }

    if host_handler_available() {
        write_str(DD_SEGVTRACE_MSG_CHAINING);
        // SAFETY: forwarding the kernel's own invocation arguments.
        unsafe { chain_to_original(signum, sig_info, ucontext) };
    } else {
        write_str(DD_SEGVTRACE_MSG_NO_HANDLER);
        // SAFETY: _exit is async-signal-safe and skips atexit handlers, which
        // must not run on a corrupted process.
        unsafe { libc::_exit(fault_exit_status(signum)) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_carries_marker_and_signal() {
        assert_eq!(fault_exit_status(libc::SIGSEGV), 139);
        assert_eq!(fault_exit_status(libc::SIGSEGV), 128 | 11);
    }

    #[test]
    fn test_exit_status_keeps_signal_in_low_bits() {
        let status = fault_exit_status(libc::SIGSEGV);
        assert_eq!(status & 0x7f, libc::SIGSEGV);
        assert_ne!(status & DD_SEGVTRACE_EXIT_MARKER, 0);
    }
}
