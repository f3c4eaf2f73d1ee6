// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Build-time tunables. There is deliberately no runtime configuration
//! surface: the library runs inside an uncooperative process, before its
//! `main`, and later inside a signal handler.

use nix::sys::signal::Signal;

/// How long the host gets to install its own SIGSEGV handler before this
/// library's handler goes in on top of it. Must exceed the host's
/// handler-installation time; see the crate docs for the race this papers
/// over.
pub const DD_SEGVTRACE_GRACE_PERIOD_SECS: i64 = 3;

/// Signal the grace timer sends its parent to trigger handler installation.
/// SIGSYS occupies the historical SIGUNUSED slot and is assumed unused by the
/// host for its own purposes.
pub const DD_SEGVTRACE_TRIGGER_SIGNAL: Signal = Signal::SIGSYS;

/// Maximum number of return addresses captured per fault.
pub const DD_SEGVTRACE_MAX_FRAMES: usize = 64;

/// High bit set in the exit status on the no-host-handler path, so the
/// faulting signal number in the low 7 bits can't be confused with a normal
/// exit code.
pub const DD_SEGVTRACE_EXIT_MARKER: i32 = 1 << 7;

pub const DD_SEGVTRACE_MSG_BANNER: &str = "SIGSEGV received. Backtrace:\n";
pub const DD_SEGVTRACE_MSG_TRAILER: &str = "End of backtrace. ";
pub const DD_SEGVTRACE_MSG_CHAINING: &str = "Calling original SIGSEGV handler.\n";
pub const DD_SEGVTRACE_MSG_NO_HANDLER: &str = "No other SIGSEGV handler available. Quitting.\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_signal_is_not_the_fault_signal() {
        assert_ne!(DD_SEGVTRACE_TRIGGER_SIGNAL, Signal::SIGSEGV);
    }

    #[test]
    fn test_exit_marker_leaves_room_for_signal_numbers() {
        // Realtime signals end at 64 on Linux; the marker must sit above all
        // of them.
        assert_eq!(DD_SEGVTRACE_EXIT_MARKER, 128);
        assert!(DD_SEGVTRACE_EXIT_MARKER > 64);
    }

    #[test]
    fn test_frame_capacity_is_positive() {
        assert!(DD_SEGVTRACE_MAX_FRAMES > 0);
        assert!(DD_SEGVTRACE_GRACE_PERIOD_SECS > 0);
    }
}
