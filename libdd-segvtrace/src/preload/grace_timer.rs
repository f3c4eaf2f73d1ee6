// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The grace timer child process.
//!
//! A forked child is used instead of an in-process timer on purpose: alarm(2)
//! and the POSIX timer slots belong to the host, which may already be using
//! them. A child that sleeps and sends one signal leaves every piece of host
//! state alone. The child touches nothing but the clock before `_exit`, so
//! fork-safety is not a concern even if the host is odd about it.

use crate::shared::constants::{DD_SEGVTRACE_GRACE_PERIOD_SECS, DD_SEGVTRACE_TRIGGER_SIGNAL};
use nix::sys::signal::kill;
use nix::time::{clock_gettime, ClockId};
use nix::unistd::Pid;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Waits out the grace period, pokes the parent exactly once, and leaves.
/// Reaping the resulting zombie is the host's business, if it cares.
pub(crate) fn run_grace_timer(parent: Pid) -> ! {
    sleep_grace_period();
    // A failure here means the parent is already gone; nothing to trigger.
    let _ = kill(parent, DD_SEGVTRACE_TRIGGER_SIGNAL);
    // SAFETY: exits the forked child without running the host's atexit
    // handlers, which belong to the parent.
    unsafe { libc::_exit(0) }
}

/// Deadline loop on the monotonic clock. nanosleep can wake early on EINTR;
/// the remaining time is recomputed from the clock on every pass rather than
/// trusting a single sleep call.
fn sleep_grace_period() {
    let deadline =
        now_nanos().saturating_add(DD_SEGVTRACE_GRACE_PERIOD_SECS.saturating_mul(NANOS_PER_SEC));
    loop {
        let remaining = remaining_nanos(deadline, now_nanos());
        if remaining == 0 {
            return;
        }
        let request = libc::timespec {
            tv_sec: (remaining / NANOS_PER_SEC) as libc::time_t,
            tv_nsec: (remaining % NANOS_PER_SEC) as libc::c_long,
        };
        // SAFETY: request is a live timespec; the remainder out-param is
        // unused because the clock is re-read on the next pass.
        unsafe { libc::nanosleep(&request, std::ptr::null_mut()) };
    }
}

fn now_nanos() -> i64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => (ts.tv_sec() as i64)
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(ts.tv_nsec() as i64),
        // A broken monotonic clock leaves no sane way to wait; trigger
        // immediately rather than spin.
        Err(_) => i64::MAX,
    }
}

/// Time left until `deadline`, clamped at zero.
fn remaining_nanos(deadline: i64, now: i64) -> i64 {
    (deadline.saturating_sub(now)).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_counts_down() {
        assert_eq!(remaining_nanos(10 * NANOS_PER_SEC, 7 * NANOS_PER_SEC), 3 * NANOS_PER_SEC);
        assert_eq!(remaining_nanos(10, 10), 0);
    }

    #[test]
    fn test_remaining_clamps_past_deadlines_to_zero() {
        assert_eq!(remaining_nanos(5, 9), 0);
        assert_eq!(remaining_nanos(i64::MIN, i64::MAX), 0);
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
        assert!(a < i64::MAX);
    }
}
