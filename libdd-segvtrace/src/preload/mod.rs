// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Load-time bootstrap: the ELF constructor, the once-guard, and the fork of
//! the grace timer.

pub(crate) mod grace_timer;

use crate::handler::signal_handler_manager::{register_trigger_handler, InstallError};
use nix::unistd::{fork, ForkResult};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use thiserror::Error;

static INIT_STARTED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum InitError {
    #[error("segvtrace was already initialized")]
    AlreadyInitialized,
    #[error("segvtrace is disabled by DD_SEGVTRACE_ENABLED")]
    Disabled,
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("failed to fork the grace timer: {0}")]
    TimerFork(nix::Error),
}

/// Bootstraps fault interception: arms the Installation Trigger on the
/// auxiliary signal, then forks the grace timer child. Runs once; later
/// calls return [`InitError::AlreadyInitialized`].
///
/// Interception is best-effort instrumentation. Callers that don't care why
/// setup failed can ignore the error; the host starts unaffected either way,
/// it just gets no backtrace on a fault.
pub fn init() -> Result<(), InitError> {
    if INIT_STARTED
        .compare_exchange(false, true, SeqCst, SeqCst)
        .is_err()
    {
        return Err(InitError::AlreadyInitialized);
    }
    if disabled_by_env() {
        return Err(InitError::Disabled);
    }
    register_trigger_handler()?;
    spawn_grace_timer()
}

/// C entry point, and the target of the ELF constructor below. Absorbs every
/// failure: this runs as a side effect of being mapped into an arbitrary
/// process, which must never be prevented from starting.
///
/// # Safety
/// No preconditions; safe to call more than once.
#[no_mangle]
pub extern "C" fn ddog_segvtrace_init() {
    let _ = init();
}

// glibc runs `.init_array` entries as soon as the object is mapped; for an
// LD_PRELOADed library, before the host's main and usually before the host's
// own constructors get a chance to touch signal state. Compiled out of test
// builds so the unit-test binary does not arm the protocol against itself.
#[cfg(all(target_os = "linux", not(test)))]
#[link_section = ".init_array"]
#[used]
static DDOG_SEGVTRACE_CTOR: extern "C" fn() = {
    extern "C" fn ctor() {
        ddog_segvtrace_init();
    }
    ctor
};

/// `DD_SEGVTRACE_ENABLED=0` (or `false`) turns the whole library into a
/// no-op. Read through `getenv` because this can run before `main`, where
/// the std environment wrappers have not been exercised yet.
fn disabled_by_env() -> bool {
    // SAFETY: NUL-terminated literal; nothing calls setenv this early in the
    // process's life.
    let value = unsafe { libc::getenv(c"DD_SEGVTRACE_ENABLED".as_ptr()) };
    if value.is_null() {
        return false;
    }
    // SAFETY: getenv returned a live NUL-terminated string.
    let value = unsafe { std::ffi::CStr::from_ptr(value) }.to_bytes();
    value == b"0" || value.eq_ignore_ascii_case(b"false")
}

fn spawn_grace_timer() -> Result<(), InitError> {
    // The child signals this exact pid; getppid after the fork could race
    // with the parent dying and the child being reparented.
    let parent = nix::unistd::getpid();
    // SAFETY: the child calls only async-signal-safe functions before _exit,
    // and at constructor time the host cannot have spawned threads yet.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => grace_timer::run_grace_timer(parent),
        Ok(ForkResult::Parent { .. }) => Ok(()),
        Err(e) => Err(InitError::TimerFork(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_switch_parsing() {
        assert!(!disabled_by_env());

        std::env::set_var("DD_SEGVTRACE_ENABLED", "0");
        assert!(disabled_by_env());

        std::env::set_var("DD_SEGVTRACE_ENABLED", "false");
        assert!(disabled_by_env());

        std::env::set_var("DD_SEGVTRACE_ENABLED", "FALSE");
        assert!(disabled_by_env());

        std::env::set_var("DD_SEGVTRACE_ENABLED", "1");
        assert!(!disabled_by_env());

        std::env::remove_var("DD_SEGVTRACE_ENABLED");
        assert!(!disabled_by_env());
    }
}
