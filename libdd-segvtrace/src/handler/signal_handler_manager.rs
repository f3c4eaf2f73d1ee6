// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delayed installation of the fault handler.
//!
//! The trigger handler below runs when the grace timer's auxiliary signal
//! arrives, i.e. after the host has (presumably) finished registering its own
//! SIGSEGV handler. Registering the trigger with `SA_RESETHAND` makes the
//! kernel restore the default disposition before the handler runs, so a stray
//! second delivery of the auxiliary signal can never re-trigger installation.

use crate::handler::fault_handler::handle_fault;
use crate::shared::constants::DD_SEGVTRACE_TRIGGER_SIGNAL;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use thiserror::Error;

// The host's previous SIGSEGV disposition. Written exactly once, by the
// trigger handler; read only by the fault handler. No lock is needed: both
// handlers run on whichever thread the kernel picked, strictly after the
// write is published through `ORIGINAL_STORED`, and signal delivery never
// interleaves the two stores.
static mut ORIGINAL_SEGV_ACTION: Option<SigAction> = None;
static ORIGINAL_STORED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to register the trigger-signal handler: {0}")]
    TriggerRegistration(nix::Error),
}

/// Arms the Installation Trigger on the auxiliary signal.
///
/// `SA_RESETHAND` gives the exactly-once guarantee; `SA_RESTART` keeps the
/// host's interrupted syscalls transparent to the host.
pub(crate) fn register_trigger_handler() -> Result<(), InstallError> {
    let action = SigAction::new(
        SigHandler::Handler(handle_trigger),
        SaFlags::SA_RESETHAND | SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: handle_trigger only calls sigaction, which is async-signal-safe.
    unsafe { signal::sigaction(DD_SEGVTRACE_TRIGGER_SIGNAL, &action) }
        .map(drop)
        .map_err(InstallError::TriggerRegistration)
}

extern "C" fn handle_trigger(_signum: libc::c_int) {
    install_fault_handler();
}

/// Swaps the fault handler in as the SIGSEGV disposition and keeps whatever
/// the host had registered there. One `sigaction` call does both the read and
/// the write, so there is no window where SIGSEGV has neither the host's
/// handler nor ours.
pub(crate) fn install_fault_handler() {
    let action = SigAction::new(
        SigHandler::SigAction(handle_fault),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: sigaction is async-signal-safe, and handle_fault upholds the
    // constraints documented in fault_handler.rs.
    if let Ok(previous) = unsafe { signal::sigaction(Signal::SIGSEGV, &action) } {
        // SAFETY: single writer: the trigger fires at most once
        // (SA_RESETHAND) and nothing else touches this slot.
        unsafe { ORIGINAL_SEGV_ACTION = Some(previous) };
        ORIGINAL_STORED.store(true, SeqCst);
    }
    // On registration failure SIGSEGV keeps the host's disposition and
    // interception silently degrades to nothing.
}

/// True when `handler` is a host-installed entry point rather than one of the
/// two kernel sentinels.
pub(crate) fn is_concrete_handler(handler: &SigHandler) -> bool {
    matches!(handler, SigHandler::Handler(_) | SigHandler::SigAction(_))
}

/// Whether the fault handler has a real host handler to hand the fault to.
pub(crate) fn host_handler_available() -> bool {
    if !ORIGINAL_STORED.load(SeqCst) {
        return false;
    }
    // SAFETY: published by the store above; never written again.
    match unsafe { ORIGINAL_SEGV_ACTION } {
        Some(action) => is_concrete_handler(&action.handler()),
        None => false,
    }
}

/// Invokes the host's original handler with the fault's own siginfo and
/// context. The host owns everything that happens from here on, including
/// further crashes, recovery, or a re-raise.
///
/// # Safety
/// Must only be called from the fault handler, with the pointers the kernel
/// passed it, and only after [`host_handler_available`] returned true.
pub(crate) unsafe fn chain_to_original(
    signum: libc::c_int,
    sig_info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    if !ORIGINAL_STORED.load(SeqCst) {
        return;
    }
    // SAFETY: published, then immutable.
    let original = unsafe { ORIGINAL_SEGV_ACTION };
    match original.map(|action| action.handler()) {
        Some(SigHandler::Handler(f)) => f(signum),
        Some(SigHandler::SigAction(f)) => f(signum, sig_info, ucontext),
        // Sentinels and the never-stored case are the caller's terminate
        // path; nothing to do here.
        Some(SigHandler::SigDfl) | Some(SigHandler::SigIgn) | None => (),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static HOST_HANDLER_HITS: AtomicU32 = AtomicU32::new(0);

    extern "C" fn host_segv_handler(_signum: libc::c_int) {
        HOST_HANDLER_HITS.fetch_add(1, Ordering::SeqCst);
    }

    fn read_disposition(signum: libc::c_int) -> libc::sigaction {
        let mut current: libc::sigaction = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::sigaction(signum, std::ptr::null(), &mut current) };
        assert_eq!(rc, 0);
        current
    }

    #[test]
    fn test_classification_of_dispositions() {
        assert!(!is_concrete_handler(&SigHandler::SigDfl));
        assert!(!is_concrete_handler(&SigHandler::SigIgn));
        assert!(is_concrete_handler(&SigHandler::Handler(host_segv_handler)));
        assert!(is_concrete_handler(&SigHandler::SigAction(handle_fault_stub)));
    }

    extern "C" fn handle_fault_stub(
        _signum: libc::c_int,
        _sig_info: *mut libc::siginfo_t,
        _ucontext: *mut libc::c_void,
    ) {
    }

    // One combined test: the pieces share process-wide signal dispositions
    // and the write-once original-handler slot, so ordering matters.
    #[test]
    fn test_trigger_installs_once_and_resets_itself() -> anyhow::Result<()> {
        assert!(!host_handler_available());

        // Play the host: register a handler for SIGSEGV before the trigger
        // fires.
        let host_action = SigAction::new(
            SigHandler::Handler(host_segv_handler),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe { signal::sigaction(Signal::SIGSEGV, &host_action) }?;

        register_trigger_handler()?;
        signal::raise(DD_SEGVTRACE_TRIGGER_SIGNAL)?;

        // The trigger ran: the host handler was captured for chaining...
        assert!(host_handler_available());

        // ...SIGSEGV now points at the fault handler...
        let segv = read_disposition(libc::SIGSEGV);
        assert_eq!(segv.sa_sigaction, handle_fault_address());
        assert_ne!(segv.sa_flags & libc::SA_SIGINFO, 0);

        // ...and the auxiliary signal is back to its default disposition, so
        // a second delivery cannot re-trigger installation.
        let trigger = read_disposition(DD_SEGVTRACE_TRIGGER_SIGNAL as libc::c_int);
        assert_eq!(trigger.sa_sigaction, libc::SIG_DFL);

        // Chaining invokes the captured host handler with the signal number.
        unsafe {
            chain_to_original(
                libc::SIGSEGV,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(HOST_HANDLER_HITS.load(Ordering::SeqCst), 1);

        // Put SIGSEGV back so the rest of the test binary runs undisturbed.
        let default_action =
            SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        unsafe { signal::sigaction(Signal::SIGSEGV, &default_action) }?;
        Ok(())
    }

    fn handle_fault_address() -> libc::sighandler_t {
        crate::handler::fault_handler::handle_fault as usize as libc::sighandler_t
    }
}
