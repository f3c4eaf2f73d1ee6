// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host-process fixture for the segvtrace end-to-end tests.
//!
//! The fixture plays the uncooperative host: it may install its own SIGSEGV
//! handler during startup, announces itself on stderr, outlives the grace
//! period, and then triggers a segmentation fault. Modes:
//!
//! - `with-handler`  - install a SIGSEGV handler, then fault after the
//!   holdoff; the handler reports the signal number and exits 0.
//! - `no-handler`    - fault after the holdoff with no handler installed.
//! - `early-fault`   - fault well before the grace period elapses.
//! - `late-handler`  - install the handler only after the grace period, i.e.
//!   the losing side of the installation race.
//! - `retrigger`     - re-raise the auxiliary signal after the grace period;
//!   with the trigger disposition reset, that is fatal.
//! - `wait`          - install a handler, announce, and wait forever for an
//!   externally provoked fault (manual use).

use std::time::Duration;

/// Comfortably past the preload library's 3 s grace period.
const FAULT_HOLDOFF: Duration = Duration::from_secs(5);
/// Comfortably before it.
const EARLY_FAULT: Duration = Duration::from_secs(1);

/// SIGSYS, kept in sync with the library's trigger-signal constant.
const TRIGGER_SIGNAL: libc::c_int = libc::SIGSYS;

fn main() {
    let mode = std::env::args().nth(1).unwrap_or_else(|| "wait".to_owned());
    write_stderr(b"fault_host started.\n");

    match mode.as_str() {
        "with-handler" => {
            install_host_handler();
            std::thread::sleep(FAULT_HOLDOFF);
            fault();
        }
        "no-handler" => {
            // The Rust runtime installs its own SIGSEGV handler (the
            // stack-overflow guard) during startup, so "no handler" is only
            // true once that disposition is reset back to the default.
            clear_host_handler();
            std::thread::sleep(FAULT_HOLDOFF);
            fault();
        }
        "early-fault" => {
            std::thread::sleep(EARLY_FAULT);
            fault();
        }
        "late-handler" => {
            std::thread::sleep(FAULT_HOLDOFF);
            install_host_handler();
            fault();
        }
        "retrigger" => {
            install_host_handler();
            std::thread::sleep(FAULT_HOLDOFF);
            unsafe { libc::raise(TRIGGER_SIGNAL) };
            // Only reached if something still handles the trigger signal.
            fault();
        }
        "wait" => {
            install_host_handler();
            loop {
                unsafe { libc::pause() };
            }
        }
        other => {
            eprintln!("fault_host: unknown mode {other:?}");
            std::process::exit(2);
        }
    }
}

fn install_host_handler() {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = host_segv_handler as usize as libc::sighandler_t;
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGSEGV, &action, std::ptr::null_mut()) != 0 {
            eprintln!("fault_host: failed to install SIGSEGV handler");
            std::process::exit(2);
        }
    }
}

fn clear_host_handler() {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = libc::SIG_DFL;
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGSEGV, &action, std::ptr::null_mut()) != 0 {
            eprintln!("fault_host: failed to reset SIGSEGV handler");
            std::process::exit(2);
        }
    }
}

// Handler context: raw writes and _exit only.
extern "C" fn host_segv_handler(signum: libc::c_int) {
    write_stderr(b"fault_host caught signal ");
    write_decimal(signum);
    write_stderr(b".\n");
    unsafe { libc::_exit(0) };
}

fn fault() -> ! {
    // black_box keeps the compiler from seeing (and complaining about) the
    // null dereference it exists to perform.
    let target = std::hint::black_box(std::ptr::null_mut::<u8>());
    unsafe { std::ptr::write_volatile(target, 1) };
    unreachable!("null write returned");
}

fn write_stderr(msg: &[u8]) {
    unsafe { libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len()) };
}

fn write_decimal(mut value: libc::c_int) {
    let mut digits = [0u8; 12];
    let mut at = digits.len();
    if value <= 0 {
        write_stderr(b"0");
        return;
    }
    while value > 0 {
        at -= 1;
        digits[at] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    write_stderr(&digits[at..]);
}
