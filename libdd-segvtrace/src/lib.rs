// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Produces a symbolic backtrace when SIGSEGV lands in a host process that
//! installs its own SIGSEGV handler, without modifying or recompiling the
//! host.
//!
//! The library is built as a cdylib and injected with `LD_PRELOAD`:
//!
//! 1. `LD_PRELOAD=libdd_segvtrace.so /your/binary -args...`
//! 2. An ELF constructor runs [`ddog_segvtrace_init`] before the host's
//!    `main`. It arms a handler on an auxiliary signal and forks a grace
//!    timer child.
//! 3. The child waits out the grace period, then sends the auxiliary signal
//!    back to the host and exits.
//! 4. The auxiliary-signal handler installs this library's SIGSEGV handler
//!    and keeps whatever disposition the host had registered by then.
//! 5. On a segmentation fault, the handler prints a backtrace to stderr and
//!    hands control to the host's original handler, or terminates with a
//!    marked exit status when the host never installed one.
//!
//! The grace period exists so the host's own startup gets to register its
//! SIGSEGV handler *first*; interception only works if the configured delay
//! exceeds the host's handler-installation time. A host that registers later
//! than that silently replaces this library's handler; there is no way to
//! detect it, and no handshake with the host is attempted since not touching
//! the host is the entire point. Tune the constant in `shared::constants`
//! when a host needs longer.
//!
//! The auxiliary signal is SIGSYS (the historical SIGUNUSED slot). Hosts
//! that rely on seccomp delivering SIGSYS are not supported.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![cfg(unix)]

mod handler;
mod preload;
mod shared;

pub use handler::signal_handler_manager::InstallError;
pub use preload::{ddog_segvtrace_init, init, InitError};
