// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod emitters;
pub(crate) mod fault_handler;
pub(crate) mod signal_handler_manager;
pub(crate) mod trace_buffer;
