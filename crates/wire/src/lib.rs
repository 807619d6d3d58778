// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launcher protocol.
//!
//! Wire format: one JSON object per WebSocket text frame, discriminated by
//! its `type` field. Fields are camelCase.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod launcher;
mod wire;
mod worker;

pub use launcher::LauncherMessage;
pub use wire::{decode, encode, ProtocolError};
pub use worker::WorkerMessage;
