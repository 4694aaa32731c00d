//! Library for the http-echo test server containing its core code.
//!
//! The binary only wires CLI, telemetry and the graceful shutdown
//! around what is found here, which keeps the response shaping
//! logic testable without a socket.

#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod policy;
pub mod trace;
pub mod utils;
