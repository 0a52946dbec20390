//! Shared types for the Frog Pool game server.
//!
//! - [`objects`]: JSON request/response bodies and WebSocket frames.
//! - [`session`]: bearer session tokens used by the HTTP and WebSocket APIs.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod objects;
pub mod session;
