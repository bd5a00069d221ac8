//! Library surface for `persona-gateway`. `main.rs` is a thin binary wrapper
//! around this crate so that `tests/` (§8 "a handful of `tokio::test`
//! integration-style tests ... exercising the in-process broker + sled
//! repository end to end") can exercise dispatch, the worker runtime, and the
//! HTTP router the same way the binary wires them.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod termination;
pub mod worker;
