//! Integration tests for job_server
//!
//! Each test starts its own engine and server in-process on 127.0.0.1
//! with an OS-assigned port and talks to it over TCP and HTTP.
//!
//! Run with: cargo test --test integration

mod helpers;

mod client;
mod command_server;
mod engine;
mod internal_server;
