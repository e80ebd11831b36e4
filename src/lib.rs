//! Wicket - a small HTTP/1.1 server
//!
//! Incremental request parsing, response framing and keep-alive handling
//! over plain TCP.

pub mod config;
pub mod http;
pub mod server;
