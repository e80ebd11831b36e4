//! HTTP/1.x protocol implementation.
//!
//! # Architecture
//!
//! - **`headers`**: Case-insensitive multi-valued header table
//! - **`buffer`**: Bounded read buffer between the socket and the parser
//! - **`request`**: Method, version and the parsed request
//! - **`parser`**: Incremental request parser fed with partial reads
//! - **`response`**: Status code table and body framing modes
//! - **`writer`**: Serializes one response, choosing Content-Length or chunked framing
//! - **`connection`**: Per-socket loop driving parse, dispatch and write
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Parse request, bounded by the read deadline
//!        └──────┬──────┘
//!               │ Request received          (malformed → 400, then Closed)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Dispatch to handler (404 if none)
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use wicket::config::Config;
//! use wicket::server::{listener, Router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut router = Router::new();
//!     router.handle_fn("/hi", |w, _req| {
//!         w.header().set("Content-Length", "3");
//!         w.write(b"hi!")?;
//!         Ok(())
//!     })?;
//!
//!     listener::run(&Config::default(), router).await
//! }
//! ```

pub mod buffer;
pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
