//! Socket acceptance and request dispatch.

pub mod listener;
pub mod router;

pub use router::{Handler, HandlerFn, Router};
