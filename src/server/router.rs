//! Exact-match dispatch from request targets to handlers.
//!
//! The table is filled before the listener starts and then frozen behind an
//! `Arc`, so connection tasks only ever read it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::bail;

use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// Something that can answer a request.
///
/// A handler is called once per request routed to it. Writing nothing at all
/// is allowed: the connection then sends an empty `200 OK`. Returning an
/// error before anything was written turns into a `500`.
pub trait Handler: Send + Sync {
    fn serve(&self, w: &mut ResponseWriter, req: &Request) -> anyhow::Result<()>;
}

/// Adapts a plain function or closure into a [`Handler`].
pub struct HandlerFn<F>(pub F);

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut ResponseWriter, &Request) -> anyhow::Result<()> + Send + Sync,
{
    fn serve(&self, w: &mut ResponseWriter, req: &Request) -> anyhow::Result<()> {
        (self.0)(w, req)
    }
}

#[derive(Default, Clone)]
pub struct Router {
    routes: HashMap<String, Arc<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for requests whose target equals `pattern`.
    ///
    /// A pattern can only be registered once.
    pub fn handle(
        &mut self,
        pattern: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> anyhow::Result<()> {
        let pattern = pattern.into();
        if self.routes.contains_key(&pattern) {
            bail!("handler for pattern {pattern:?} already registered");
        }
        self.routes.insert(pattern, Arc::new(handler));
        Ok(())
    }

    /// Shorthand for registering a closure.
    pub fn handle_fn<F>(&mut self, pattern: impl Into<String>, f: F) -> anyhow::Result<()>
    where
        F: Fn(&mut ResponseWriter, &Request) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handle(pattern, HandlerFn(f))
    }

    /// Looks up the handler for an exact target; no prefix or wildcard
    /// matching.
    pub fn resolve(&self, target: &str) -> Option<&dyn Handler> {
        self.routes.get(target).map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut patterns: Vec<_> = self.routes.keys().collect();
        patterns.sort();
        f.debug_struct("Router").field("patterns", &patterns).finish()
    }
}
