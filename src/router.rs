//! Route table.
//!
//! One entry per registered template, holding the compiled matcher and a
//! method map. Built once at startup, then shared immutably across every
//! connection task — lookup takes no locks.
//!
//! Overlapping templates are legal (`/users/all` and `/users/:id` both
//! match `/users/all`); selection is deterministic: the template with
//! fewer parameter segments wins, ties broken by registration order.

use std::collections::HashMap;

use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::template::{CompiledPath, TemplateError};

/// One registered template with its compiled matcher and handlers.
pub(crate) struct Route {
    template: String,
    compiled: CompiledPath,
    methods: HashMap<Method, BoxedHandler>,
}

/// Outcome of a table lookup.
pub(crate) enum Lookup<'a> {
    /// Template and method both bound.
    Matched { handler: &'a BoxedHandler, compiled: &'a CompiledPath },
    /// No template matched, or the best-matching template has no handler
    /// for this method. The two cases are deliberately not distinguished.
    NotFound,
}

/// The application route table.
#[derive(Default)]
pub(crate) struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers `handler` under `(template, method)`.
    ///
    /// Registering the same pair twice overwrites the handler (last write
    /// wins). A new method under a known template joins the existing route
    /// without recompiling the matcher.
    pub fn insert(
        &mut self,
        template: &str,
        method: Method,
        handler: BoxedHandler,
    ) -> Result<(), TemplateError> {
        if let Some(route) = self.routes.iter_mut().find(|r| r.template == template) {
            route.methods.insert(method, handler);
            return Ok(());
        }

        let compiled = CompiledPath::compile(template)?;
        let mut methods = HashMap::new();
        methods.insert(method, handler);
        self.routes.push(Route { template: template.to_owned(), compiled, methods });
        Ok(())
    }

    /// Finds the route for `path`, then the handler for `method` on it.
    ///
    /// Route selection happens first and is deterministic; only then is the
    /// method map consulted. A selected route without the method falls
    /// through to `NotFound` — same answer as an unknown path.
    pub fn lookup(&self, method: Method, path: &str) -> Lookup<'_> {
        let selected = self
            .routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.compiled.matches(path))
            .min_by_key(|(idx, r)| (r.compiled.param_count(), *idx))
            .map(|(_, r)| r);

        match selected.and_then(|r| r.methods.get(&method).map(|h| (h, &r.compiled))) {
            Some((handler, compiled)) => Lookup::Matched { handler, compiled },
            None => Lookup::NotFound,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}
