//! Route table and lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Routes are sorted once by specificity; first match wins
//! - Duplicate patterns are rejected at insert time

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::handlers::Handler;
use crate::routing::matcher::RoutePattern;

/// A pattern bound to a handler.
#[derive(Clone)]
pub struct Route {
    pattern: RoutePattern,
    handler: Arc<dyn Handler>,
    source: Option<PathBuf>,
}

impl Route {
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Descriptor file this route came from; `None` for code-registered routes.
    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.to_string())
            .field("handler", &self.handler)
            .field("source", &self.source)
            .finish()
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

/// Two routes claimed the same pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pattern {0} is already registered")]
pub struct RouteConflict(pub String);

/// Immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn lookup(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route
                .pattern
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

/// Accumulates routes before freezing them into a [`RouteTable`].
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    pub fn contains(&self, pattern: &RoutePattern) -> bool {
        self.routes.iter().any(|r| &r.pattern == pattern)
    }

    pub fn insert(
        &mut self,
        pattern: RoutePattern,
        handler: Arc<dyn Handler>,
        source: Option<PathBuf>,
    ) -> Result<(), RouteConflict> {
        if self.contains(&pattern) {
            return Err(RouteConflict(pattern.to_string()));
        }
        self.routes.push(Route {
            pattern,
            handler,
            source,
        });
        Ok(())
    }

    pub fn build(mut self) -> RouteTable {
        self.routes
            .sort_by(|a, b| a.pattern.specificity_cmp(&b.pattern));
        RouteTable {
            routes: self.routes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::static_json::StaticHandler;

    fn handler(body: &str) -> Arc<dyn Handler> {
        Arc::new(StaticHandler::json(body))
    }

    fn pattern(p: &str) -> RoutePattern {
        RoutePattern::parse(p).unwrap()
    }

    #[test]
    fn literal_route_wins_regardless_of_insert_order() {
        let mut builder = RouteTable::builder();
        builder.insert(pattern("/api/news/[id]"), handler("{}"), None).unwrap();
        builder.insert(pattern("/api/news/latest"), handler("{}"), None).unwrap();
        let table = builder.build();

        let matched = table.lookup("/api/news/latest").unwrap();
        assert_eq!(matched.route.pattern().to_string(), "/api/news/latest");
        assert!(matched.params.is_empty());

        let matched = table.lookup("/api/news/42/").unwrap();
        assert_eq!(matched.params["id"], "42");
    }

    #[test]
    fn duplicate_pattern_conflicts() {
        let mut builder = RouteTable::builder();
        builder.insert(pattern("/api/a"), handler("{}"), None).unwrap();
        let err = builder.insert(pattern("/api/a/"), handler("{}"), None).unwrap_err();
        assert_eq!(err, RouteConflict("/api/a".into()));
    }

    #[test]
    fn no_match() {
        let table = RouteTable::builder().build();
        assert!(table.is_empty());
        assert!(table.lookup("/api/anything").is_none());
    }
}
