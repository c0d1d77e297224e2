//! Handler registry: descriptor discovery and route table construction.
//!
//! # Responsibilities
//! - Resolve the API directory for the flat or packaged layout
//! - Walk the directory, derive one route pattern per descriptor
//! - Build handlers through the catalog and record per-file failures
//! - Add code-registered handlers and the built-in feed route
//!
//! # Design Decisions
//! - A broken descriptor removes only its own route
//! - Code-registered handlers win over descriptors for the same pattern
//! - Directory entries are visited in name order so failures are reproducible

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::HandlerConfig;
use crate::handlers::catalog::CatalogError;
use crate::handlers::feed::FeedFetchHandler;
use crate::handlers::{Catalog, Handler};
use crate::routing::matcher::{PatternError, RoutePattern};
use crate::routing::router::{RouteConflict, RouteTable, RouteTableBuilder};

const DESCRIPTOR_EXTENSION: &str = "toml";

/// Where descriptors come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerSource {
    /// Descriptors live directly under this directory.
    ApiDir(PathBuf),
    /// Packaged build: `<root>/_up_/api`, else `<root>/api`.
    ResourceRoot(PathBuf),
    None,
}

impl HandlerSource {
    pub fn from_config(config: &HandlerConfig) -> Self {
        match (&config.api_dir, &config.resource_dir) {
            (Some(dir), _) => HandlerSource::ApiDir(dir.clone()),
            (None, Some(root)) => HandlerSource::ResourceRoot(root.clone()),
            (None, None) => HandlerSource::None,
        }
    }

    pub fn resolve_api_dir(&self) -> Option<PathBuf> {
        match self {
            HandlerSource::ApiDir(dir) => Some(dir.clone()),
            HandlerSource::ResourceRoot(root) => {
                let nested = root.join("_up_").join("api");
                if nested.is_dir() {
                    Some(nested)
                } else {
                    Some(root.join("api"))
                }
            }
            HandlerSource::None => None,
        }
    }
}

/// Why one route could not be registered.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read descriptor: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed descriptor: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("descriptor has no string `kind`")]
    MissingKind,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("invalid route path: {0}")]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Conflict(#[from] RouteConflict),
}

#[derive(Debug)]
pub struct LoadFailure {
    /// Descriptor file, or the pattern for a code-registered handler.
    pub path: PathBuf,
    pub error: LoadError,
}

/// The loaded route table plus everything that failed to load.
#[derive(Debug)]
pub struct Registry {
    routes: Arc<RouteTable>,
    failures: Vec<LoadFailure>,
    api_dir: Option<PathBuf>,
}

impl Registry {
    pub fn builder(source: HandlerSource) -> RegistryBuilder {
        RegistryBuilder {
            source,
            catalog: Catalog::builtin(),
            handlers: Vec::new(),
            feed_route: None,
        }
    }

    /// Load descriptors and the feed route as configured.
    pub fn from_config(config: &HandlerConfig) -> Self {
        Self::builder(HandlerSource::from_config(config))
            .feed_route(config.feed_route.clone())
            .build()
    }

    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.clone()
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn api_dir(&self) -> Option<&Path> {
        self.api_dir.as_deref()
    }
}

pub struct RegistryBuilder {
    source: HandlerSource,
    catalog: Catalog,
    handlers: Vec<(String, Arc<dyn Handler>)>,
    feed_route: Option<String>,
}

impl RegistryBuilder {
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Register a handler in code.
    pub fn handler(mut self, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push((pattern.into(), handler));
        self
    }

    /// Path of the built-in feed route, added unless a descriptor claims it.
    pub fn feed_route(mut self, pattern: impl Into<String>) -> Self {
        self.feed_route = Some(pattern.into());
        self
    }

    pub fn build(self) -> Registry {
        let mut table = RouteTable::builder();
        let mut failures = Vec::new();

        for (pattern, handler) in self.handlers {
            let inserted = RoutePattern::parse(&pattern)
                .map_err(LoadError::from)
                .and_then(|parsed| Ok(table.insert(parsed, handler, None)?));
            if let Err(error) = inserted {
                failures.push(LoadFailure {
                    path: PathBuf::from(pattern),
                    error,
                });
            }
        }

        let api_dir = self.source.resolve_api_dir();
        if let Some(dir) = &api_dir {
            if dir.is_dir() {
                let mut descriptors = Vec::new();
                collect_descriptors(dir, &mut Vec::new(), &mut descriptors, &mut failures);
                for (path, segments) in descriptors {
                    if let Err(error) = load_descriptor(&self.catalog, &mut table, &path, &segments) {
                        failures.push(LoadFailure { path, error });
                    }
                }
            } else {
                tracing::warn!(api_dir = %dir.display(), "API directory not found, no local handlers loaded");
            }
        }

        if let Some(feed) = self.feed_route {
            match RoutePattern::parse(&feed) {
                Ok(pattern) if table.contains(&pattern) => {
                    tracing::info!(route = %pattern, "Feed route claimed by another handler");
                }
                Ok(pattern) => {
                    let handler: Arc<dyn Handler> = Arc::new(FeedFetchHandler);
                    if let Err(e) = table.insert(pattern, handler, None) {
                        failures.push(LoadFailure {
                            path: PathBuf::from(feed),
                            error: e.into(),
                        });
                    }
                }
                Err(e) => failures.push(LoadFailure {
                    path: PathBuf::from(feed),
                    error: e.into(),
                }),
            }
        }

        for failure in &failures {
            tracing::warn!(
                file = %failure.path.display(),
                error = %failure.error,
                "Skipping handler"
            );
        }

        let routes = table.build();
        tracing::info!(
            routes = routes.len(),
            failed = failures.len(),
            api_dir = ?api_dir,
            "Handler registry loaded"
        );

        Registry {
            routes: Arc::new(routes),
            failures,
            api_dir,
        }
    }
}

fn is_helper(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

/// Depth-first walk collecting `(file, route segments)` pairs.
fn collect_descriptors(
    dir: &Path,
    prefix: &mut Vec<String>,
    out: &mut Vec<(PathBuf, Vec<String>)>,
    failures: &mut Vec<LoadFailure>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            failures.push(LoadFailure {
                path: dir.to_path_buf(),
                error: e.into(),
            });
            return;
        }
    };

    let mut entries: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_helper(name) {
            continue;
        }

        if path.is_dir() {
            prefix.push(name.to_string());
            collect_descriptors(&path, prefix, out, failures);
            prefix.pop();
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) != Some(DESCRIPTOR_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let mut segments = prefix.clone();
        if stem != "index" {
            segments.push(stem.to_string());
        }
        out.push((path.clone(), segments));
    }
}

/// Route path for descriptor segments: `["news", "[id]"]` → `/api/news/[id]`.
pub fn route_path(segments: &[String]) -> String {
    let mut path = String::from("/api");
    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }
    path
}

fn load_descriptor(
    catalog: &Catalog,
    table: &mut RouteTableBuilder,
    path: &Path,
    segments: &[String],
) -> Result<(), LoadError> {
    let pattern = RoutePattern::parse(&route_path(segments))?;
    let content = fs::read_to_string(path)?;
    let mut options: toml::Table = toml::from_str(&content)?;
    let kind = match options.remove("kind") {
        Some(toml::Value::String(kind)) => kind,
        _ => return Err(LoadError::MissingKind),
    };
    let handler = catalog.build(&kind, options)?;
    table.insert(pattern, handler, Some(path.to_path_buf()))?;
    tracing::debug!(file = %path.display(), kind = %kind, "Handler registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::static_json::StaticHandler;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const STATIC: &str = "kind = \"static\"\nbody = \"{}\"\n";

    fn patterns(registry: &Registry) -> Vec<String> {
        let mut patterns: Vec<String> = registry
            .routes()
            .routes()
            .map(|r| r.pattern().to_string())
            .collect();
        patterns.sort();
        patterns
    }

    #[test]
    fn flat_layout_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "markets.toml", STATIC);
        write(dir.path(), "news/index.toml", STATIC);
        write(dir.path(), "news/[id].toml", STATIC);
        write(dir.path(), "news/_shared.toml", STATIC);
        write(dir.path(), "_helpers/util.toml", STATIC);
        write(dir.path(), ".hidden.toml", STATIC);
        write(dir.path(), "readme.md", "not a route");

        let registry = Registry::builder(HandlerSource::ApiDir(dir.path().to_path_buf())).build();
        assert_eq!(patterns(&registry), ["/api/markets", "/api/news", "/api/news/[id]"]);
        assert!(registry.failures().is_empty());

        let table = registry.routes();
        let matched = table.lookup("/api/news/abc").unwrap();
        assert_eq!(matched.params["id"], "abc");
        assert!(table.lookup("/api/news/").is_some());
    }

    #[test]
    fn packaged_layout_prefers_nested_tree() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "_up_/api/status.toml", STATIC);
        write(root.path(), "api/legacy.toml", STATIC);

        let source = HandlerSource::ResourceRoot(root.path().to_path_buf());
        assert_eq!(source.resolve_api_dir(), Some(root.path().join("_up_").join("api")));
        let registry = Registry::builder(source).build();
        assert_eq!(patterns(&registry), ["/api/status"]);
    }

    #[test]
    fn packaged_layout_falls_back_to_api() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "api/legacy.toml", STATIC);

        let registry = Registry::builder(HandlerSource::ResourceRoot(root.path().to_path_buf())).build();
        assert_eq!(patterns(&registry), ["/api/legacy"]);
    }

    #[test]
    fn broken_descriptor_only_removes_itself() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.toml", STATIC);
        write(dir.path(), "syntax.toml", "kind = ");
        write(dir.path(), "nokind.toml", "body = \"{}\"");
        write(dir.path(), "unknown.toml", "kind = \"graphql\"");
        write(dir.path(), "badopts.toml", "kind = \"static\"\nstatus = \"teapot\"");
        write(dir.path(), "items/[bad name].toml", STATIC);

        let registry = Registry::builder(HandlerSource::ApiDir(dir.path().to_path_buf())).build();
        assert_eq!(patterns(&registry), ["/api/good"]);
        assert_eq!(registry.failures().len(), 5);
        let missing_kind = registry
            .failures()
            .iter()
            .find(|f| f.path.ends_with("nokind.toml"))
            .unwrap();
        assert!(matches!(missing_kind.error, LoadError::MissingKind));
    }

    #[test]
    fn code_handlers_win_and_feed_route_is_added() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "markets.toml", STATIC);

        let registry = Registry::builder(HandlerSource::ApiDir(dir.path().to_path_buf()))
            .handler("/api/markets", Arc::new(StaticHandler::json("{\"source\":\"code\"}")))
            .feed_route("/api/rss-proxy")
            .build();

        assert_eq!(patterns(&registry), ["/api/markets", "/api/rss-proxy"]);
        let table = registry.routes();
        assert!(table.lookup("/api/markets").unwrap().route.source().is_none());
        assert!(matches!(registry.failures()[0].error, LoadError::Conflict(_)));
    }

    #[test]
    fn descriptor_can_claim_feed_route() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "rss-proxy.toml", STATIC);

        let registry = Registry::builder(HandlerSource::ApiDir(dir.path().to_path_buf()))
            .feed_route("/api/rss-proxy")
            .build();
        assert!(registry.failures().is_empty());
        let table = registry.routes();
        assert!(table.lookup("/api/rss-proxy").unwrap().route.source().is_some());
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::builder(HandlerSource::ApiDir(dir.path().join("absent"))).build();
        assert!(registry.routes().is_empty());
        assert!(registry.failures().is_empty());

        let registry = Registry::builder(HandlerSource::None).build();
        assert!(registry.api_dir().is_none());
    }
}
