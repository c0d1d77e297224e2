//! Handler catalog: descriptor `kind` → factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handlers::{
    feed::FeedFetchHandler, static_json::StaticHandler, upstream::UpstreamHandler, Handler,
};

/// Builds a handler from the descriptor options (everything except `kind`).
pub type HandlerFactory =
    Box<dyn Fn(toml::Table) -> Result<Arc<dyn Handler>, toml::de::Error> + Send + Sync>;

/// Why a descriptor could not be turned into a handler.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown handler kind {0:?}")]
    UnknownKind(String),

    #[error("invalid options: {0}")]
    InvalidOptions(#[from] toml::de::Error),
}

pub struct Catalog {
    factories: HashMap<String, HandlerFactory>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Catalog with the built-in kinds: `static`, `upstream`, `feed-fetch`.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register("static", |options| {
            Ok(Arc::new(StaticHandler::from_options(options)?) as Arc<dyn Handler>)
        });
        catalog.register("upstream", |options| {
            Ok(Arc::new(UpstreamHandler::from_options(options)?) as Arc<dyn Handler>)
        });
        catalog.register("feed-fetch", |_| {
            Ok(Arc::new(FeedFetchHandler) as Arc<dyn Handler>)
        });
        catalog
    }

    /// Register (or replace) a kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(toml::Table) -> Result<Arc<dyn Handler>, toml::de::Error> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn build(&self, kind: &str, options: toml::Table) -> Result<Arc<dyn Handler>, CatalogError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| CatalogError::UnknownKind(kind.to_string()))?;
        Ok(factory(options)?)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog").field("kinds", &self.kinds()).finish()
    }
}

/// Deserialize descriptor options into a typed struct.
pub(crate) fn parse_options<T: serde::de::DeserializeOwned>(
    options: toml::Table,
) -> Result<T, toml::de::Error> {
    toml::Value::Table(options).try_into()
}
