//! Attach etag generators to routes up front, then wrap the whole router once.
//!
//! ```
//! use http::Method;
//! use tower_conditional_etag::{registry::EtagRegistry, sync_etag_fn};
//!
//! let mut registry = EtagRegistry::<()>::new();
//! registry.add(
//!     Method::GET,
//!     "/hello/{name}",
//!     sync_etag_fn(|req: &http::Request<()>| {
//!         let name = req.uri().path().trim_start_matches("/hello/");
//!         Some(format!("etagfor{name}"))
//!     }),
//!     true,
//! );
//! let layer = registry.into_layer();
//! ```
//!
//! Requests for routes without an entry go straight to the inner service.

use std::sync::Arc;

use http::Method;
use tower::BoxError;

use crate::{ConditionalEtag, EtagGenerator};

mod route_key;
mod service;
mod shared_gen;

pub use route_key::*;
pub use service::*;
pub use shared_gen::*;

/// Generator and configuration attached to a route
pub struct RouteEtag<ReqBody> {
    pub generator: SharedEtagGenerator<ReqBody>,
    pub conditional: Arc<ConditionalEtag>,
}

impl<ReqBody> Clone for RouteEtag<ReqBody> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            conditional: Arc::clone(&self.conditional),
        }
    }
}

impl<ReqBody> std::fmt::Debug for RouteEtag<ReqBody> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEtag")
            .field("conditional", &self.conditional)
            .finish_non_exhaustive()
    }
}

/// Maps routes to the etag generator to run for their requests.
///
/// Built once at startup and owned by the [`EtagRegistryLayer`]
/// made from it, never mutated while serving.
pub struct EtagRegistry<ReqBody> {
    routes: Vec<(RouteKey, RouteEtag<ReqBody>)>,
}

impl<ReqBody> Default for EtagRegistry<ReqBody> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<ReqBody> Clone for EtagRegistry<ReqBody> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
        }
    }
}

impl<ReqBody> std::fmt::Debug for EtagRegistry<ReqBody> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(k, _)| k))
            .finish()
    }
}

impl<ReqBody: Send + 'static> EtagRegistry<ReqBody> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `generator` to the route, replacing any previous entry for it.
    ///
    /// `path` is the route's template, see [`RouteKey`].
    pub fn add<G>(&mut self, method: Method, path: &str, generator: G, weak: bool) -> &mut Self
    where
        G: EtagGenerator<ReqBody> + Clone + Send + Sync + 'static,
        G::Future: Send + 'static,
        G::Error: Into<BoxError>,
    {
        self.add_with(
            method,
            path,
            generator,
            ConditionalEtag::default().weak(weak),
        )
    }

    /// Like [`add()`](Self::add) with full control over the route's configuration,
    /// e.g. to send extra headers
    pub fn add_with<G>(
        &mut self,
        method: Method,
        path: &str,
        generator: G,
        conditional: ConditionalEtag,
    ) -> &mut Self
    where
        G: EtagGenerator<ReqBody> + Clone + Send + Sync + 'static,
        G::Future: Send + 'static,
        G::Error: Into<BoxError>,
    {
        let key = RouteKey::new(method, path);
        let route = RouteEtag {
            generator: SharedEtagGenerator::new(generator),
            conditional: Arc::new(conditional),
        };
        match self.routes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = route,
            None => self.routes.push((key, route)),
        }
        self
    }
}

impl<ReqBody> EtagRegistry<ReqBody> {
    /// Finds the entry for a request.
    ///
    /// Routes without parameters are preferred, then the first
    /// added route that matches. `HEAD` requests fall back to `GET` routes.
    pub fn get(&self, method: &Method, path: &str) -> Option<&RouteEtag<ReqBody>> {
        self.find(method, path).or_else(|| match *method {
            Method::HEAD => self.find(&Method::GET, path),
            _ => None,
        })
    }

    fn find(&self, method: &Method, path: &str) -> Option<&RouteEtag<ReqBody>> {
        let matching = || self.routes.iter().filter(|(k, _)| k.matches(method, path));
        matching()
            .find(|(k, _)| k.is_literal())
            .or_else(|| matching().next())
            .map(|(_, route)| route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn into_layer(self) -> EtagRegistryLayer<ReqBody> {
        EtagRegistryLayer::new(self)
    }
}
