//! tower middleware answering HTTP conditional requests from a per-request ETag generator.
//!
//! For every request, a user supplied [`EtagGenerator`] computes the raw etag of
//! the resource. The etag is quoted (and prefixed with `W/` unless configured strong),
//! then compared as is against the request's `If-None-Match` or, if that's absent,
//! `If-Match` header:
//!
//! - `If-None-Match` matches: `304 Not Modified`, inner service not called
//! - `If-Match` does not match: `412 Precondition Failed`, inner service not called
//! - otherwise: inner service called, `etag` and configured extra headers added to its response
//!
//! A generator returning no etag never matches.
//!
//! [`EtagGuardLayer`] attaches a single generator to a service, e.g. one axum route.
//! With the `registry` feature, [`registry::EtagRegistryLayer`] looks up the generator by
//! method and path instead.

use std::{sync::Arc, task::Poll};
use tower_service::Service;

mod err;
mod evaluator;
mod future;
mod generator;
mod layer;
mod response;
mod token;

#[cfg(feature = "registry")]
pub mod registry;

#[cfg(feature = "serde")]
pub mod config;

pub use err::*;
pub use evaluator::*;
pub use future::*;
pub use generator::*;
pub use layer::*;
pub use response::*;
pub use token::*;

#[derive(Clone, Debug)]
pub struct EtagGuard<G, S> {
    generator: G,
    conditional: Arc<ConditionalEtag>,
    inner: S,
}

impl<G, S> EtagGuard<G, S> {
    pub fn new(generator: G, conditional: ConditionalEtag, inner: S) -> Self {
        Self {
            generator,
            conditional: Arc::new(conditional),
            inner,
        }
    }

    pub fn conditional(&self) -> &ConditionalEtag {
        &self.conditional
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<ReqBody, ResBody, G, S> Service<http::Request<ReqBody>> for EtagGuard<G, S>
where
    G: EtagGenerator<ReqBody> + Clone,
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone,
{
    type Response = http::Response<EtagGuardResBody<ResBody>>;

    type Error = EtagGuardServiceError<G::Error, S::Error>;

    type Future = EtagGuardFuture<ReqBody, G, S>;

    /// `EtagGuardFuture` poll_ready()s the generator, then the inner service
    /// only if the request is not short-circuited
    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        EtagGuardFuture::start(
            self.generator.clone(),
            Arc::clone(&self.conditional),
            self.inner.clone(),
            req,
        )
    }
}
