use std::{
    sync::Arc,
    task::{Context, Poll},
};

use futures::{future::BoxFuture, FutureExt, TryFutureExt};
use tower::{BoxError, ServiceExt};
use tower_service::Service;

use crate::{EtagGenerator, GeneratedEtag};

type GenerateFuture<ReqBody> = BoxFuture<'static, Result<GeneratedEtag<ReqBody>, BoxError>>;

type GenerateFn<ReqBody> = dyn Fn(http::Request<ReqBody>) -> GenerateFuture<ReqBody> + Send + Sync;

/// Type-erased [`EtagGenerator`] that can be shared between threads,
/// so that generators of different types can live in the same
/// [`EtagRegistry`](super::EtagRegistry).
///
/// Every call runs on a fresh clone of the wrapped generator.
pub struct SharedEtagGenerator<ReqBody> {
    generate: Arc<GenerateFn<ReqBody>>,
}

impl<ReqBody> Clone for SharedEtagGenerator<ReqBody> {
    fn clone(&self) -> Self {
        Self {
            generate: Arc::clone(&self.generate),
        }
    }
}

impl<ReqBody> std::fmt::Debug for SharedEtagGenerator<ReqBody> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEtagGenerator").finish_non_exhaustive()
    }
}

impl<ReqBody: Send + 'static> SharedEtagGenerator<ReqBody> {
    pub fn new<G>(generator: G) -> Self
    where
        G: EtagGenerator<ReqBody> + Clone + Send + Sync + 'static,
        G::Future: Send + 'static,
        G::Error: Into<BoxError>,
    {
        let generate = move |req: http::Request<ReqBody>| {
            generator
                .clone()
                .oneshot(req)
                .map_err(Into::<BoxError>::into)
                .boxed()
        };
        Self {
            generate: Arc::new(generate),
        }
    }
}

impl<ReqBody> Service<http::Request<ReqBody>> for SharedEtagGenerator<ReqBody> {
    type Response = GeneratedEtag<ReqBody>;

    type Error = BoxError;

    type Future = GenerateFuture<ReqBody>;

    /// Readiness of the wrapped generator is awaited within the returned future
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        (self.generate)(req)
    }
}
