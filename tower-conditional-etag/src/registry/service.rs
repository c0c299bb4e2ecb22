use std::{sync::Arc, task::Poll};

use tower::BoxError;
use tower_layer::Layer;
use tower_service::Service;

use crate::{EtagGuardFuture, EtagGuardResBody, EtagGuardServiceError};

use super::{EtagRegistry, SharedEtagGenerator};

/// [`Layer`] applying an [`EtagRegistry`] to every request of the wrapped service
pub struct EtagRegistryLayer<ReqBody> {
    registry: Arc<EtagRegistry<ReqBody>>,
}

impl<ReqBody> EtagRegistryLayer<ReqBody> {
    pub fn new(registry: EtagRegistry<ReqBody>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

impl<ReqBody> Clone for EtagRegistryLayer<ReqBody> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<ReqBody, S> Layer<S> for EtagRegistryLayer<ReqBody> {
    type Service = EtagRegistryService<ReqBody, S>;

    fn layer(&self, inner: S) -> Self::Service {
        EtagRegistryService {
            registry: Arc::clone(&self.registry),
            inner,
        }
    }
}

pub struct EtagRegistryService<ReqBody, S> {
    registry: Arc<EtagRegistry<ReqBody>>,
    inner: S,
}

impl<ReqBody, S: Clone> Clone for EtagRegistryService<ReqBody, S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            inner: self.inner.clone(),
        }
    }
}

impl<ReqBody, ResBody, S> Service<http::Request<ReqBody>> for EtagRegistryService<ReqBody, S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone,
{
    type Response = http::Response<EtagGuardResBody<ResBody>>;

    type Error = EtagGuardServiceError<BoxError, S::Error>;

    type Future = EtagGuardFuture<ReqBody, SharedEtagGenerator<ReqBody>, S>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let route = match self.registry.get(req.method(), req.uri().path()) {
            Some(r) => r,
            None => {
                tracing::trace!(
                    method = %req.method(),
                    path = req.uri().path(),
                    "no etag generator registered, passing through"
                );
                return EtagGuardFuture::passthrough(self.inner.clone(), req);
            }
        };
        EtagGuardFuture::start(
            route.generator.clone(),
            Arc::clone(&route.conditional),
            self.inner.clone(),
            req,
        )
    }
}
