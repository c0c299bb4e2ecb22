use http::HeaderMap;
use pin_project::pin_project;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower_service::Service;

use crate::{
    merge_headers, ConditionalEtag, CurrentEtag, EtagGenerator, EtagGuardResBody,
    EtagGuardServiceError, EvaluationOutcome, GeneratedEtag,
};

#[pin_project]
pub struct EtagGuardFuture<ReqBody, G: EtagGenerator<ReqBody>, S: Service<http::Request<ReqBody>>>
{
    inner: S,
    #[pin]
    state: EtagGuardFutureState<ReqBody, G, S>,
}

impl<ReqBody, G: EtagGenerator<ReqBody>, S: Service<http::Request<ReqBody>>>
    EtagGuardFuture<ReqBody, G, S>
{
    pub fn start(
        generator: G,
        conditional: Arc<ConditionalEtag>,
        inner: S,
        req: http::Request<ReqBody>,
    ) -> Self {
        Self {
            inner,
            state: EtagGuardFutureState::GenerateBefore {
                generator,
                conditional,
                req: Some(req),
            },
        }
    }

    /// Only the inner service is called, its response is returned untouched
    pub fn passthrough(inner: S, req: http::Request<ReqBody>) -> Self {
        Self {
            inner,
            state: EtagGuardFutureState::InnerBefore {
                headers: None,
                req: Some(req),
            },
        }
    }
}

// using options just to take() and move fields to next state easily
#[pin_project(project = EtagGuardFutureStateProj)]
pub enum EtagGuardFutureState<
    ReqBody,
    G: EtagGenerator<ReqBody>,
    S: Service<http::Request<ReqBody>>,
> {
    GenerateBefore {
        generator: G,
        conditional: Arc<ConditionalEtag>,
        req: Option<http::Request<ReqBody>>,
    },
    Generate {
        conditional: Arc<ConditionalEtag>,
        #[pin]
        fut: G::Future,
    },
    InnerBefore {
        /// None indicates passthrough: response headers are left as is
        headers: Option<HeaderMap>,
        req: Option<http::Request<ReqBody>>,
    },
    Inner {
        /// None indicates passthrough: response headers are left as is
        headers: Option<HeaderMap>,
        #[pin]
        fut: S::Future,
    },
}

impl<ReqBody, ResBody, G, S> Future for EtagGuardFuture<ReqBody, G, S>
where
    G: EtagGenerator<ReqBody>,
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
{
    type Output = Result<
        http::Response<EtagGuardResBody<ResBody>>,
        EtagGuardServiceError<G::Error, S::Error>,
    >;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut curr_state = this.state;

        match curr_state.as_mut().project() {
            EtagGuardFutureStateProj::GenerateBefore {
                generator,
                conditional,
                req,
            } => match generator.poll_ready(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(result) => {
                    if let Err(e) = result {
                        return Poll::Ready(Err(EtagGuardServiceError::GenerateError(e)));
                    }
                    let conditional = Arc::clone(conditional);
                    let fut = generator.call(req.take().expect("request moved out once"));
                    curr_state.set(EtagGuardFutureState::Generate { conditional, fut });
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            },
            EtagGuardFutureStateProj::Generate { conditional, fut } => match fut.poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(result) => {
                    let GeneratedEtag { mut req, etag } = match result {
                        Ok(r) => r,
                        Err(e) => {
                            return Poll::Ready(Err(EtagGuardServiceError::GenerateError(e)))
                        }
                    };
                    tracing::trace!(uri = %req.uri(), etag = ?etag, "etag generated");
                    let outcome = match conditional.evaluate(etag.as_deref(), req.headers()) {
                        Ok(o) => o,
                        Err(e) => return Poll::Ready(Err(EtagGuardServiceError::InvalidEtag(e))),
                    };
                    let headers = match outcome {
                        EvaluationOutcome::ShortCircuit { status, headers } => {
                            tracing::debug!(
                                uri = %req.uri(),
                                %status,
                                "conditional request short-circuited"
                            );
                            return Poll::Ready(Ok(EtagGuardResBody::short_circuit_resp(
                                status, headers,
                            )));
                        }
                        EvaluationOutcome::Proceed { etag, headers } => {
                            if let Some(etag) = etag {
                                req.extensions_mut().insert(CurrentEtag(etag));
                            }
                            headers
                        }
                    };
                    curr_state.set(EtagGuardFutureState::InnerBefore {
                        headers: Some(headers),
                        req: Some(req),
                    });
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            },
            EtagGuardFutureStateProj::InnerBefore { headers, req } => {
                match this.inner.poll_ready(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(result) => {
                        if let Err(e) = result {
                            return Poll::Ready(Err(EtagGuardServiceError::InnerError(e)));
                        }
                        let headers = headers.take();
                        let fut = this.inner.call(req.take().expect("request moved out once"));
                        curr_state.set(EtagGuardFutureState::Inner { headers, fut });
                        cx.waker().wake_by_ref();
                        Poll::Pending
                    }
                }
            }
            EtagGuardFutureStateProj::Inner { headers, fut } => match fut.poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(result) => {
                    let mut resp = match result {
                        Ok(r) => r,
                        Err(e) => return Poll::Ready(Err(EtagGuardServiceError::InnerError(e))),
                    };
                    if let Some(h) = headers.take() {
                        merge_headers(resp.headers_mut(), h);
                    }
                    Poll::Ready(Ok(EtagGuardResBody::passthrough_resp(resp)))
                }
            },
        }
    }
}
