use std::{
    convert::Infallible,
    future::{ready, Future, Ready},
    pin::Pin,
    task::{Context, Poll},
};

use pin_project::pin_project;
use tower_service::Service;

/// The request given to the generator, handed back together with
/// the raw etag generated for it.
#[derive(Debug)]
pub struct GeneratedEtag<ReqBody> {
    pub req: http::Request<ReqBody>,
    /// None or empty if the response should not be tagged
    pub etag: Option<String>,
}

/// Generates the raw (unquoted) etag of the resource a request is for.
///
/// The request is moved in and handed back in [`GeneratedEtag`] so that it can be
/// forwarded to the inner service afterwards.
///
/// Use [`etag_fn`] or [`sync_etag_fn`] to make one out of a closure.
pub trait EtagGenerator<ReqBody>:
    Service<http::Request<ReqBody>, Response = GeneratedEtag<ReqBody>>
{
}

impl<ReqBody, T> EtagGenerator<ReqBody> for T where
    T: Service<http::Request<ReqBody>, Response = GeneratedEtag<ReqBody>>
{
}

/// [`EtagGenerator`] from an async closure
#[derive(Clone, Copy, Debug)]
pub struct EtagGenFn<F> {
    f: F,
}

/// Creates an [`EtagGenerator`] from a closure returning a future.
///
/// The returned future must not borrow the request: copy what is needed
/// out of it before the `async move` block.
///
/// ```
/// # use std::convert::Infallible;
/// use tower_conditional_etag::etag_fn;
///
/// let generator = etag_fn(|req: &http::Request<()>| {
///     let name = req.uri().path().trim_start_matches("/hello/").to_owned();
///     async move { Ok::<_, Infallible>(Some(format!("etagfor{name}"))) }
/// });
/// ```
pub fn etag_fn<ReqBody, F, Fut, E>(f: F) -> EtagGenFn<F>
where
    F: FnMut(&http::Request<ReqBody>) -> Fut,
    Fut: Future<Output = Result<Option<String>, E>>,
{
    EtagGenFn { f }
}

impl<ReqBody, F, Fut, E> Service<http::Request<ReqBody>> for EtagGenFn<F>
where
    F: FnMut(&http::Request<ReqBody>) -> Fut,
    Fut: Future<Output = Result<Option<String>, E>>,
{
    type Response = GeneratedEtag<ReqBody>;

    type Error = E;

    type Future = EtagGenFnFuture<ReqBody, Fut>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let fut = (self.f)(&req);
        EtagGenFnFuture {
            fut,
            req: Some(req),
        }
    }
}

#[pin_project]
pub struct EtagGenFnFuture<ReqBody, Fut> {
    #[pin]
    fut: Fut,
    req: Option<http::Request<ReqBody>>,
}

impl<ReqBody, Fut, E> Future for EtagGenFnFuture<ReqBody, Fut>
where
    Fut: Future<Output = Result<Option<String>, E>>,
{
    type Output = Result<GeneratedEtag<ReqBody>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let etag = match this.fut.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result?,
        };
        let req = this
            .req
            .take()
            .expect("EtagGenFnFuture polled after completion");
        Poll::Ready(Ok(GeneratedEtag { req, etag }))
    }
}

/// [`EtagGenerator`] from a plain closure that cannot fail
#[derive(Clone, Copy, Debug)]
pub struct SyncEtagGenFn<F> {
    f: F,
}

/// Creates an [`EtagGenerator`] from a synchronous closure.
pub fn sync_etag_fn<ReqBody, F>(f: F) -> SyncEtagGenFn<F>
where
    F: FnMut(&http::Request<ReqBody>) -> Option<String>,
{
    SyncEtagGenFn { f }
}

impl<ReqBody, F> Service<http::Request<ReqBody>> for SyncEtagGenFn<F>
where
    F: FnMut(&http::Request<ReqBody>) -> Option<String>,
{
    type Response = GeneratedEtag<ReqBody>;

    type Error = Infallible;

    type Future = Ready<Result<GeneratedEtag<ReqBody>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let etag = (self.f)(&req);
        ready(Ok(GeneratedEtag { req, etag }))
    }
}
