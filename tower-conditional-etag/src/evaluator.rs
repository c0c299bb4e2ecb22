use std::{convert::Infallible, future::poll_fn};

use http::{header::ETAG, HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::{
    normalize_etag, EtagGenerator, EtagGuardServiceError, GeneratedEtag, InvalidEtag,
    Precondition,
};

/// Per-route configuration of the conditional request evaluation:
/// whether generated etags are weak, and headers to always attach.
///
/// Immutable once built, so a single instance can be shared by all requests of a route.
#[derive(Debug, Clone)]
pub struct ConditionalEtag {
    weak: bool,
    extra_headers: HeaderMap,
}

impl Default for ConditionalEtag {
    /// Weak etags, no extra headers
    fn default() -> Self {
        Self {
            weak: true,
            extra_headers: HeaderMap::new(),
        }
    }
}

impl ConditionalEtag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weak(mut self, weak: bool) -> Self {
        self.weak = weak;
        self
    }

    /// Appends a header sent with every response of the route,
    /// both short-circuited and passed through
    pub fn extra_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.extra_headers.append(name, value);
        self
    }

    /// Appends all of `headers`, keeping values already added for the same names
    pub fn extra_headers(mut self, headers: HeaderMap) -> Self {
        let mut prev: Option<HeaderName> = None;
        for (name, value) in headers {
            if let Some(name) = name {
                prev = Some(name);
            }
            if let Some(name) = &prev {
                self.extra_headers.append(name.clone(), value);
            }
        }
        self
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub fn get_extra_headers(&self) -> &HeaderMap {
        &self.extra_headers
    }

    /// Decides what to do with a request given the etag generated for it.
    ///
    /// The returned headers are the extra headers plus `etag` if one was generated.
    /// A generated etag replaces an extra header also named `etag`.
    pub fn evaluate(
        &self,
        etag: Option<&str>,
        req_headers: &HeaderMap,
    ) -> Result<EvaluationOutcome, InvalidEtag> {
        let etag = normalize_etag(etag, self.weak)?;

        let mut headers = self.extra_headers.clone();
        if let Some(e) = &etag {
            headers.insert(ETAG, e.clone());
        }

        let precondition = match Precondition::from_headers(req_headers) {
            Some(p) => p,
            None => return Ok(EvaluationOutcome::Proceed { etag, headers }),
        };
        let modified = crate::is_modified(etag.as_ref(), precondition.client_etag());

        let outcome = match (precondition, modified) {
            (Precondition::IfNoneMatch(_), false) => EvaluationOutcome::ShortCircuit {
                status: StatusCode::NOT_MODIFIED,
                headers,
            },
            (Precondition::IfMatch(_), true) => EvaluationOutcome::ShortCircuit {
                status: StatusCode::PRECONDITION_FAILED,
                headers,
            },
            _ => EvaluationOutcome::Proceed { etag, headers },
        };
        Ok(outcome)
    }
}

/// Either
/// - the response to send right away without calling the inner service:
///   304 on an `If-None-Match` hit, 412 on an `If-Match` mismatch
/// - the headers to merge into the inner service's response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    ShortCircuit {
        status: StatusCode,
        headers: HeaderMap,
    },
    Proceed {
        /// Normalized etag, None if the generator returned none
        etag: Option<HeaderValue>,
        headers: HeaderMap,
    },
}

impl EvaluationOutcome {
    pub fn headers(&self) -> &HeaderMap {
        match self {
            Self::ShortCircuit { headers, .. } | Self::Proceed { headers, .. } => headers,
        }
    }

    pub fn is_short_circuit(&self) -> bool {
        matches!(self, Self::ShortCircuit { .. })
    }
}

/// Merges `headers` into `headers_mut`.
///
/// For every header name in `headers`, all existing values in `headers_mut` are replaced.
pub fn merge_headers(headers_mut: &mut HeaderMap, headers: HeaderMap) {
    let mut prev: Option<HeaderName> = None;
    for (name, value) in headers {
        match name {
            Some(name) => {
                headers_mut.insert(name.clone(), value);
                prev = Some(name);
            }
            // further values of the previous name
            None => {
                if let Some(name) = &prev {
                    headers_mut.append(name.clone(), value);
                }
            }
        }
    }
}

/// Runs the generator on the request and evaluates the result.
///
/// Hands the request back so that the caller can pass it on to its handler on
/// [`EvaluationOutcome::Proceed`]. For use outside of tower stacks,
/// [`EtagGuard`](crate::EtagGuard) does the same thing as a `Service`.
pub async fn evaluate_request<ReqBody, G>(
    generator: &mut G,
    conditional: &ConditionalEtag,
    req: http::Request<ReqBody>,
) -> Result<
    (http::Request<ReqBody>, EvaluationOutcome),
    EtagGuardServiceError<G::Error, Infallible>,
>
where
    G: EtagGenerator<ReqBody>,
{
    poll_fn(|cx| generator.poll_ready(cx))
        .await
        .map_err(EtagGuardServiceError::GenerateError)?;
    let GeneratedEtag { req, etag } = generator
        .call(req)
        .await
        .map_err(EtagGuardServiceError::GenerateError)?;
    let outcome = conditional
        .evaluate(etag.as_deref(), req.headers())
        .map_err(EtagGuardServiceError::InvalidEtag)?;
    Ok((req, outcome))
}
