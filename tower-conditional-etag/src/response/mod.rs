use http::{HeaderMap, StatusCode};
use pin_project::pin_project;

#[cfg(feature = "http-body-impl")]
pub mod http_body_impl;

/// `http::Response` body type of [`EtagGuard`](crate::EtagGuard)
#[pin_project(project = EtagGuardResBodyProj)]
#[derive(Debug)]
pub enum EtagGuardResBody<ResBody> {
    Passthrough(#[pin] ResBody),

    /// 304 or 412 response. Should return empty http body
    ShortCircuit,
}

impl<ResBody> EtagGuardResBody<ResBody> {
    pub fn short_circuit_resp(status: StatusCode, headers: HeaderMap) -> http::Response<Self> {
        let mut resp = http::Response::new(Self::ShortCircuit);
        *resp.status_mut() = status;
        *resp.headers_mut() = headers;
        resp
    }

    pub fn passthrough_resp(resp: http::Response<ResBody>) -> http::Response<Self> {
        let (parts, body) = resp.into_parts();
        http::Response::from_parts(parts, Self::Passthrough(body))
    }
}
