//! Implementation of `http_body::Body` for `EtagGuardResBody`
//! for `ResBody` types that yield `bytes::Bytes` data.
//!
//! This allows the middleware to be easily used with axum 0.7.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use super::{EtagGuardResBody, EtagGuardResBodyProj};

impl<ResBody: Body<Data = Bytes>> Body for EtagGuardResBody<ResBody> {
    /// Data has to be Bytes due to axum's blanket IntoResponse impl
    /// for Response<B: Body<Data = Bytes>>
    type Data = Bytes;

    type Error = ResBody::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            EtagGuardResBodyProj::Passthrough(b) => b.poll_frame(cx),
            EtagGuardResBodyProj::ShortCircuit => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Passthrough(b) => b.is_end_stream(),
            Self::ShortCircuit => true,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Passthrough(b) => b.size_hint(),
            Self::ShortCircuit => SizeHint::with_exact(0),
        }
    }
}
