// Error type must implement std::Error else axum will throw
// `the trait bound HandleError<...> is not satisfied`

use std::{
    error::Error,
    fmt::{Debug, Display},
};

use crate::InvalidEtag;

#[derive(Debug)]
pub enum EtagGuardServiceError<GenerateError, InnerError> {
    /// The etag generator failed, propagated as is
    GenerateError(GenerateError),
    InnerError(InnerError),
    InvalidEtag(InvalidEtag),
}

impl<GenerateError: Display, InnerError: Display> Display
    for EtagGuardServiceError<GenerateError, InnerError>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenerateError(e) => write!(f, "etag generation failed: {e}"),
            Self::InnerError(e) => Display::fmt(e, f),
            Self::InvalidEtag(e) => Display::fmt(e, f),
        }
    }
}

impl<GenerateError, InnerError> Error for EtagGuardServiceError<GenerateError, InnerError>
where
    GenerateError: Debug + Display,
    InnerError: Debug + Display,
{
}
