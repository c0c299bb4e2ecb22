use std::{error::Error, fmt::Display};

use http::{
    header::{IF_MATCH, IF_NONE_MATCH},
    HeaderMap, HeaderValue,
};

/// The generated ETag could not be turned into a `HeaderValue`,
/// e.g. because it contains control characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEtag {
    pub etag: String,
}

impl Display for InvalidEtag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "generated etag {:?} is not a valid header value", self.etag)
    }
}

impl Error for InvalidEtag {}

/// Quotes the raw generated token, prefixing it with `W/` if `weak`.
///
/// `None` and the empty string both mean the generator has no opinion
/// on this response, and result in `Ok(None)`.
/// The normalized etag of the resource, inserted into the request extensions
/// before it is passed on to the inner service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentEtag(pub HeaderValue);

pub fn normalize_etag(raw: Option<&str>, weak: bool) -> Result<Option<HeaderValue>, InvalidEtag> {
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };
    let quoted = if weak {
        format!("W/\"{raw}\"")
    } else {
        format!("\"{raw}\"")
    };
    HeaderValue::try_from(quoted)
        .map(Some)
        .map_err(|_| InvalidEtag {
            etag: raw.to_owned(),
        })
}

/// The conditional request header the decision is made on.
///
/// `If-None-Match` takes precedence: `If-Match` is only looked at
/// if `If-None-Match` is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition<'a> {
    IfNoneMatch(&'a HeaderValue),
    IfMatch(&'a HeaderValue),
}

impl<'a> Precondition<'a> {
    /// Returns None if neither header is present.
    /// Only the first value of a repeated header is considered.
    pub fn from_headers(headers: &'a HeaderMap) -> Option<Self> {
        if let Some(v) = headers.get(IF_NONE_MATCH) {
            return Some(Self::IfNoneMatch(v));
        }
        headers.get(IF_MATCH).map(Self::IfMatch)
    }

    pub fn client_etag(&self) -> &'a HeaderValue {
        match self {
            Self::IfNoneMatch(v) | Self::IfMatch(v) => v,
        }
    }
}

/// Exact byte comparison of the normalized etag against the client's value.
///
/// No etag is always considered modified, it can never match anything.
pub fn is_modified(etag: Option<&HeaderValue>, client_etag: &HeaderValue) -> bool {
    etag.map_or(true, |e| e != client_etag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_etag_is_prefixed_and_quoted() {
        let etag = normalize_etag(Some("foo"), true).unwrap().unwrap();
        assert_eq!(etag, "W/\"foo\"");
    }

    #[test]
    fn strong_etag_is_quoted() {
        let etag = normalize_etag(Some("etagforfoo"), false).unwrap().unwrap();
        assert_eq!(etag, "\"etagforfoo\"");
    }

    #[test]
    fn empty_and_missing_etag_normalize_to_none() {
        assert_eq!(normalize_etag(None, true), Ok(None));
        assert_eq!(normalize_etag(Some(""), true), Ok(None));
        assert_eq!(normalize_etag(Some(""), false), Ok(None));
    }

    #[test]
    fn control_characters_are_rejected() {
        let err = normalize_etag(Some("foo\nbar"), true).unwrap_err();
        assert_eq!(err.etag, "foo\nbar");
    }

    #[test]
    fn if_none_match_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_static("W/\"a\""));
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("W/\"b\""));
        let precondition = Precondition::from_headers(&headers).unwrap();
        assert!(matches!(precondition, Precondition::IfNoneMatch(_)));
        assert_eq!(precondition.client_etag(), "W/\"b\"");
    }

    #[test]
    fn if_match_used_when_if_none_match_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_static("\"a\""));
        assert_eq!(
            Precondition::from_headers(&headers),
            Some(Precondition::IfMatch(&HeaderValue::from_static("\"a\"")))
        );
    }

    #[test]
    fn no_precondition_without_headers() {
        assert_eq!(Precondition::from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::HeaderName::from_bytes(b"If-None-Match").unwrap(),
            HeaderValue::from_static("\"x\""),
        );
        assert!(matches!(
            Precondition::from_headers(&headers),
            Some(Precondition::IfNoneMatch(_))
        ));
    }

    #[test]
    fn modified_compares_exactly() {
        let etag = HeaderValue::from_static("W/\"foo\"");
        assert!(!is_modified(Some(&etag), &HeaderValue::from_static("W/\"foo\"")));
        assert!(is_modified(Some(&etag), &HeaderValue::from_static("\"foo\"")));
        assert!(is_modified(Some(&etag), &HeaderValue::from_static("W/\"foo\", W/\"bar\"")));
        assert!(is_modified(Some(&etag), &HeaderValue::from_static("*")));
    }

    #[test]
    fn missing_etag_is_always_modified() {
        assert!(is_modified(None, &HeaderValue::from_static("")));
        assert!(is_modified(None, &HeaderValue::from_static("W/\"foo\"")));
    }
}
