use http::Method;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    /// `{name}` or `:name`, matches any single non-empty segment
    Param,
}

/// Identifies a route by method and path template, e.g. `GET /hello/{name}`.
///
/// Parameter names are ignored: `/items/{id}` and `/items/:item_id` are the same route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    method: Method,
    segments: Vec<Segment>,
}

impl RouteKey {
    pub fn new(method: Method, path: &str) -> Self {
        let segments = path
            .split('/')
            .map(|s| {
                let is_param = (s.starts_with('{') && s.ends_with('}') && s.len() > 1)
                    || (s.starts_with(':') && s.len() > 1);
                if is_param {
                    Segment::Param
                } else {
                    Segment::Literal(s.to_owned())
                }
            })
            .collect();
        Self { method, segments }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// True if the template has no parameter segments
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Whether a request with the given method and uri path is for this route.
    ///
    /// Paths must have the same number of segments, trailing slashes included.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if self.method != method {
            return false;
        }
        let mut path_segments = path.split('/');
        for segment in &self.segments {
            let s = match path_segments.next() {
                Some(s) => s,
                None => return false,
            };
            let segment_matches = match segment {
                Segment::Literal(l) => l == s,
                Segment::Param => !s.is_empty(),
            };
            if !segment_matches {
                return false;
            }
        }
        path_segments.next().is_none()
    }
}
