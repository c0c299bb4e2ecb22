use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};
use tower_layer::Layer;

use crate::{ConditionalEtag, EtagGuard};

/// [`Layer`] that wraps each service in an [`EtagGuard`] sharing the same
/// generator and configuration.
///
/// Generated etags are weak unless [`strong()`](Self::strong) is called.
#[derive(Clone, Debug)]
pub struct EtagGuardLayer<G> {
    generator: G,
    conditional: Arc<ConditionalEtag>,
}

impl<G> EtagGuardLayer<G> {
    pub fn new(generator: G) -> Self {
        Self::with_conditional(generator, ConditionalEtag::default())
    }

    pub fn with_conditional(generator: G, conditional: ConditionalEtag) -> Self {
        Self {
            generator,
            conditional: Arc::new(conditional),
        }
    }

    pub fn weak(self, weak: bool) -> Self {
        self.map_conditional(|c| c.weak(weak))
    }

    pub fn strong(self) -> Self {
        self.weak(false)
    }

    pub fn extra_header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.map_conditional(|c| c.extra_header(name, value))
    }

    pub fn extra_headers(self, headers: HeaderMap) -> Self {
        self.map_conditional(|c| c.extra_headers(headers))
    }

    fn map_conditional(self, f: impl FnOnce(ConditionalEtag) -> ConditionalEtag) -> Self {
        let conditional = Arc::unwrap_or_clone(self.conditional);
        Self {
            generator: self.generator,
            conditional: Arc::new(f(conditional)),
        }
    }
}

impl<G: Clone, S> Layer<S> for EtagGuardLayer<G> {
    type Service = EtagGuard<G, S>;

    fn layer(&self, inner: S) -> Self::Service {
        EtagGuard {
            generator: self.generator.clone(),
            conditional: Arc::clone(&self.conditional),
            inner,
        }
    }
}
