//! Deserializable configuration for [`ConditionalEtag`], e.g. from a settings file:
//!
//! ```toml
//! weak = false
//!
//! [extra_headers]
//! cache-control = "public, max-age=30"
//! ```

use std::{collections::BTreeMap, error::Error, fmt::Display};

use http::{
    header::{InvalidHeaderName, InvalidHeaderValue},
    HeaderName, HeaderValue,
};
use serde::Deserialize;

use crate::ConditionalEtag;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EtagGuardConfig {
    #[serde(default = "default_weak")]
    pub weak: bool,

    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

fn default_weak() -> bool {
    true
}

impl Default for EtagGuardConfig {
    fn default() -> Self {
        Self {
            weak: default_weak(),
            extra_headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidHeaderName(InvalidHeaderName),
    InvalidHeaderValue(InvalidHeaderValue),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHeaderName(e) => write!(f, "invalid extra header name: {e}"),
            Self::InvalidHeaderValue(e) => write!(f, "invalid extra header value: {e}"),
        }
    }
}

impl Error for ConfigError {}

impl TryFrom<EtagGuardConfig> for ConditionalEtag {
    type Error = ConfigError;

    fn try_from(config: EtagGuardConfig) -> Result<Self, Self::Error> {
        let mut conditional = ConditionalEtag::new().weak(config.weak);
        for (name, value) in config.extra_headers {
            let name =
                HeaderName::try_from(name.as_str()).map_err(ConfigError::InvalidHeaderName)?;
            let value =
                HeaderValue::try_from(value.as_str()).map_err(ConfigError::InvalidHeaderValue)?;
            conditional = conditional.extra_header(name, value);
        }
        Ok(conditional)
    }
}
