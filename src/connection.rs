//! Connection-string parsing.
//!
//! Every scheme shares the shape `scheme://host[:port]/path?query`. The parser
//! only splits the string; interpreting host, bucket and parameters is left to
//! each backend's config (see [`crate::config`]).

use std::collections::HashMap;
use std::num::NonZeroUsize;

use url::Url;

use crate::errors::{KvdbError, KvdbResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    uri: String,
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    bucket: Option<String>,
    params: HashMap<String, String>,
}

impl ConnectionString {
    pub fn parse(uri: &str) -> KvdbResult<Self> {
        let url = Url::parse(uri)?;

        let bucket = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string);

        // The first occurrence of a parameter wins.
        let mut params = HashMap::new();
        for (name, value) in url.query_pairs() {
            params
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        Ok(Self {
            uri: uri.to_string(),
            scheme: url.scheme().to_string(),
            host: url
                .host_str()
                .filter(|h| !h.is_empty())
                .map(str::to_string),
            port: url.port(),
            password: url.password().map(str::to_string),
            bucket,
            params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `host[:port]`, if a host is present.
    pub fn address(&self) -> Option<String> {
        self.host.as_ref().map(|host| match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        })
    }

    /// Last non-empty path segment: the bucket, hash key or label.
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// The `password` query parameter, falling back to the userinfo password.
    pub fn password(&self) -> Option<&str> {
        self.param("password").or(self.password.as_deref())
    }

    /// A query parameter, treating an empty value as absent.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn int_param(&self, name: &'static str) -> KvdbResult<Option<i64>> {
        self.param(name)
            .map(|raw| {
                raw.parse::<i64>().map_err(|_| KvdbError::InvalidParameter {
                    name,
                    value: raw.to_string(),
                })
            })
            .transpose()
    }

    /// The `count` parameter. Present but not a positive integer is an error.
    pub fn page_size(&self) -> KvdbResult<Option<NonZeroUsize>> {
        let Some(raw) = self.param("count") else {
            return Ok(None);
        };
        raw.parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Some)
            .ok_or_else(|| KvdbError::InvalidParameter {
                name: "count",
                value: raw.to_string(),
            })
    }
}

impl std::str::FromStr for ConnectionString {
    type Err = KvdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
