//! Streaming endpoint table.
//!
//! Endpoints are named the way they appear in request paths, for example
//! `stream/statuses/filter`, and resolved through a fixed lookup table.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::transport::{Method, StreamRequest};

/// Known streaming endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointId {
    /// `stream/statuses/filter`
    StatusesFilter,
    /// `stream/statuses/sample`
    StatusesSample,
    /// `stream/statuses/firehose`
    StatusesFirehose,
    /// `userstream/user`
    User,
    /// `sitestream/site`
    Site,
}

/// Method, host prefix and path of one endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP method the endpoint expects.
    pub method: Method,
    /// Host prefix, such as `stream`.
    pub subdomain: &'static str,
    /// Path below the API version, without extension.
    pub path: &'static str,
}

const TABLE: [(EndpointId, Endpoint); 5] = [
    (EndpointId::StatusesFilter, Endpoint {
        method: Method::Post,
        subdomain: "stream",
        path: "statuses/filter",
    }),
    (EndpointId::StatusesSample, Endpoint {
        method: Method::Get,
        subdomain: "stream",
        path: "statuses/sample",
    }),
    (EndpointId::StatusesFirehose, Endpoint {
        method: Method::Get,
        subdomain: "stream",
        path: "statuses/firehose",
    }),
    (EndpointId::User, Endpoint {
        method: Method::Get,
        subdomain: "userstream",
        path: "user",
    }),
    (EndpointId::Site, Endpoint {
        method: Method::Get,
        subdomain: "sitestream",
        path: "site",
    }),
];

const API_VERSION: &str = "1.1";

impl EndpointId {
    /// Every endpoint, in table order.
    pub const ALL: [Self; 5] = [
        Self::StatusesFilter,
        Self::StatusesSample,
        Self::StatusesFirehose,
        Self::User,
        Self::Site,
    ];

    /// Table entry for this endpoint.
    #[must_use]
    pub fn endpoint(self) -> Endpoint {
        let index = match self {
            Self::StatusesFilter => 0,
            Self::StatusesSample => 1,
            Self::StatusesFirehose => 2,
            Self::User => 3,
            Self::Site => 4,
        };
        TABLE[index].1
    }

    /// Name in `subdomain/path` form.
    #[must_use]
    pub fn name(self) -> String {
        let endpoint = self.endpoint();
        format!("{}/{}", endpoint.subdomain, endpoint.path)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.name()) }
}

/// Error returned for names missing from the endpoint table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown endpoint {name:?}; expected one of: {valid}")]
pub struct EndpointError {
    name: String,
    valid: String,
}

impl EndpointError {
    fn unknown(name: &str) -> Self {
        let valid = EndpointId::ALL
            .iter()
            .map(|id| id.name())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            name: name.to_owned(),
            valid,
        }
    }

    /// The name that failed to resolve.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }
}

impl FromStr for EndpointId {
    type Err = EndpointError;

    /// Parse `stream/statuses/filter` style names. Leading or trailing
    /// slashes and a `.json` suffix are tolerated.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamwire::endpoint::EndpointId;
    ///
    /// let id: EndpointId = "stream/statuses/sample".parse().unwrap();
    /// assert_eq!(id, EndpointId::StatusesSample);
    /// assert!("stream/statuses/retweet".parse::<EndpointId>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        let trimmed = trimmed.strip_suffix(".json").unwrap_or(trimmed);
        TABLE
            .iter()
            .find(|(_, endpoint)| {
                trimmed
                    .split_once('/')
                    .is_some_and(|(sub, path)| sub == endpoint.subdomain && path == endpoint.path)
            })
            .map(|(id, _)| *id)
            .ok_or_else(|| EndpointError::unknown(s))
    }
}

impl Endpoint {
    /// Production URL.
    ///
    /// ```
    /// use streamwire::endpoint::EndpointId;
    ///
    /// assert_eq!(
    ///     EndpointId::StatusesFilter.endpoint().url(),
    ///     "https://stream.twitter.com/1.1/statuses/filter.json"
    /// );
    /// ```
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "https://{}.twitter.com/{API_VERSION}/{}.json",
            self.subdomain, self.path
        )
    }

    /// URL of the same path on another host, such as a local test server.
    #[must_use]
    pub fn url_on(&self, base: &str) -> String {
        format!(
            "{}/{API_VERSION}/{}.json",
            base.trim_end_matches('/'),
            self.path
        )
    }

    /// A request for this endpoint against production.
    #[must_use]
    pub fn request(&self) -> StreamRequest { StreamRequest::new(self.method, self.url()) }
}
