//! Upstream API base URLs.

use std::fmt;
use std::str::FromStr;

/// An upstream service reachable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    LibrisXsearch,
    LibrisXl,
    LibrisOaipmh,
    LibrisSparql,
    Ksamsok,
    KbData,
    Swepub,
    Idkb,
}

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Endpoint::LibrisXsearch,
        Endpoint::LibrisXl,
        Endpoint::LibrisOaipmh,
        Endpoint::LibrisSparql,
        Endpoint::Ksamsok,
        Endpoint::KbData,
        Endpoint::Swepub,
        Endpoint::Idkb,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::LibrisXsearch => "libris_xsearch",
            Endpoint::LibrisXl => "libris_xl",
            Endpoint::LibrisOaipmh => "libris_oaipmh",
            Endpoint::LibrisSparql => "libris_sparql",
            Endpoint::Ksamsok => "ksamsok",
            Endpoint::KbData => "kb_data",
            Endpoint::Swepub => "swepub",
            Endpoint::Idkb => "idkb",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            // Swepub is served through the Libris xsearch API.
            Endpoint::LibrisXsearch | Endpoint::Swepub => "https://libris.kb.se/xsearch",
            Endpoint::LibrisXl => "https://libris.kb.se",
            Endpoint::LibrisOaipmh => "https://libris.kb.se/api/oaipmh/",
            Endpoint::LibrisSparql => "https://libris.kb.se/api/sparql/",
            Endpoint::Ksamsok => "https://kulturarvsdata.se/ksamsok/api",
            Endpoint::KbData => "https://data.kb.se",
            Endpoint::Idkb => "https://id.kb.se",
        }
    }

    /// `path` joined onto the base URL with exactly one slash between.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return self.base_url().to_string();
        }
        format!("{}/{}", self.base_url().trim_end_matches('/'), path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown endpoint: {0}")]
pub struct UnknownEndpoint(pub String);

impl FromStr for Endpoint {
    type Err = UnknownEndpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| UnknownEndpoint(s.to_string()))
    }
}
