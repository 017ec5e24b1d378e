use std::cmp::Ordering;

use regex::Regex;

use crate::error::{FakeError, Result};
use crate::mock::Mock;
use crate::request::FakeRequest;

/// How a rule pattern is matched, decided from its syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// A bare token: the issuing client's name.
    ClientName,
    /// A URL with `*` wildcards, scheme optional.
    UrlWildcard,
    /// `client#/path/*`: the client name and the request path.
    ClientScopedPath,
}

impl MatchStrategy {
    pub fn of(pattern: &str) -> Self {
        if pattern.contains('#') {
            Self::ClientScopedPath
        } else if pattern == "*"
            || pattern.starts_with("http")
            || pattern.contains(['.', '/', ':'])
        {
            Self::UrlWildcard
        } else {
            Self::ClientName
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    Client(String),
    Url(Regex),
    ScopedPath { client: String, path: Regex },
}

impl Matcher {
    pub(crate) fn compile(pattern: &str) -> Result<Self> {
        let compiled = match MatchStrategy::of(pattern) {
            MatchStrategy::ClientName => Ok(Self::Client(pattern.to_string())),
            MatchStrategy::UrlWildcard => url_regex(pattern).map(Self::Url),
            MatchStrategy::ClientScopedPath => {
                let (client, path) = pattern.split_once('#').unwrap_or((pattern, ""));
                Regex::new(&format!("^{}$", wildcard(path))).map(|path| Self::ScopedPath {
                    client: client.to_string(),
                    path,
                })
            }
        };
        compiled.map_err(|source| invalid(pattern, source))
    }

    /// Compile `pattern` as a URL wildcard whatever its shape, so `localhost` names a host.
    pub(crate) fn url(pattern: &str) -> Result<Self> {
        url_regex(pattern)
            .map(Self::Url)
            .map_err(|source| invalid(pattern, source))
    }

    pub(crate) fn matches(&self, request: &FakeRequest) -> bool {
        match self {
            Self::Client(name) => request.client_name() == Some(name.as_str()),
            Self::Url(regex) => {
                let url = request.url().as_str();
                regex.is_match(url) || (is_root(request) && regex.is_match(url.trim_end_matches('/')))
            }
            Self::ScopedPath { client, path } => {
                request.client_name() == Some(client.as_str()) && path.is_match(request.path())
            }
        }
    }
}

fn invalid(pattern: &str, source: regex::Error) -> FakeError {
    FakeError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    }
}

fn is_root(request: &FakeRequest) -> bool {
    request.path() == "/" && request.url().query().is_none() && request.url().fragment().is_none()
}

/// Escape everything but `*`, which becomes `.*`.
fn wildcard(pattern: &str) -> String {
    pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}

fn url_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    if pattern.contains("://") {
        Regex::new(&format!("^{}$", wildcard(pattern)))
    } else {
        Regex::new(&format!("^(https?://)?{}$", wildcard(pattern)))
    }
}

/// A registered pattern and the mock it answers with.
#[derive(Debug, Clone)]
pub struct FakeRule {
    pattern: String,
    matcher: Matcher,
    mock:    Mock,
}

impl FakeRule {
    pub fn new(pattern: impl Into<String>, mock: impl Into<Mock>) -> Result<Self> {
        let pattern = pattern.into();
        Ok(Self {
            matcher: Matcher::compile(&pattern)?,
            pattern,
            mock: mock.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn strategy(&self) -> MatchStrategy {
        MatchStrategy::of(&self.pattern)
    }

    pub fn mock(&self) -> &Mock {
        &self.mock
    }

    pub fn matches(&self, request: &FakeRequest) -> bool {
        self.matcher.matches(request)
    }

    /// Precedence: longer patterns first, then fewer wildcards, then lexical order.
    pub fn specificity(&self, other: &Self) -> Ordering {
        other
            .pattern
            .len()
            .cmp(&self.pattern.len())
            .then_with(|| wildcards(&self.pattern).cmp(&wildcards(&other.pattern)))
            .then_with(|| self.pattern.cmp(&other.pattern))
    }
}

fn wildcards(pattern: &str) -> usize {
    pattern.matches('*').count()
}
