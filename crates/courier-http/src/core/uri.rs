use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::{Url, form_urlencoded};

use crate::error::{Error, Result};

static URL_PARAM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]*)\}").unwrap());

/// Whether `uri` carries its own scheme and therefore ignores the base URL.
pub fn is_absolute(uri: &str) -> bool {
    uri.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Prefix a relative `uri` with `base`, joined by exactly one `/`.
///
/// # Examples
///
/// ```
/// use courier_http::core::join_base;
///
/// assert_eq!(join_base("https://a.test/v1/", "/users"), "https://a.test/v1/users");
/// assert_eq!(join_base("https://a.test", "https://b.test/x"), "https://b.test/x");
/// assert_eq!(join_base("", "/users"), "/users");
/// ```
pub fn join_base(base: &str, uri: &str) -> String {
    if base.is_empty() || is_absolute(uri) {
        return uri.to_string();
    }
    if uri.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        uri.trim_start_matches('/')
    )
}

/// Replace `{key}` tokens left to right with bound values.
///
/// Unbound tokens are left untouched, braces included.
///
/// ```
/// use std::collections::HashMap;
/// use courier_http::core::expand_url_params;
///
/// let params = HashMap::from([("id".to_string(), "42".to_string())]);
/// assert_eq!(expand_url_params("/users/{id}/{tab}", &params), "/users/42/{tab}");
/// ```
pub fn expand_url_params(template: &str, params: &HashMap<String, String>) -> String {
    if params.is_empty() {
        return template.to_string();
    }
    URL_PARAM_REGEX
        .replace_all(template, |caps: &Captures<'_>| match params.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Append form-encoded `params` to the URL's query.
///
/// An existing non-empty raw query is kept and the parameters follow it after `&`.
pub fn merge_query(url: &mut Url, params: &[(String, String)]) {
    if params.is_empty() {
        return;
    }
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let merged = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
        _ => encoded,
    };
    url.set_query(Some(&merged));
}

/// Build the final request URL: base prefix, `{key}` expansion, parse, query merge.
pub fn build_url(
    base: &str,
    uri: &str,
    url_params: &HashMap<String, String>,
    query: &[(String, String)],
) -> Result<Url> {
    let raw = expand_url_params(&join_base(base, uri), url_params);
    let mut url = Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })?;
    merge_query(&mut url, query);
    Ok(url)
}
