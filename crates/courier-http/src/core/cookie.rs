use crate::data::Cookie;

/// Render cookies as a single `Cookie` request header value.
pub fn cookie_header(cookies: &[Cookie]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(Cookie::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Parse a `Cookie` request header (`a=1; b=2`).
pub fn parse_cookie_header(value: &str) -> Vec<Cookie> {
    value.split(';').filter_map(parse_pair).collect()
}

/// Parse the leading `name=value` of a `Set-Cookie` header, ignoring attributes.
pub fn parse_set_cookie(value: &str) -> Option<Cookie> {
    value.split(';').next().and_then(parse_pair)
}

fn parse_pair(pair: &str) -> Option<Cookie> {
    let (name, value) = pair.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Cookie::new(name, value.trim().trim_matches('"')))
}
