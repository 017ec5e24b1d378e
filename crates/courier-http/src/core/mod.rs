//! Core layer: pure transformations used when building requests and reading responses.

mod cookie;
mod uri;

pub use cookie::{cookie_header, parse_cookie_header, parse_set_cookie};
pub use uri::{build_url, expand_url_params, is_absolute, join_base, merge_query};
