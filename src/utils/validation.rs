//! Input validation helpers

use url::Url;

/// True when `raw` parses as an absolute http(s) URL.
pub fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
