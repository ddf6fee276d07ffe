use hyper::ext::ReasonPhrase;
use reqwest::blocking::Response as HttpResponse;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{StatusCode, Url, Version};

use crate::error::{Error, Result};

/// Appends a caller-supplied path to the base URL and parses the result.
///
/// The path is not escaped; whatever the URL parser rejects surfaces as
/// [`Error::InvalidUrl`].
pub(crate) fn urljoin(base: &str, path: &str) -> Result<Url> {
    let base = base.trim_end_matches('/');
    let joined = if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };
    Url::parse(&joined).map_err(|e| Error::InvalidUrl {
        url: joined.clone(),
        reason: e.to_string(),
    })
}

/// Status line as received, e.g. `HTTP/1.1 401 Unauthorized`.
///
/// hyper only records the reason phrase when it differs from the canonical one.
pub(crate) fn status_line(resp: &HttpResponse) -> String {
    let reason = resp
        .extensions()
        .get::<ReasonPhrase>()
        .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());
    format_status_line(resp.version(), resp.status(), reason.as_deref())
}

pub(crate) fn format_status_line(version: Version, status: StatusCode, reason: Option<&str>) -> String {
    let reason = reason.or(status.canonical_reason()).unwrap_or("");
    format!("{:?} {} {}", version, status.as_str(), reason)
        .trim_end()
        .to_string()
}

/// Formats headers for wire logging with the bearer token masked.
pub(crate) fn redacted_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(k, v)| {
            if k == AUTHORIZATION {
                format!("{}: Bearer ***", k)
            } else {
                format!("{}: {}", k, v.to_str().unwrap_or("<binary>"))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

const PREVIEW_LIMIT: usize = 512;

/// Short printable preview of a body for wire logging.
pub(crate) fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) if text.len() > PREVIEW_LIMIT => {
            let mut end = PREVIEW_LIMIT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... ({} bytes)", &text[..end], body.len())
        }
        Ok(text) => text.to_string(),
        Err(_) => format!("<{} bytes of binary data>", body.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, HeaderValue};

    #[test]
    fn urljoin_handles_slashes() {
        let u = urljoin("https://api.example.com/", "/portfolios").unwrap();
        assert_eq!(u.as_str(), "https://api.example.com/portfolios");

        let u = urljoin("https://api.example.com/base", "portfolios/3").unwrap();
        assert_eq!(u.as_str(), "https://api.example.com/base/portfolios/3");

        let u = urljoin("https://api.example.com", "/runs?status=done").unwrap();
        assert_eq!(u.query(), Some("status=done"));
    }

    #[test]
    fn urljoin_rejects_unparseable() {
        let err = urljoin("http://[::1", "/x").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn status_line_format() {
        assert_eq!(
            format_status_line(Version::HTTP_11, StatusCode::UNAUTHORIZED, None),
            "HTTP/1.1 401 Unauthorized"
        );
        assert_eq!(
            format_status_line(Version::HTTP_11, StatusCode::LOCKED, Some("Portfolio Busy")),
            "HTTP/1.1 423 Portfolio Busy"
        );
        let unknown = StatusCode::from_u16(599).unwrap();
        assert_eq!(format_status_line(Version::HTTP_11, unknown, None), "HTTP/1.1 599");
    }

    #[test]
    fn token_is_masked() {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        h.insert(ACCEPT, HeaderValue::from_static("*/*"));
        let s = redacted_headers(&h);
        assert!(!s.contains("secret"));
        assert!(s.contains("accept: */*"));
    }

    #[test]
    fn preview_truncates_and_flags_binary() {
        let long = "a".repeat(600);
        assert!(body_preview(long.as_bytes()).ends_with("(600 bytes)"));
        assert_eq!(body_preview(&[0xff, 0xfe]), "<2 bytes of binary data>");
    }
}
