use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, UpstreamErrorBody};
use crate::table::{Table, tabularize};

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    url: String,
    status: StatusCode,
    status_line: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub(crate) fn new(
        url: String,
        status_line: String,
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Self {
        Self {
            url,
            status_line,
            status,
            headers,
            body,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Status line as received, e.g. `HTTP/1.1 404 Not Found`.
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Raw body bytes. Binary payloads such as zip downloads are left untouched.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turns a non-2xx status into [`Error::Request`].
    ///
    /// Dispatch never does this on its own; call it when an upstream failure should
    /// abort the caller's flow.
    pub fn error_for_status(&self) -> Result<&Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(Error::Request {
            status: self.status,
            status_line: self.status_line.clone(),
            url: self.url.clone(),
            detail: UpstreamErrorBody::summarize(&self.body),
        })
    }

    /// Writes the raw body to `target`, creating parent directories as needed.
    pub fn save_to(&self, target: &Path) -> Result<PathBuf> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        std::fs::write(target, &self.body).map_err(|source| Error::Io {
            path: target.display().to_string(),
            source,
        })?;
        Ok(target.to_path_buf())
    }

    fn has_empty_body(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Normalizes the body: empty sentinel, table, or passthrough.
    pub(crate) fn normalize(&self) -> NormalizedData {
        if self.has_empty_body() {
            return NormalizedData::Empty;
        }
        let value: Value = match serde_json::from_slice(&self.body) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "body is not JSON, passing through");
                return NormalizedData::Passthrough;
            }
        };
        match tabularize(&value) {
            Ok(table) => NormalizedData::Table(table),
            Err(e) => {
                tracing::debug!(url = %self.url, reason = %e, "body is not tabular, passing through");
                NormalizedData::Passthrough
            }
        }
    }
}

/// Shape of a dispatched response body.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedData {
    /// The body was empty.
    Empty,
    /// The body was flat JSON and became a table.
    Table(Table),
    /// The body could not be tabularized (nested JSON, binary, text); read
    /// [`Dispatched::response`] instead.
    Passthrough,
}

impl NormalizedData {
    pub fn is_empty(&self) -> bool {
        matches!(self, NormalizedData::Empty)
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            NormalizedData::Table(t) => Some(t),
            _ => None,
        }
    }
}

/// Result of one dispatch: the normalized body plus the raw response.
///
/// Returned for every status code the server sends, 4xx/5xx included.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub data: NormalizedData,
    pub response: Response,
}

impl Dispatched {
    pub(crate) fn from_response(response: Response) -> Self {
        Self {
            data: response.normalize(),
            response,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn table(&self) -> Option<&Table> {
        self.data.as_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::format_status_line;
    use reqwest::Version;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn response(status: u16, body: &[u8]) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let status = StatusCode::from_u16(status).unwrap();
        Response::new(
            "http://localhost/x".to_string(),
            format_status_line(Version::HTTP_11, status, None),
            status,
            headers,
            body.to_vec(),
        )
    }

    #[test]
    fn empty_and_whitespace_bodies_are_empty() {
        assert_eq!(response(204, b"").normalize(), NormalizedData::Empty);
        assert_eq!(response(200, b" \n").normalize(), NormalizedData::Empty);
    }

    #[test]
    fn flat_object_becomes_table() {
        let data = response(200, br#"{"id":3,"name":"EU flood"}"#).normalize();
        let table = data.as_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "id"), Some(&json!(3)));
    }

    #[test]
    fn nested_and_binary_pass_through() {
        assert_eq!(
            response(200, br#"{"run":{"id":1,"layers":[1,2]}}"#).normalize(),
            NormalizedData::Passthrough
        );
        assert_eq!(
            response(200, &[0x50, 0x4b, 0x03, 0x04, 0x00]).normalize(),
            NormalizedData::Passthrough
        );
    }

    #[test]
    fn error_for_status_keeps_upstream_message() {
        let resp = response(404, br#"{"message":"portfolio not found"}"#);
        match resp.error_for_status() {
            Err(Error::Request { status, status_line, detail, .. }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(status_line, "HTTP/1.1 404 Not Found");
                assert_eq!(detail.as_deref(), Some("portfolio not found"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(response(200, b"").error_for_status().is_ok());
    }

    #[test]
    fn save_to_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out").join("results.zip");
        let bytes = [0x50, 0x4b, 0x03, 0x04];
        let resp = response(200, &bytes);
        let saved = resp.save_to(&target).unwrap();
        assert_eq!(std::fs::read(saved).unwrap(), bytes);
        assert_eq!(resp.into_body(), bytes);
    }

    #[test]
    fn json_helper_decodes_body() {
        let v: Value = response(200, br#"{"a":[1]}"#).json().unwrap();
        assert_eq!(v["a"][0], 1);
        assert!(matches!(response(200, b"nope").json::<Value>(), Err(Error::Json(_))));
    }
}
