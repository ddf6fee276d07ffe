//! Generic request dispatcher.
//!
//! Every call goes through [`execute`]: join the path onto the session's base URL,
//! apply the per-method body policy, send one blocking request and normalize the
//! response body. Transport failures are errors; upstream 4xx/5xx statuses are not.

use reqwest::blocking::multipart::Form;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::response::{Dispatched, Response};
use crate::session::Session;
use crate::util::{body_preview, redacted_headers, status_line, urljoin};

const WIRE: &str = "nrmcapi::wire";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Decides what actually goes on the wire for `body`.
    ///
    /// GET and PUT never carry a body. POST sends multipart fields or the raw JSON
    /// string. DELETE sends a non-empty raw body and nothing otherwise.
    fn payload(self, body: &Body) -> Payload<'_> {
        match (self, body) {
            (_, Body::None) => Payload::None,
            (Method::Get | Method::Put, _) => Payload::None,
            (Method::Post, Body::Json(json)) => Payload::Raw(json),
            (Method::Post, Body::Multipart(fields)) if fields.is_empty() => Payload::None,
            (Method::Post, Body::Multipart(fields)) => Payload::Multipart(fields),
            (Method::Delete, Body::Json(json)) if json.is_empty() => Payload::None,
            (Method::Delete, Body::Json(json)) => Payload::Raw(json),
            (Method::Delete, Body::Multipart(_)) => Payload::None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One field of a multipart/form-data body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartField {
    Text { name: String, value: String },
    /// File contents are read from `path` when the request is built.
    File { name: String, path: PathBuf },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        MultipartField::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        MultipartField::File {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Request body as supplied by the caller, before the method's body policy applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    None,
    /// Raw JSON text, sent verbatim and never parsed.
    Json(String),
    Multipart(Vec<MultipartField>),
}

impl Body {
    fn is_empty(&self) -> bool {
        match self {
            Body::None => true,
            Body::Json(s) => s.is_empty(),
            Body::Multipart(fields) => fields.is_empty(),
        }
    }
}

enum Payload<'a> {
    None,
    Raw(&'a str),
    Multipart(&'a [MultipartField]),
}

/// A request descriptor. Built per call and not stored by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Appended to the session's base URL as-is.
    pub path: String,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Body::None,
        }
    }

    pub fn json(self, json: impl Into<String>) -> Self {
        self.with_body(Body::Json(json.into()))
    }

    pub fn multipart(self, fields: Vec<MultipartField>) -> Self {
        self.with_body(Body::Multipart(fields))
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    fn payload(&self) -> Payload<'_> {
        let payload = self.method.payload(&self.body);
        if matches!(payload, Payload::None) && !self.body.is_empty() {
            tracing::warn!(
                method = %self.method,
                path = %self.path,
                "request body ignored: {} requests are sent without this body",
                self.method
            );
        }
        payload
    }
}

/// Sends one request described by plain arguments.
///
/// `method` is matched case-insensitively. For POST, non-empty `multipart` fields take
/// precedence over `body`. GET and PUT never send a body.
pub fn dispatch(
    session: &Session,
    method: &str,
    path: &str,
    body: Option<&str>,
    multipart: &[MultipartField],
) -> Result<Dispatched> {
    let method: Method = method.parse()?;
    let body = select_body(method, path, body, multipart);
    execute(session, &Request::new(method, path).with_body(body))
}

fn select_body(method: Method, path: &str, body: Option<&str>, multipart: &[MultipartField]) -> Body {
    if multipart.is_empty() {
        return body.map(|b| Body::Json(b.to_string())).unwrap_or_default();
    }
    if body.is_some_and(|b| !b.is_empty()) {
        tracing::warn!(%method, path, "JSON body ignored: multipart fields were supplied");
    }
    Body::Multipart(multipart.to_vec())
}

fn build_form(fields: &[MultipartField]) -> Result<Form> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
            MultipartField::File { name, path } => {
                form.file(name.clone(), path).map_err(|source| Error::Io {
                    path: path.display().to_string(),
                    source,
                })?
            }
        };
    }
    Ok(form)
}

pub(crate) fn execute(session: &Session, request: &Request) -> Result<Dispatched> {
    let url = urljoin(session.base_url(), &request.path)?;
    let timeout_ms = session.timeout().as_millis() as u64;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(AUTHORIZATION, session.bearer().clone());

    let payload = request.payload();
    // Multipart bodies carry their own Content-Type with the boundary.
    if !matches!(payload, Payload::Multipart(_)) {
        let content_type = HeaderValue::from_str(session.content_type())
            .map_err(|_| Error::Config(format!("invalid content type [{}]", session.content_type())))?;
        headers.insert(CONTENT_TYPE, content_type);
    }

    if session.debug() {
        let body = match &payload {
            Payload::None => String::new(),
            Payload::Raw(raw) => body_preview(raw.as_bytes()),
            Payload::Multipart(fields) => format!("<multipart: {} field(s)>", fields.len()),
        };
        tracing::info!(
            target: WIRE,
            method = %request.method,
            url = %url,
            headers = %redacted_headers(&headers),
            body = %body,
            ">> request"
        );
    }

    let builder = session
        .http()
        .request(request.method.into(), url.clone())
        .headers(headers);
    let builder = match payload {
        Payload::None => builder,
        Payload::Raw(raw) => builder.body(raw.to_string()),
        Payload::Multipart(fields) => builder.multipart(build_form(fields)?),
    };

    let resp = builder
        .send()
        .map_err(|e| Error::from_reqwest(e, url.as_str(), timeout_ms))?;

    let line = status_line(&resp);
    let status = resp.status();
    let resp_headers = resp.headers().clone();
    let body = resp
        .bytes()
        .map_err(|e| Error::from_reqwest(e, url.as_str(), timeout_ms))?
        .to_vec();

    tracing::debug!(method = %request.method, url = %url, status = %status, bytes = body.len(), "dispatched");

    let response = Response::new(url.to_string(), line, status, resp_headers, body);

    if session.debug() {
        tracing::info!(
            target: WIRE,
            status = %response.status_line(),
            headers = %redacted_headers(response.headers()),
            body = %body_preview(response.body()),
            "<< response"
        );
    }

    Ok(Dispatched::from_response(response))
}
