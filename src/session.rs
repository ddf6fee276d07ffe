use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::config::{SessionConfig, validate_content_type};
use crate::dispatch::{Body, Method, MultipartField, Request};
use crate::error::{Error, Result, UpstreamErrorBody};
use crate::response::Dispatched;
use crate::util::{status_line, urljoin};

/// Keycloak password-grant endpoint, relative to the base URL.
pub const TOKEN_PATH: &str = "/keycloak/auth/realms/nrmc/protocol/openid-connect/token";

const CLIENT_ID: &str = "mapi";

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// An authenticated connection to the NRMC API.
///
/// A `Session` only exists once the token exchange has succeeded, so every value of
/// this type carries a bearer token. The password used for the exchange is not kept.
///
/// The token is never refreshed. When it expires, business calls come back as
/// 401/403 responses and the caller has to open a new session.
///
/// Cloning is cheap and clones share the underlying connection pool. Changing the
/// content type takes `&mut self`; callers sharing one session between threads clone
/// it or wrap it in their own lock.
#[derive(Clone)]
pub struct Session {
    base_url: String,
    username: String,
    bearer: HeaderValue,
    timeout: Duration,
    content_type: String,
    debug: bool,

    http: HttpClient,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("bearer", &"***")
            .field("timeout", &self.timeout)
            .field("content_type", &self.content_type)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Session {
    /// Authenticates with default settings (200 ms timeout, JSON content type).
    ///
    /// Use [`SessionConfig`] to change the timeout, content type or debug flag.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self> {
        SessionConfig::new(username, password, url).connect()
    }

    /// Authenticates using `NRMC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        SessionConfig::from_env()?.connect()
    }

    pub(crate) fn connect(cfg: SessionConfig) -> Result<Self> {
        cfg.validate()?;

        let SessionConfig {
            url,
            username,
            password,
            timeout,
            content_type,
            debug,
        } = cfg;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("nrmcapi-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("nrmcapi-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .connection_verbose(debug)
            .build()
            .map_err(Error::Transport)?;

        let token_url = urljoin(&url, TOKEN_PATH)?;
        let timeout_ms = timeout.as_millis() as u64;

        let form = [
            ("grant_type", "password"),
            ("scope", "openid"),
            ("client_id", CLIENT_ID),
            ("username", username.as_str()),
            ("password", password.as_str()),
        ];
        let resp = http
            .post(token_url.clone())
            .form(&form)
            .send()
            .map_err(|e| Error::from_reqwest(e, token_url.as_str(), timeout_ms))?;
        drop(password);

        let status = resp.status();
        let line = status_line(&resp);
        let body = resp
            .bytes()
            .map_err(|e| Error::from_reqwest(e, token_url.as_str(), timeout_ms))?;

        if status != StatusCode::OK {
            tracing::warn!(user = %username, status = %line, "authentication rejected");
            return Err(Error::Auth {
                status,
                status_line: line,
                detail: UpstreamErrorBody::summarize(&body),
            });
        }

        let token = serde_json::from_slice::<TokenResponse>(&body)
            .map_err(|e| Error::InvalidTokenResponse(format!("body is not a token JSON object: {}", e)))?
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidTokenResponse("missing access_token".into()))?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::InvalidTokenResponse("access_token is not a valid header value".into()))?;
        bearer.set_sensitive(true);

        tracing::info!(user = %username, url = %url, "authenticated");

        Ok(Self {
            base_url: url.trim().trim_end_matches('/').to_string(),
            username,
            bearer,
            timeout,
            content_type,
            debug,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Changes the `Content-Type` sent on subsequent calls.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> Result<()> {
        let content_type = content_type.into();
        validate_content_type(&content_type)?;
        self.content_type = content_type;
        Ok(())
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Result<Self> {
        self.set_content_type(content_type)?;
        Ok(self)
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    pub(crate) fn bearer(&self) -> &HeaderValue {
        &self.bearer
    }

    /// Sends one request. Non-2xx statuses are returned, not raised.
    pub fn dispatch(&self, request: &Request) -> Result<Dispatched> {
        crate::dispatch::execute(self, request)
    }

    pub fn get(&self, path: &str) -> Result<Dispatched> {
        self.dispatch(&Request::new(Method::Get, path))
    }

    /// Posts a raw JSON string, sent verbatim.
    pub fn post(&self, path: &str, json: impl Into<String>) -> Result<Dispatched> {
        self.dispatch(&Request::new(Method::Post, path).json(json))
    }

    /// PUT is always sent without a body.
    pub fn put(&self, path: &str) -> Result<Dispatched> {
        self.dispatch(&Request::new(Method::Put, path))
    }

    pub fn delete(&self, path: &str, json: Option<&str>) -> Result<Dispatched> {
        let request = Request::new(Method::Delete, path);
        let request = match json {
            Some(body) => request.json(body),
            None => request,
        };
        self.dispatch(&request)
    }

    /// Uploads a file as multipart form data with `file` and `type` fields.
    pub fn upload(&self, path: &str, file: impl AsRef<Path>, mime: &str) -> Result<Dispatched> {
        let fields = vec![
            MultipartField::file("file", file.as_ref()),
            MultipartField::text("type", mime),
        ];
        self.dispatch(&Request::new(Method::Post, path).with_body(Body::Multipart(fields)))
    }
}
