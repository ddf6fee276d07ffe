use reqwest::Url;
use reqwest::header::HeaderValue;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::session::Session;

/// Default timeout. Deliberately short; callers on slow networks must raise it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Default `Content-Type` sent on business calls.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

const ENV_URL: &str = "NRMC_URL";
const ENV_USERNAME: &str = "NRMC_USERNAME";
const ENV_PASSWORD: &str = "NRMC_PASSWORD";
const ENV_TIMEOUT_MS: &str = "NRMC_TIMEOUT_MS";
const ENV_CONTENT_TYPE: &str = "NRMC_CONTENT_TYPE";
const ENV_DEBUG: &str = "NRMC_DEBUG";

/// Everything needed to open a [`Session`].
///
/// The password lives here only until [`SessionConfig::connect`] has run the token
/// exchange; the resulting session keeps the bearer token, not the password.
#[derive(Clone)]
pub struct SessionConfig {
    pub(crate) url: String,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) timeout: Duration,
    pub(crate) content_type: String,
    pub(crate) debug: bool,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .field("content_type", &self.content_type)
            .field("debug", &self.debug)
            .finish()
    }
}

impl SessionConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            debug: false,
        }
    }

    /// Builds a configuration from `NRMC_*` environment variables.
    ///
    /// This is equivalent to `SessionConfig::resolve(None, None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::resolve(None, None, None)
    }

    /// Resolves a configuration using (in order of precedence):
    /// - explicit `username`/`password`/`url` arguments
    /// - environment variables `NRMC_USERNAME` / `NRMC_PASSWORD` / `NRMC_URL`
    ///
    /// `NRMC_TIMEOUT_MS`, `NRMC_CONTENT_TYPE` and `NRMC_DEBUG` override the defaults.
    pub fn resolve(
        username: Option<String>,
        password: Option<String>,
        url: Option<String>,
    ) -> Result<Self> {
        load_config(username, password, url, |name| std::env::var(name).ok())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_ms(self, millis: u64) -> Self {
        self.with_timeout(Duration::from_millis(millis))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Enables wire logging of every request and response.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Authenticates and returns a ready session.
    pub fn connect(self) -> Result<Session> {
        Session::connect(self)
    }

    /// Checks credentials and settings, returning the parsed base URL.
    pub(crate) fn validate(&self) -> Result<Url> {
        if self.username.trim().is_empty() {
            return Err(Error::Config("username must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(Error::Config("password must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        validate_content_type(&self.content_type)?;
        parse_base_url(&self.url)
    }
}

pub(crate) fn validate_content_type(content_type: &str) -> Result<HeaderValue> {
    if content_type.trim().is_empty() {
        return Err(Error::Config("content type must not be empty".into()));
    }
    HeaderValue::from_str(content_type)
        .map_err(|_| Error::Config(format!("invalid content type [{}]", content_type)))
}

fn parse_base_url(url: &str) -> Result<Url> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::Config("base URL must not be empty".into()));
    }
    let parsed = Url::parse(url)
        .map_err(|e| Error::Config(format!("base URL [{}] is not a valid URI: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
        return Err(Error::Config(format!(
            "base URL [{}] must be an absolute http(s) URI",
            url
        )));
    }
    Ok(parsed)
}

fn load_config<F>(
    username: Option<String>,
    password: Option<String>,
    url: Option<String>,
    lookup: F,
) -> Result<SessionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |explicit: Option<String>, var: &str, what: &str| -> Result<String> {
        explicit
            .or_else(|| lookup(var))
            .ok_or_else(|| Error::Config(format!("missing {} (set {})", what, var)))
    };

    let username = required(username, ENV_USERNAME, "username")?;
    let password = required(password, ENV_PASSWORD, "password")?;
    let url = required(url, ENV_URL, "base URL")?;

    let mut cfg = SessionConfig::new(username, password, url);

    if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
        let millis = raw.trim().parse::<u64>().map_err(|_| {
            Error::Config(format!("{} must be a number of milliseconds, got [{}]", ENV_TIMEOUT_MS, raw))
        })?;
        cfg = cfg.with_timeout_ms(millis);
    }
    if let Some(content_type) = lookup(ENV_CONTENT_TYPE) {
        cfg = cfg.with_content_type(content_type);
    }
    if let Some(flag) = lookup(ENV_DEBUG) {
        let flag = flag.trim();
        cfg = cfg.with_debug(!(flag.is_empty() || flag == "0" || flag.eq_ignore_ascii_case("false")));
    }

    Ok(cfg)
}
