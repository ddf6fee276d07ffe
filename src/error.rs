use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while creating a [`Session`](crate::Session) or dispatching a request.
///
/// Non-2xx responses from business endpoints are *not* errors: dispatch returns them as
/// data. [`Error::Request`] only appears when the caller opts in through
/// [`Response::error_for_status`](crate::Response::error_for_status).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid credentials, URL or session settings.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The token endpoint answered with something other than 200.
    #[error("authentication failed: {status_line}{}", fmt_detail(.detail))]
    Auth {
        status: StatusCode,
        status_line: String,
        detail: Option<String>,
    },

    /// The token endpoint answered 200 but without a usable `access_token`.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// A business endpoint answered with a non-2xx status.
    #[error("request failed: {status_line} ({url}){}", fmt_detail(.detail))]
    Request {
        status: StatusCode,
        status_line: String,
        url: String,
        detail: Option<String>,
    },

    #[error("request timed out after {timeout_ms} ms ({url})")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("HTTP transport error")]
    Transport(#[source] reqwest::Error),

    #[error("invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported HTTP method [{0}]")]
    UnsupportedMethod(String),

    #[error("I/O error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse response JSON")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Maps a reqwest failure into a timeout or a generic transport error.
    pub(crate) fn from_reqwest(err: reqwest::Error, url: &str, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Error::Timeout {
                url: url.to_string(),
                timeout_ms,
            }
        } else {
            Error::Transport(err)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Auth { status, .. } | Error::Request { status, .. } => Some(*status),
            Error::Transport(e) => e.status(),
            _ => None,
        }
    }
}

fn fmt_detail(detail: &Option<String>) -> String {
    match detail.as_deref() {
        Some(d) if !d.is_empty() => format!("\nServer message: {d}"),
        _ => String::new(),
    }
}

/// Error payload shapes seen from the service and its Keycloak front door.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct UpstreamErrorBody {
    // Keycloak: {"error":"invalid_grant","error_description":"Invalid user credentials"}
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) detail: Option<String>,
    #[serde(default)]
    pub(crate) title: Option<String>,
}

impl UpstreamErrorBody {
    /// Best-effort extraction of a human readable message from an error body.
    pub(crate) fn summarize(body: &[u8]) -> Option<String> {
        let parsed: UpstreamErrorBody = serde_json::from_slice(body).ok()?;
        let head = parsed
            .error_description
            .or(parsed.message)
            .or(parsed.title)
            .or(parsed.error)?;
        Some(match parsed.detail {
            Some(detail) if !detail.is_empty() && detail != head => format!("{head}: {detail}"),
            _ => head,
        })
    }
}
