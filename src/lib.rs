//! A small Rust client for the NRMC catastrophe-risk-modelling REST API.
//!
//! The flow is: open a [`Session`] (one password-grant token exchange), then send any
//! number of requests through it. Each request is one blocking HTTP call whose body is
//! normalized into a [`Table`], an empty sentinel, or left for the caller to read from
//! the raw [`Response`].
//!
//! ## Quick start
//! - Pass credentials and the base URL explicitly, or set `NRMC_URL`, `NRMC_USERNAME`
//!   and `NRMC_PASSWORD` and call [`Session::from_env`].
//! - The default timeout is 200 ms. Raise it with [`SessionConfig::with_timeout`] on
//!   anything slower than a local network.
//!
//! ```no_run
//! use nrmcapi::{NormalizedData, SessionConfig};
//!
//! fn main() -> Result<(), nrmcapi::Error> {
//!     let session = SessionConfig::new("analyst", "secret", "https://nrmc.example.com")
//!         .with_timeout_ms(10_000)
//!         .connect()?;
//!
//!     let out = session.get("/api/portfolios")?;
//!     if !out.response.is_success() {
//!         eprintln!("upstream said {}", out.response.status_line());
//!     }
//!     match &out.data {
//!         NormalizedData::Table(t) => println!("{} portfolio(s)", t.len()),
//!         NormalizedData::Empty => println!("no content"),
//!         NormalizedData::Passthrough => println!("{}", out.response.text()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Upstream 4xx/5xx statuses are returned as data; only transport failures (timeouts,
//! refused connections, bad URLs) are errors. Use [`Response::error_for_status`] to
//! opt into failing on non-2xx.

#![forbid(unsafe_code)]

mod config;
mod dispatch;
mod error;
mod response;
mod session;
mod table;
mod util;

pub use config::{DEFAULT_CONTENT_TYPE, DEFAULT_TIMEOUT, SessionConfig};
pub use dispatch::{Body, Method, MultipartField, Request, dispatch};
pub use error::{Error, Result};
pub use response::{Dispatched, NormalizedData, Response};
pub use session::{Session, TOKEN_PATH};
pub use table::{Table, VALUE_COLUMN};
