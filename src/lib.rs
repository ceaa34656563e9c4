//! curlwrap - a blocking, curl-style HTTP session for Rust
//!
//! curlwrap wraps an async HTTP client behind the calling convention of a
//! classic curl session: configure once with chained setters, fire a verb,
//! read the body it returns, then inspect what happened through the session.
//!
//! ## Features
//!
//! - **Blocking verbs**: `get`, `post`, `put`, `delete`, `head`, `upload`
//! - **Chained configuration** for auth, headers, referer, user agent, port
//! - **Sane defaults**: redirects followed (max 5), session cookies,
//!   15 s connect timeout, 100 s transfer timeout
//! - **Transfer metadata** with curl's key names (`http_code`, `total_time`, ...)
//! - **Errors kept, not thrown**: network failures land in `error()`
//!
//! ## Quick Start
//!
//! ```no_run
//! use curlwrap::Session;
//!
//! fn main() -> curlwrap::Result<()> {
//!     let mut session = Session::new()?;
//!     let body = session.post("https://httpbin.org/post", [("name", "curlwrap")])?;
//!
//!     println!("Status: {}", session.code()?);
//!     println!("Body: {}", body);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cookies;
pub mod error;
pub mod info;
pub mod request;
pub mod session;
pub mod timeout;
pub mod transport;

// Re-export main types for convenience
pub use auth::Credentials;
pub use error::{Error, Result};
pub use info::TransferInfo;
pub use request::Params;
pub use session::Session;
pub use timeout::TimeoutConfig;

// Re-export JSON types
pub use serde_json::{Map as JsonMap, Value as JsonValue};

// Re-export time types
pub use std::time::Duration;
