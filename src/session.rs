use std::path::Path;
use std::time::Duration;

use http::{HeaderValue, Method};
use serde_json::{Map, Value};

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::info::TransferInfo;
use crate::request::{header_map, header_map_from_lines, Params, RequestOptions};
use crate::timeout::TimeoutConfig;
use crate::transport::{ClientSettings, HttpTransport, Payload, TransferRequest};

/// A blocking HTTP session
///
/// One session owns one transport handle and performs one transfer at a
/// time. Configuration is chained on the session and applies to every
/// subsequent request; each verb blocks until its transfer finishes and
/// returns the body. Whatever happened during the last transfer stays
/// readable through [`info`](Session::info), [`code`](Session::code) and
/// [`error`](Session::error) until the next one.
///
/// Network failures do not surface as `Err`: the verb returns the (possibly
/// empty) body and [`error`](Session::error) holds the reason.
///
/// # Examples
///
/// ```no_run
/// use curlwrap::Session;
///
/// fn main() -> curlwrap::Result<()> {
///     let mut session = Session::new()?;
///     session.agent("curlwrap/0.1")?.referer("https://example.com/")?;
///
///     let body = session.get("https://httpbin.org/get")?;
///     if session.error().is_empty() {
///         println!("{} -> {} bytes", session.code()?, body.len());
///     } else {
///         eprintln!("transfer failed: {}", session.error());
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Session {
    transport: Option<HttpTransport>,
    settings: ClientSettings,
    options: RequestOptions,
    verbose: bool,
    last_response: String,
    info: TransferInfo,
    error: String,
}

impl Session {
    /// Create a new session with default settings
    pub fn new() -> Result<Self> {
        let mut session = Self {
            transport: None,
            settings: ClientSettings::default(),
            options: RequestOptions::new(),
            verbose: false,
            last_response: String::new(),
            info: TransferInfo::new(),
            error: String::new(),
        };
        session.reset()?;
        Ok(session)
    }

    /// Start over with a fresh transport handle and the default settings
    ///
    /// Redirects are followed (at most 5) with automatic referer, cookies
    /// live for the session only, the connect timeout is 15 seconds and the
    /// whole transfer is bounded by 100 seconds. Custom headers, referer,
    /// agent, port, credentials and debug mode are cleared along with the
    /// results of the last transfer.
    pub fn reset(&mut self) -> Result<&mut Self> {
        self.release();

        let settings = ClientSettings::default();
        self.transport = Some(HttpTransport::new(settings)?);
        self.settings = settings;
        self.options = RequestOptions::new();
        self.verbose = false;
        self.last_response.clear();
        self.info = TransferInfo::new();
        self.error.clear();

        tracing::trace!("session reset");
        Ok(self)
    }

    /// Log request and response headers and record the request head in `info()`
    pub fn debug(&mut self) -> &mut Self {
        self.verbose = true;
        self
    }

    /// Perform an HTTP GET request
    pub fn get(&mut self, url: &str) -> Result<String> {
        self.exec(Method::GET, url, Payload::Params(Params::Empty))
    }

    /// Perform an HTTP POST request with body parameters
    pub fn post(&mut self, url: &str, params: impl Into<Params>) -> Result<String> {
        self.exec(Method::POST, url, Payload::Params(params.into()))
    }

    /// Perform an HTTP PUT request with body parameters
    ///
    /// Parameters are encoded exactly as for [`post`](Session::post).
    pub fn put(&mut self, url: &str, params: impl Into<Params>) -> Result<String> {
        self.exec(Method::PUT, url, Payload::Params(params.into()))
    }

    /// Perform an HTTP DELETE request
    pub fn delete(&mut self, url: &str) -> Result<String> {
        self.exec(Method::DELETE, url, Payload::Params(Params::Empty))
    }

    /// Perform an HTTP HEAD request
    pub fn head(&mut self, url: &str) -> Result<String> {
        self.exec(Method::HEAD, url, Payload::Params(Params::Empty))
    }

    /// Upload a file as the body of a PUT request
    pub fn upload(&mut self, url: &str, path: impl AsRef<Path>) -> Result<String> {
        self.ensure_open()?;
        let contents = std::fs::read(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), bytes = contents.len(), "uploading file");
        self.exec(Method::PUT, url, Payload::File(contents))
    }

    /// Send basic authentication credentials with every request
    pub fn authenticate(&mut self, username: &str, password: &str) -> &mut Self {
        self.options.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Replace the custom headers sent with every request
    pub fn headers<I, K, V>(&mut self, headers: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.options.headers = header_map(headers)?;
        Ok(self)
    }

    /// Replace the custom headers with `Name: value` lines
    pub fn header_lines<I, S>(&mut self, lines: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.options.headers = header_map_from_lines(lines)?;
        Ok(self)
    }

    /// Connect to this port instead of the one in the URL
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.options.port = Some(port);
        self
    }

    /// Set the `Referer` header
    pub fn referer(&mut self, referer: &str) -> Result<&mut Self> {
        self.options.referer = Some(HeaderValue::from_str(referer)?);
        Ok(self)
    }

    /// Set the `User-Agent` header
    pub fn agent(&mut self, agent: &str) -> Result<&mut Self> {
        self.options.user_agent = Some(HeaderValue::from_str(agent)?);
        Ok(self)
    }

    /// Set the connection timeout
    pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settings.timeouts = self.settings.timeouts.connect_timeout(timeout);
        self
    }

    /// Set the overall transfer timeout
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settings.timeouts = self.settings.timeouts.timeout(timeout);
        self
    }

    /// Replace both timeouts at once
    ///
    /// `TimeoutConfig::unlimited()` lets transfers run as long as the server
    /// does.
    pub fn timeouts(&mut self, timeouts: TimeoutConfig) -> &mut Self {
        self.settings.timeouts = timeouts;
        self
    }

    /// Enable or disable following redirects
    pub fn follow_redirects(&mut self, follow: bool) -> &mut Self {
        self.settings.follow_redirects = follow;
        self
    }

    /// Set the maximum number of redirects followed
    pub fn max_redirects(&mut self, max: usize) -> &mut Self {
        self.settings.max_redirects = max;
        self
    }

    /// Enable or disable sending `Referer` on redirects
    pub fn auto_referer(&mut self, enabled: bool) -> &mut Self {
        self.settings.auto_referer = enabled;
        self
    }

    /// Release the transport handle
    ///
    /// Requests fail with [`Error::SessionClosed`] until
    /// [`reset`](Session::reset) is called. Closing twice does nothing.
    pub fn close(&mut self) -> &mut Self {
        self.release();
        self
    }

    /// Check if the transport handle has been released
    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// Get the metadata of the last transfer
    pub fn info(&self) -> &TransferInfo {
        &self.info
    }

    /// Get the metadata of the last transfer as a key/value map
    pub fn info_map(&self) -> Map<String, Value> {
        self.info.to_map()
    }

    /// Get one metadata value of the last transfer by its curl name
    pub fn info_value(&self, key: &str) -> Result<Value> {
        self.info
            .get(key)
            .ok_or_else(|| Error::unknown_info_key(key))
    }

    /// Get the status code of the last transfer
    ///
    /// `0` when the last transfer got no response at all.
    pub fn code(&self) -> Result<u16> {
        self.info
            .http_code
            .ok_or_else(|| Error::unknown_info_key("http_code"))
    }

    /// Get the error message of the last transfer, empty if it succeeded
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Get the body of the last transfer
    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    fn ensure_open(&self) -> Result<()> {
        if self.transport.is_none() {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    fn exec(&mut self, method: Method, url: &str, payload: Payload) -> Result<String> {
        let transport = self.transport.as_mut().ok_or(Error::SessionClosed)?;
        transport.configure(self.settings)?;

        let outcome = transport.perform(TransferRequest {
            method,
            url,
            options: &self.options,
            payload,
            verbose: self.verbose,
        })?;

        self.last_response = outcome.text();
        self.info = outcome.info;
        self.error = outcome.error.unwrap_or_default();
        Ok(self.last_response.clone())
    }

    fn release(&mut self) {
        if let Some(transport) = self.transport.take() {
            tracing::trace!("releasing transport handle");
            transport.release();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
        self.last_response.clear();
    }
}
