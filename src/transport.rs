use std::sync::{Arc, Mutex};
use std::time::Instant;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::redirect::Policy;
use reqwest::Client as ReqwestClient;
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};

use crate::cookies::SessionCookies;
use crate::error::{describe, Error, Result};
use crate::info::TransferInfo;
use crate::request::{render_request_head, Params, RequestOptions};
use crate::timeout::TimeoutConfig;

/// Default maximum number of redirects followed per transfer
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Settings baked into the underlying client
///
/// Changing any of these between transfers rebuilds the client on the same
/// runtime and cookie store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Connect and overall timeouts
    pub timeouts: TimeoutConfig,
    /// Follow `Location` headers
    pub follow_redirects: bool,
    /// Maximum redirects followed before the transfer fails
    pub max_redirects: usize,
    /// Send `Referer` when following a redirect
    pub auto_referer: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            auto_referer: true,
        }
    }
}

/// What goes into the body of a transfer
#[derive(Debug, Clone)]
pub enum Payload {
    /// Encoded parameters
    Params(Params),
    /// File contents
    File(Vec<u8>),
}

/// One transfer to perform
#[derive(Debug)]
pub struct TransferRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub options: &'a RequestOptions,
    pub payload: Payload,
    pub verbose: bool,
}

/// Everything a transfer leaves behind
///
/// Always fully populated, whether or not the transfer succeeded.
#[derive(Debug, Clone, Default)]
pub struct TransferOutcome {
    pub body: Vec<u8>,
    pub info: TransferInfo,
    pub error: Option<String>,
}

impl TransferOutcome {
    fn started(method: &Method, url: &str) -> Self {
        Self {
            body: Vec::new(),
            info: TransferInfo {
                url: Some(url.to_string()),
                effective_method: Some(method.to_string()),
                http_code: Some(0),
                redirect_count: Some(0),
                size_upload: Some(0),
                size_download: Some(0),
                ..Default::default()
            },
            error: None,
        }
    }

    fn finish(mut self, started: Instant, error: Option<String>) -> Self {
        self.info.total_time = Some(started.elapsed().as_secs_f64());
        self.info.size_download = Some(self.body.len() as u64);
        self.info.compute_speeds();
        self.error = error;
        self
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What the redirect policy saw during the current transfer
#[derive(Debug, Default)]
struct RedirectTrail {
    followed: usize,
    /// Status and URL of the last redirect response received
    last: Option<(u16, String)>,
    /// A 301, 302 or 303 turned the request into a GET
    switched_to_get: bool,
}

type SharedTrail = Arc<Mutex<RedirectTrail>>;

/// The transport handle owned by a session
///
/// Holds the runtime transfers are driven on, the configured client, the
/// session's cookie store and the redirect trail the client's redirect
/// policy writes to.
pub struct HttpTransport {
    runtime: Runtime,
    client: ReqwestClient,
    settings: ClientSettings,
    cookies: Arc<SessionCookies>,
    redirects: SharedTrail,
}

impl HttpTransport {
    /// Allocate a new transport with the given settings and an empty cookie store
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let runtime = RuntimeBuilder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::init(format!("runtime: {}", e)))?;

        let cookies = Arc::new(SessionCookies::new());
        let redirects = SharedTrail::default();
        let client = build_client(&settings, cookies.clone(), redirects.clone())?;

        Ok(Self {
            runtime,
            client,
            settings,
            cookies,
            redirects,
        })
    }

    /// Rebuild the client if the settings changed
    pub fn configure(&mut self, settings: ClientSettings) -> Result<()> {
        if settings == self.settings {
            return Ok(());
        }
        tracing::debug!(?settings, "rebuilding transfer client");
        self.client = build_client(&settings, self.cookies.clone(), self.redirects.clone())?;
        self.settings = settings;
        Ok(())
    }

    /// Perform one blocking transfer
    ///
    /// Only fails when the transfer cannot be driven at all; everything that
    /// goes wrong on the network ends up in the outcome's `error`.
    pub fn perform(&self, request: TransferRequest<'_>) -> Result<TransferOutcome> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::config(
                "blocking session used from inside an async runtime",
            ));
        }
        if let Ok(mut trail) = self.redirects.lock() {
            *trail = RedirectTrail::default();
        }
        Ok(self.runtime.block_on(self.execute(request)))
    }

    /// Release the handle
    pub fn release(self) {
        self.runtime.shutdown_background();
    }

    async fn execute(&self, request: TransferRequest<'_>) -> TransferOutcome {
        let started = Instant::now();
        let outcome = TransferOutcome::started(&request.method, request.url);
        tracing::debug!(method = %request.method, url = request.url, "starting transfer");

        let prepared = match self.prepare(&request) {
            Ok(prepared) => prepared,
            Err(message) => return self.fail(outcome, started, message),
        };
        self.send(request, prepared, outcome, started).await
    }

    fn prepare(&self, request: &TransferRequest<'_>) -> std::result::Result<reqwest::Request, String> {
        let url = request.options.target(request.url)?;
        let mut headers = request.options.request_headers().map_err(|e| e.to_string())?;

        let mut builder = self.client.request(request.method.clone(), url);
        match &request.payload {
            Payload::Params(Params::Multipart(fields)) => {
                let form = fields
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                        form.text(name.clone(), value.clone())
                    });
                builder = builder.multipart(form);
            }
            Payload::Params(params) => {
                if let Some(encoded) = params.encode().map_err(|e| e.to_string())? {
                    if let Some(content_type) = encoded.content_type {
                        if !headers.contains_key(CONTENT_TYPE) {
                            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
                        }
                    }
                    builder = builder.body(encoded.bytes);
                }
            }
            Payload::File(bytes) => {
                builder = builder.body(bytes.clone());
            }
        }

        builder
            .headers(headers)
            .build()
            .map_err(|e| describe(&e))
    }

    async fn send(
        &self,
        request: TransferRequest<'_>,
        prepared: reqwest::Request,
        mut outcome: TransferOutcome,
        started: Instant,
    ) -> TransferOutcome {
        outcome.info.url = Some(prepared.url().to_string());

        // Streamed bodies (multipart) only announce their size in the header.
        let body_len = prepared
            .body()
            .and_then(|body| body.as_bytes())
            .map(|bytes| bytes.len() as u64)
            .or_else(|| {
                prepared
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
            });
        if let Some(len) = body_len {
            outcome.info.size_upload = Some(len);
            outcome.info.upload_content_length = Some(len);
        }

        if request.verbose {
            let head = render_request_head(prepared.method(), prepared.url(), prepared.headers());
            for line in head.lines().filter(|line| !line.is_empty()) {
                tracing::debug!("> {}", line);
            }
            outcome.info.request_header = Some(head);
        }

        let mut response = match self.client.execute(prepared).await {
            Ok(response) => response,
            Err(e) => return self.fail(outcome, started, describe(&e)),
        };

        outcome.info.starttransfer_time = Some(started.elapsed().as_secs_f64());
        outcome.info.http_code = Some(response.status().as_u16());
        outcome.info.http_version = Some(format!("{:?}", response.version()));
        outcome.info.url = Some(response.url().to_string());
        self.apply_trail(&mut outcome.info);
        outcome.info.content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        outcome.info.download_content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        outcome.info.header_size = Some(header_size(response.headers()));
        if let Some(addr) = response.remote_addr() {
            outcome.info.primary_ip = Some(addr.ip().to_string());
            outcome.info.primary_port = Some(addr.port());
        }

        if request.verbose {
            tracing::debug!("< {:?} {}", response.version(), response.status());
            for (name, value) in response.headers() {
                tracing::debug!("< {}: {}", name, value.to_str().unwrap_or(""));
            }
        }

        // Read chunk by chunk so a failure mid-body keeps what arrived.
        let mut error = None;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => outcome.body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    error = Some(describe(&e));
                    break;
                }
            }
        }

        if let Some(message) = error {
            return self.fail(outcome, started, message);
        }

        let outcome = outcome.finish(started, None);
        tracing::debug!(
            status = outcome.info.http_code.unwrap_or(0),
            bytes = outcome.body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transfer complete"
        );
        outcome
    }

    fn fail(&self, outcome: TransferOutcome, started: Instant, message: String) -> TransferOutcome {
        tracing::warn!(url = outcome.info.url.as_deref().unwrap_or(""), error = %message, "transfer failed");
        let mut outcome = outcome.finish(started, Some(message));
        self.apply_trail(&mut outcome.info);
        outcome
    }

    /// Copy what the redirect policy recorded into the transfer info
    ///
    /// When the chain was cut off no final response exists, so the last
    /// redirect response stands in for it.
    fn apply_trail(&self, info: &mut TransferInfo) {
        let Ok(trail) = self.redirects.lock() else {
            return;
        };
        info.redirect_count = Some(trail.followed as u32);
        let keeps_method = matches!(info.effective_method.as_deref(), Some("GET") | Some("HEAD"));
        if trail.switched_to_get && !keeps_method {
            info.effective_method = Some(Method::GET.to_string());
        }
        if info.http_code == Some(0) {
            if let Some((status, url)) = &trail.last {
                info.http_code = Some(*status);
                info.url = Some(url.clone());
            }
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("settings", &self.settings)
            .field("cookies", &self.cookies.len())
            .finish()
    }
}

fn build_client(
    settings: &ClientSettings,
    cookies: Arc<SessionCookies>,
    redirects: SharedTrail,
) -> Result<ReqwestClient> {
    let mut builder = ReqwestClient::builder()
        .cookie_provider(cookies)
        .redirect(redirect_policy(settings, redirects))
        .referer(settings.auto_referer);

    if let Some(timeout) = settings.timeouts.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = settings.timeouts.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| Error::init(format!("client: {}", describe(&e))))
}

fn redirect_policy(settings: &ClientSettings, redirects: SharedTrail) -> Policy {
    if !settings.follow_redirects {
        return Policy::none();
    }

    let max = settings.max_redirects;
    Policy::custom(move |attempt| {
        // previous() holds the original URL plus every URL already redirected to
        let followed = attempt.previous().len();
        if let Ok(mut trail) = redirects.lock() {
            trail.last = attempt
                .previous()
                .last()
                .map(|url| (attempt.status().as_u16(), url.to_string()));
            if followed <= max {
                trail.followed = followed;
                trail.switched_to_get |= switches_to_get(attempt.status());
            }
        }
        if followed > max {
            attempt.error(format!("Maximum ({}) redirects followed", max))
        } else {
            attempt.follow()
        }
    })
}

/// Whether following this redirect status resends a non-GET, non-HEAD request as a GET
fn switches_to_get(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
    )
}

fn header_size(headers: &HeaderMap) -> u64 {
    let lines: usize = headers
        .iter()
        .map(|(name, value)| name.as_str().len() + value.as_bytes().len() + 4)
        .sum();
    (lines + 2) as u64
}
