use std::sync::Mutex;
use std::time::SystemTime;

use cookie::Cookie;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use url::Url;

/// In-memory cookie store for a single session
///
/// Cookies received during a session are replayed on later requests of the
/// same session and never persisted. `reset()` replaces the store, which is
/// how a session starts a fresh cookie session.
#[derive(Debug, Default)]
pub struct SessionCookies {
    inner: Mutex<Vec<StoredCookie>>,
}

#[derive(Debug, Clone)]
struct StoredCookie {
    cookie: Cookie<'static>,
    domain: String,
    host_only: bool,
    path: String,
}

impl StoredCookie {
    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.cookie.name() == other.cookie.name()
            && self.domain == other.domain
            && self.path == other.path
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            host == self.domain || host.ends_with(&format!(".{}", self.domain))
        };
        if !domain_ok {
            return false;
        }

        if self.cookie.secure().unwrap_or(false) && url.scheme() != "https" {
            return false;
        }

        path_matches(url.path(), &self.path)
    }
}

impl SessionCookies {
    /// Create a new empty cookie store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cookie received from `url`
    pub fn add_from_response(&self, set_cookie: &str, url: &Url) {
        let Ok(cookie) = Cookie::parse(set_cookie.to_string()) else {
            tracing::debug!(header = set_cookie, "ignoring malformed Set-Cookie");
            return;
        };
        let Some(host) = url.host_str() else {
            return;
        };

        let (domain, host_only) = match cookie.domain() {
            Some(domain) => (domain.trim_start_matches('.').to_ascii_lowercase(), false),
            None => (host.to_ascii_lowercase(), true),
        };
        let path = match cookie.path() {
            Some(path) if path.starts_with('/') => path.to_string(),
            _ => default_path(url),
        };

        let stored = StoredCookie {
            cookie,
            domain,
            host_only,
            path,
        };

        if let Ok(mut jar) = self.inner.lock() {
            jar.retain(|existing| !existing.same_slot(&stored));
            if !is_expired(&stored.cookie) {
                jar.push(stored);
            }
        }
    }

    /// Get the `Cookie` header value for a request to `url`
    pub fn cookie_header_for_url(&self, url: &Url) -> Option<String> {
        let jar = self.inner.lock().ok()?;
        let pairs: Vec<String> = jar
            .iter()
            .filter(|stored| stored.matches(url) && !is_expired(&stored.cookie))
            .map(|stored| format!("{}={}", stored.cookie.name(), stored.cookie.value()))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Get the number of cookies in the store
    pub fn len(&self) -> usize {
        self.inner.lock().map(|jar| jar.len()).unwrap_or(0)
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(value) = header.to_str() {
                self.add_from_response(value, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.cookie_header_for_url(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

fn is_expired(cookie: &Cookie<'_>) -> bool {
    if let Some(max_age) = cookie.max_age() {
        return max_age.is_zero() || max_age.is_negative();
    }
    match cookie.expires_datetime() {
        Some(expires) => expires < SystemTime::now(),
        None => false,
    }
}

// Directory of the request path, per RFC 6265 section 5.1.4.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    if let Some(rest) = request_path.strip_prefix(cookie_path) {
        return cookie_path.ends_with('/') || rest.starts_with('/');
    }
    false
}
