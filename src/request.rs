use std::collections::{BTreeMap, HashMap};

use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;
use url::Url;

use crate::auth::Credentials;
use crate::error::Result;

/// Body parameters attached to `post` and `put`
///
/// Key/value collections convert to [`Params::Form`]; strings convert to
/// [`Params::Raw`] and are sent untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum Params {
    /// No body
    Empty,
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
    /// `multipart/form-data` text fields
    Multipart(Vec<(String, String)>),
    /// `application/json` document
    Json(Value),
    /// Body sent as-is
    Raw(String),
}

impl Params {
    /// Build form parameters from any iterator of pairs
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        Params::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }

    /// Build multipart text fields from any iterator of pairs
    pub fn multipart<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        match Params::form(pairs) {
            Params::Form(fields) => Params::Multipart(fields),
            other => other,
        }
    }

    /// Check if there is no body to send
    pub fn is_empty(&self) -> bool {
        matches!(self, Params::Empty)
    }

    /// Encode into a request body, if the encoding has a fixed byte form
    ///
    /// Multipart bodies are generated by the transport with their own
    /// boundary and return `None` here.
    pub fn encode(&self) -> Result<Option<EncodedBody>> {
        let encoded = match self {
            Params::Empty | Params::Multipart(_) => return Ok(None),
            Params::Form(pairs) => {
                let form_data = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                EncodedBody {
                    content_type: Some("application/x-www-form-urlencoded"),
                    bytes: form_data.into_bytes(),
                }
            }
            Params::Json(json) => EncodedBody {
                content_type: Some("application/json"),
                bytes: serde_json::to_vec(json)?,
            },
            Params::Raw(text) => EncodedBody {
                content_type: None,
                bytes: text.clone().into_bytes(),
            },
        };
        Ok(Some(encoded))
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::Empty
    }
}

impl<K: Into<String>, V: ToString, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        Params::form(pairs)
    }
}

impl<K: Into<String>, V: ToString> From<Vec<(K, V)>> for Params {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Params::form(pairs)
    }
}

impl<K: Into<String>, V: ToString> From<HashMap<K, V>> for Params {
    fn from(pairs: HashMap<K, V>) -> Self {
        Params::form(pairs)
    }
}

impl<K: Into<String>, V: ToString> From<BTreeMap<K, V>> for Params {
    fn from(pairs: BTreeMap<K, V>) -> Self {
        Params::form(pairs)
    }
}

impl From<Value> for Params {
    fn from(json: Value) -> Self {
        Params::Json(json)
    }
}

impl From<String> for Params {
    fn from(text: String) -> Self {
        Params::Raw(text)
    }
}

impl From<&str> for Params {
    fn from(text: &str) -> Self {
        Params::Raw(text.to_string())
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::Empty
    }
}

/// A body ready to go on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: Option<&'static str>,
    pub bytes: Vec<u8>,
}

/// Per-request options kept on the session and applied to every transfer
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Custom headers; replaced wholesale by `headers()`
    pub headers: HeaderMap,
    /// `Referer` header
    pub referer: Option<HeaderValue>,
    /// `User-Agent` header
    pub user_agent: Option<HeaderValue>,
    /// Port overriding the one in the target URL
    pub port: Option<u16>,
    /// Basic authentication credentials
    pub credentials: Option<Credentials>,
}

impl RequestOptions {
    /// Create empty request options
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the target URL, applying the port override
    pub fn target(&self, url: &str) -> std::result::Result<Url, String> {
        let mut url = Url::parse(url).map_err(|e| format!("URL rejected: {}", e))?;
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|_| format!("URL rejected: cannot set port on {}", url))?;
        }
        Ok(url)
    }

    /// Compute the headers sent with a request
    ///
    /// Custom headers come first; referer, agent and credentials set through
    /// their own setters win over a custom header of the same name.
    pub fn request_headers(&self) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();
        if let Some(referer) = &self.referer {
            headers.insert(header::REFERER, referer.clone());
        }
        if let Some(agent) = &self.user_agent {
            headers.insert(header::USER_AGENT, agent.clone());
        }
        if let Some(credentials) = &self.credentials {
            headers.insert(header::AUTHORIZATION, credentials.authorization_header()?);
        }
        Ok(headers)
    }
}

/// Build a header map from name/value pairs
pub fn header_map<I, K, V>(headers: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = name.as_ref().trim().parse::<HeaderName>()?;
        let value = HeaderValue::from_str(value.as_ref().trim())?;
        map.append(name, value);
    }
    Ok(map)
}

/// Build a header map from `Name: value` lines
pub fn header_map_from_lines<I, S>(lines: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pairs = Vec::new();
    for line in lines {
        let line = line.as_ref();
        let (name, value) = line.split_once(':').ok_or_else(|| {
            crate::error::Error::invalid_request(format!("Malformed header line: {}", line))
        })?;
        pairs.push((name.to_string(), value.to_string()));
    }
    header_map(pairs)
}

/// Render the request line and headers the way they go on the wire
pub(crate) fn render_request_head(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut head = format!("{} {} HTTP/1.1\r\n", method, target);
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => head.push_str(&format!("host: {}:{}\r\n", host, port)),
            None => head.push_str(&format!("host: {}\r\n", host)),
        }
    }
    for (name, value) in headers {
        let value = if value.is_sensitive() {
            "<redacted>"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    head
}
