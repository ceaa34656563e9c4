use serde::Serialize;
use serde_json::{Map, Value};

/// Metadata about the most recent transfer
///
/// Keys follow curl's `getinfo` naming so callers can look values up by
/// name with [`TransferInfo::get`]. A field that the last transfer did not
/// produce is `None` and absent from the keyed view; a freshly reset session
/// has no fields at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferInfo {
    /// Effective URL after redirects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP method sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_method: Option<String>,
    /// Final status code, `0` when no response arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    /// Protocol version of the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_version: Option<String>,
    /// Response `Content-Type`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Number of redirects followed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_count: Option<u32>,
    /// Whole transfer duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    /// Seconds until the response headers arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starttransfer_time: Option<f64>,
    /// Request body bytes sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_upload: Option<u64>,
    /// Response body bytes received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_download: Option<u64>,
    /// Download speed in bytes per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_download: Option<f64>,
    /// Upload speed in bytes per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_upload: Option<f64>,
    /// Announced response `Content-Length`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_content_length: Option<u64>,
    /// Length of the request body, when one was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_content_length: Option<u64>,
    /// Remote peer address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ip: Option<String>,
    /// Remote peer port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_port: Option<u16>,
    /// Bytes of response header lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_size: Option<u64>,
    /// Request line and headers sent, recorded in debug mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_header: Option<String>,
}

impl TransferInfo {
    /// Create empty transfer info
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if no metadata has been recorded
    pub fn is_empty(&self) -> bool {
        self.to_map().is_empty()
    }

    /// Get the metadata as a key/value map
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Look up a single value by its curl name
    pub fn get(&self, key: &str) -> Option<Value> {
        self.to_map().remove(key)
    }

    /// Fill in the rate fields from sizes and timings
    pub(crate) fn compute_speeds(&mut self) {
        if let (Some(size), Some(total)) = (self.size_download, self.total_time) {
            self.speed_download = Some(rate(size, total));
        }
        if let (Some(size), Some(elapsed)) = (self.size_upload, self.starttransfer_time.or(self.total_time)) {
            self.speed_upload = Some(rate(size, elapsed));
        }
    }
}

fn rate(bytes: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        bytes as f64 / seconds
    } else {
        0.0
    }
}
