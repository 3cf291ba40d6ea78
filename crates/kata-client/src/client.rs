//! KATA scanner HTTP client implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, Client, Identity, StatusCode};
use serde_json::{json, Value};
use tracing::instrument;
use url::Url;

use crate::config::KataConfig;
use crate::debug::{DebugLog, DebugSink};
use crate::error::{KataClientError, Result};
use crate::types::*;
use crate::wait::{self, ScanStateSource, WaitOptions};

/// URL-encode a sensor ID for use in path segments.
fn encode_path_segment(id: &str) -> String {
    id.replace('/', "%2F")
}

/// JSON field names that may wrap the scan list, in order of precedence
const ENVELOPE_FIELDS: [&str; 5] = ["scans", "items", "response", "data", "result"];

/// KATA scanner API client
///
/// Holds one `reqwest::Client` configured with the mutual TLS identity.
/// Clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct KataClient {
    client: Client,
    base_url: String,
    config: KataConfig,
    debug: DebugLog,
}

impl KataClient {
    /// Create a new client; no network I/O happens here
    pub fn new(config: KataConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a new client that reports debug events to `sink`
    pub fn with_debug_sink(config: KataConfig, sink: DebugSink) -> Result<Self> {
        Self::build(config, Some(sink))
    }

    fn build(config: KataConfig, sink: Option<DebugSink>) -> Result<Self> {
        let base_url = config.normalized_base_url().to_string();
        Url::parse(&base_url)?;

        let tls = &config.tls;
        let mut pem = tls.cert_pem.clone().into_bytes();
        pem.push(b'\n');
        pem.extend_from_slice(tls.key_pem.as_bytes());
        let identity = Identity::from_pem(&pem)
            .map_err(|e| KataClientError::Tls(format!("Invalid client identity: {}", e)))?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .danger_accept_invalid_certs(!tls.reject_unauthorized)
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect());

        if let Some(ca) = &tls.ca_pem {
            for cert in Certificate::from_pem_bundle(ca.as_bytes())
                .map_err(|e| KataClientError::Tls(format!("Invalid CA bundle: {}", e)))?
            {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder.build()?;
        let debug = DebugLog::resolve(config.debug, sink);

        debug.emit("init", || {
            json!({
                "base": base_url,
                "sensorId": config.sensor_id,
                "timeoutMs": config.timeouts.request_ms,
                "waitTimeoutMs": config.timeouts.wait_ms,
                "tls": {
                    "hasCert": !tls.cert_pem.is_empty(),
                    "hasKey": !tls.key_pem.is_empty(),
                    "hasCA": tls.ca_pem.is_some(),
                    "rejectUnauthorized": tls.reject_unauthorized,
                },
            })
        });

        Ok(Self {
            client,
            base_url,
            config,
            debug,
        })
    }

    /// Base URL without trailing slashes
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sensor_id(&self) -> &str {
        &self.config.sensor_id
    }

    /// Whether the scanner certificate is verified
    pub fn verifies_peer(&self) -> bool {
        self.config.tls.reject_unauthorized
    }

    /// Bound on a single HTTP call
    pub fn request_timeout(&self) -> Duration {
        self.config.timeouts.request()
    }

    /// Default overall budget of [`wait_for_result`](Self::wait_for_result)
    pub fn wait_timeout(&self) -> Duration {
        self.config.timeouts.wait()
    }

    pub fn config(&self) -> &KataConfig {
        &self.config
    }

    /// Get a reference to the underlying HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn scans_url(&self) -> String {
        format!(
            "{}/kata/scanner/v1/sensors/{}/scans",
            self.base_url,
            encode_path_segment(&self.config.sensor_id)
        )
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Submit a file for scanning
    ///
    /// The HTTP status is reported in the result, never as an error; only
    /// transport failures (including the request timeout) fail.
    #[instrument(skip(self, request), fields(filename = %request.filename))]
    pub async fn submit_scan(&self, request: SubmitRequest) -> Result<SubmitResult> {
        let SubmitRequest {
            payload,
            filename,
            scan_id,
            object_type,
            sensor_instance_id,
        } = request;
        let scan_id = scan_id.unwrap_or_else(ScanId::generate);

        let content = Part::bytes(payload.into_bytes())
            .file_name(filename.clone())
            .mime_str("application/octet-stream")?;

        let mut form = Form::new()
            .text("objectType", object_type.clone())
            .text("scanId", scan_id.to_string());
        if let Some(instance) = sensor_instance_id.filter(|s| !s.is_empty()) {
            form = form.text("sensorInstanceId", instance);
        }
        let form = form.part("content", content);

        let url = Url::parse(&self.scans_url())?;
        self.debug.emit("submitScan: POST", || {
            json!({
                "url": url.as_str(),
                "scanId": scan_id.to_string(),
                "filename": filename,
                "objectType": object_type,
            })
        });

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(KataClientError::transport)?;

        let status = response.status().as_u16();
        let content_type = content_type_of(&response);
        let message = read_submit_message(response, &content_type).await;

        self.debug.emit("submitScan: response", || {
            json!({
                "status": status,
                "contentType": content_type,
                "message": message.as_deref().map(|m| m.chars().take(200).collect::<String>()),
            })
        });

        Ok(SubmitResult::new(status, scan_id, message))
    }

    // =========================================================================
    // Query
    // =========================================================================

    /// Query scan states, optionally filtered by state and sensor instance
    ///
    /// `204 No Content` yields an empty list. Any other non-success status,
    /// a non-JSON body, or an unknown body shape is an error.
    #[instrument(skip(self))]
    pub async fn get_scans(&self, params: &GetScansParams) -> Result<Vec<ScanItem>> {
        let query = params.to_query_string();
        let mut url = format!("{}/state", self.scans_url());
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        let url = Url::parse(&url)?;

        self.debug
            .emit("getScans: GET", || json!({ "url": url.as_str() }));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(KataClientError::transport)?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(KataClientError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = content_type_of(&response);
        let body = response.text().await.map_err(KataClientError::transport)?;
        let labelled_json = content_type.contains("application/json");

        let data: Value = serde_json::from_str(&body).map_err(|_| {
            KataClientError::invalid_body(status.as_u16(), content_type.as_str(), &body)
        })?;
        let items = normalize_scans(&data)?;

        let event = if labelled_json {
            "getScans: response"
        } else {
            "getScans: response(non-json-type)"
        };
        self.debug.emit(event, || {
            json!({
                "status": status.as_u16(),
                "contentType": content_type,
                "count": items.len(),
            })
        });

        Ok(items)
    }

    // =========================================================================
    // Wait
    // =========================================================================

    /// Poll until the scan reaches a terminal state
    ///
    /// Returns `Ok(None)` when the wait budget (`options.budget`, else the
    /// configured wait timeout) runs out first.
    #[instrument(skip(self, options), fields(scan_id = %scan_id))]
    pub async fn wait_for_result(
        &self,
        scan_id: &ScanId,
        options: &WaitOptions,
    ) -> Result<Option<ScanItem>> {
        wait::wait_for_terminal(
            self,
            scan_id,
            options.poll_interval,
            options.sensor_instance_id.as_deref(),
            options.budget.unwrap_or_else(|| self.wait_timeout()),
            &self.debug,
        )
        .await
    }

    /// Wait options using the configured poll interval and wait budget
    pub fn default_wait_options(&self) -> WaitOptions {
        WaitOptions::default()
            .poll_interval(self.config.timeouts.poll_interval())
            .budget(self.wait_timeout())
    }
}

#[async_trait]
impl ScanStateSource for KataClient {
    async fn get_scans(&self, params: &GetScansParams) -> Result<Vec<ScanItem>> {
        KataClient::get_scans(self, params).await
    }
}

fn content_type_of(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Extract the human readable message of a submit response
///
/// Read or parse failures leave the message empty.
async fn read_submit_message(response: reqwest::Response, content_type: &str) -> Option<String> {
    let body = response.text().await.ok()?;
    if content_type.contains("application/json") {
        let json: Value = serde_json::from_str(&body).ok()?;
        message_from_json(&json)
    } else {
        Some(body.trim().to_string())
    }
}

/// `message` of a JSON object or array, else the whole body as JSON text
pub(crate) fn message_from_json(json: &Value) -> Option<String> {
    match json {
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => Some(json.to_string()),
            Some(other) => Some(other.to_string()),
        },
        Value::Array(_) => Some(json.to_string()),
        _ => None,
    }
}

/// Turn any accepted body shape into scan items
///
/// Accepted shapes, in order: a bare array, or an object with an array under
/// one of [`ENVELOPE_FIELDS`].
pub(crate) fn normalize_scans(data: &Value) -> Result<Vec<ScanItem>> {
    let entries = match data {
        Value::Array(entries) => Some(entries),
        Value::Object(map) => ENVELOPE_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_array)),
        _ => None,
    };

    match entries {
        Some(entries) => Ok(entries.iter().map(ScanItem::from_raw).collect()),
        None => Err(KataClientError::UnexpectedShape {
            found: json_type_name(data),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
    }
}
