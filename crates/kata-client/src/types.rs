//! Request and response types for the KATA scanner API

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Scan State
// =============================================================================

/// State reported by the scanner for one scan
///
/// The wire form is the lowercase string (`"not detected"` contains a space).
/// Strings the scanner may add later are kept as [`ScanState::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScanState {
    Detect,
    NotDetected,
    Processing,
    Timeout,
    Error,
    Unknown(String),
}

impl ScanState {
    /// States after which a scan no longer changes
    pub const TERMINAL: [ScanState; 4] = [
        ScanState::Detect,
        ScanState::NotDetected,
        ScanState::Error,
        ScanState::Timeout,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Detect => "detect",
            Self::NotDetected => "not detected",
            Self::Processing => "processing",
            Self::Timeout => "timeout",
            Self::Error => "error",
            Self::Unknown(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Filter used when waiting for a scan: `processing` plus every terminal state
    pub fn wait_filter() -> Vec<ScanState> {
        let mut states = vec![ScanState::Processing];
        states.extend(Self::TERMINAL);
        states
    }
}

impl From<&str> for ScanState {
    fn from(s: &str) -> Self {
        match s {
            "detect" => Self::Detect,
            "not detected" => Self::NotDetected,
            "processing" => Self::Processing,
            "timeout" => Self::Timeout,
            "error" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ScanState {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ScanState> for String {
    fn from(state: ScanState) -> Self {
        match state {
            ScanState::Unknown(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for ScanState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Scan Identifier
// =============================================================================

/// Scan identifier as received from or sent to the scanner
///
/// The API documents an integer, deployments also return strings. Two ids
/// are the same scan when their string forms are equal, see [`ScanId::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanId {
    Integer(i64),
    Text(String),
}

impl ScanId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self::from(Uuid::new_v4())
    }

    /// Compare two ids by canonical string form (`42` matches `"42"`)
    pub fn matches(&self, other: &ScanId) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Lenient conversion from a raw JSON value; strings and numbers are ids
    ///
    /// Numbers outside `i64` (large unsigned, floats) keep their JSON text.
    pub(crate) fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Number(n) => Some(
                n.as_i64()
                    .map(Self::Integer)
                    .unwrap_or_else(|| Self::Text(n.to_string())),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ScanId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ScanId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ScanId {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<Uuid> for ScanId {
    fn from(id: Uuid) -> Self {
        Self::Text(id.to_string())
    }
}

// =============================================================================
// Scan Items
// =============================================================================

/// Last known status of one scan, rebuilt from every state query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanItem {
    /// `None` when the entry carried no string or integer id
    #[serde(rename = "scanId")]
    pub scan_id: Option<ScanId>,
    /// Several engines may report independently; may be empty
    pub state: Vec<ScanState>,
}

impl ScanItem {
    /// Map one raw response entry, coercing `state` to a list
    pub(crate) fn from_raw(entry: &serde_json::Value) -> Self {
        let scan_id = entry.get("scanId").and_then(ScanId::from_json);
        let state = match entry.get("state") {
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str())
                .map(ScanState::from)
                .collect(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => vec![ScanState::from(s.as_str())],
            _ => Vec::new(),
        };
        Self { scan_id, state }
    }

    /// Whether any reported state is terminal, even alongside `processing`
    pub fn is_terminal(&self) -> bool {
        self.state.iter().any(ScanState::is_terminal)
    }

    /// Whether this item describes the given scan
    pub fn is_scan(&self, scan_id: &ScanId) -> bool {
        self.scan_id.as_ref().is_some_and(|id| id.matches(scan_id))
    }
}

/// Filter for a state query; `None` means no filter for that dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetScansParams {
    #[serde(default)]
    pub states: Option<Vec<ScanState>>,
    #[serde(default, rename = "sensorInstanceId")]
    pub sensor_instance_id: Option<String>,
}

impl GetScansParams {
    pub fn with_states(mut self, states: impl IntoIterator<Item = ScanState>) -> Self {
        self.states = Some(states.into_iter().collect());
        self
    }

    pub fn with_sensor_instance(mut self, id: impl Into<String>) -> Self {
        self.sensor_instance_id = Some(id.into());
        self
    }

    /// Build the query string without the leading `?`
    ///
    /// `["processing", "error"]` becomes `state=processing%2Cerror`. An empty
    /// state list or sensor instance is treated as absent.
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(states) = self.states.as_deref().filter(|s| !s.is_empty()) {
            let joined = states
                .iter()
                .map(ScanState::as_str)
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("state={}", urlencoding::encode(&joined)));
        }
        if let Some(instance) = self.sensor_instance_id.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("sensorInstanceId={}", urlencoding::encode(instance)));
        }
        parts.join("&")
    }
}

// =============================================================================
// Submission
// =============================================================================

/// Binary content of a submission
///
/// Every source converts without failing; absent content is an empty part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    Bytes(Bytes),
    Buffer(Vec<u8>),
    #[default]
    Empty,
}

impl Payload {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b.to_vec(),
            Self::Buffer(v) => v,
            Self::Empty => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(b) => b.len(),
            Self::Buffer(v) => v.len(),
            Self::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Self::Buffer(v)
    }
}

impl From<&[u8]> for Payload {
    fn from(v: &[u8]) -> Self {
        Self::Buffer(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(v: &[u8; N]) -> Self {
        Self::Buffer(v.to_vec())
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Buffer(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Buffer(s.into_bytes())
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Empty)
    }
}

/// Default file name of the `content` part
pub const DEFAULT_FILENAME: &str = "file.bin";
/// Default `objectType` field
pub const DEFAULT_OBJECT_TYPE: &str = "file";

/// One file submission
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub payload: Payload,
    pub filename: String,
    /// Generated when absent
    pub scan_id: Option<ScanId>,
    pub object_type: String,
    pub sensor_instance_id: Option<String>,
}

impl SubmitRequest {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            filename: DEFAULT_FILENAME.to_string(),
            scan_id: None,
            object_type: DEFAULT_OBJECT_TYPE.to_string(),
            sensor_instance_id: None,
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn scan_id(mut self, scan_id: impl Into<ScanId>) -> Self {
        self.scan_id = Some(scan_id.into());
        self
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = object_type.into();
        self
    }

    pub fn sensor_instance_id(mut self, id: impl Into<String>) -> Self {
        self.sensor_instance_id = Some(id.into());
        self
    }
}

/// Outcome of one submission; the HTTP status is data, not an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub status: u16,
    /// Exactly the id that was sent
    #[serde(rename = "scanId")]
    pub scan_id: ScanId,
    #[serde(default)]
    pub message: Option<String>,
    pub ok: bool,
}

impl SubmitResult {
    pub(crate) fn new(status: u16, scan_id: ScanId, message: Option<String>) -> Self {
        let ok = message
            .as_deref()
            .is_some_and(|m| m.to_uppercase() == "OK");
        Self {
            status,
            scan_id,
            message,
            ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_state_wire_names() {
        assert_eq!(ScanState::from("not detected"), ScanState::NotDetected);
        assert_eq!(ScanState::NotDetected.to_string(), "not detected");
        assert_eq!(
            serde_json::to_value(ScanState::Processing).unwrap(),
            json!("processing")
        );
        let unknown: ScanState = serde_json::from_value(json!("queued")).unwrap();
        assert_eq!(unknown, ScanState::Unknown("queued".into()));
        assert!(!unknown.is_terminal());
    }

    #[test]
    fn test_terminal_set() {
        assert!(ScanState::Detect.is_terminal());
        assert!(ScanState::NotDetected.is_terminal());
        assert!(ScanState::Error.is_terminal());
        assert!(ScanState::Timeout.is_terminal());
        assert!(!ScanState::Processing.is_terminal());
        assert_eq!(ScanState::wait_filter().len(), 5);
        assert_eq!(ScanState::wait_filter()[0], ScanState::Processing);
    }

    #[test]
    fn test_scan_id_matches_across_representations() {
        assert!(ScanId::from(42i64).matches(&ScanId::from("42")));
        assert!(ScanId::from("42").matches(&ScanId::from(42i64)));
        assert!(!ScanId::from("042").matches(&ScanId::from(42i64)));
        assert!(!ScanId::from("abc").matches(&ScanId::from("ABC")));
    }

    #[test]
    fn test_scan_id_serde_untagged() {
        let n: ScanId = serde_json::from_value(json!(7)).unwrap();
        let s: ScanId = serde_json::from_value(json!("7")).unwrap();
        assert_eq!(n, ScanId::Integer(7));
        assert_eq!(s, ScanId::Text("7".into()));
        assert_eq!(serde_json::to_value(&n).unwrap(), json!(7));
    }

    #[test]
    fn test_scan_item_state_coercion() {
        let item = ScanItem::from_raw(&json!({"scanId": 1, "state": "processing"}));
        assert_eq!(item.scan_id, Some(ScanId::Integer(1)));
        assert_eq!(item.state, vec![ScanState::Processing]);

        let item = ScanItem::from_raw(&json!({"scanId": "a", "state": ["detect", "error"]}));
        assert_eq!(item.state, vec![ScanState::Detect, ScanState::Error]);

        let item = ScanItem::from_raw(&json!({"scanId": "a", "state": null}));
        assert!(item.state.is_empty());

        let item = ScanItem::from_raw(&json!({"scanId": "a", "state": 5}));
        assert!(item.state.is_empty());

        let item = ScanItem::from_raw(&json!({"scanId": "a", "state": ""}));
        assert!(item.state.is_empty());

        let item = ScanItem::from_raw(&json!({"state": ["processing"]}));
        assert_eq!(item.scan_id, None);

        let item = ScanItem::from_raw(&json!(3));
        assert_eq!(item.scan_id, None);
        assert!(item.state.is_empty());
    }

    #[test]
    fn test_scan_item_keeps_numbers_outside_i64() {
        let item = ScanItem::from_raw(&json!({"scanId": u64::MAX, "state": "detect"}));
        assert_eq!(
            item.scan_id,
            Some(ScanId::Text("18446744073709551615".into()))
        );
        assert!(item.is_scan(&ScanId::from("18446744073709551615")));

        let item = ScanItem::from_raw(&json!({"scanId": 1.5, "state": "detect"}));
        assert_eq!(item.scan_id, Some(ScanId::Text("1.5".into())));
    }

    #[test]
    fn test_item_terminal_with_processing() {
        let item = ScanItem {
            scan_id: Some(ScanId::from(1i64)),
            state: vec![ScanState::Processing, ScanState::NotDetected],
        };
        assert!(item.is_terminal());

        let item = ScanItem {
            scan_id: Some(ScanId::from(1i64)),
            state: vec![ScanState::Processing],
        };
        assert!(!item.is_terminal());
    }

    #[test]
    fn test_query_string() {
        let params = GetScansParams::default()
            .with_states([ScanState::Processing, ScanState::Error]);
        assert_eq!(params.to_query_string(), "state=processing%2Cerror");

        let params = GetScansParams::default()
            .with_states([ScanState::NotDetected])
            .with_sensor_instance("pool a/1");
        assert_eq!(
            params.to_query_string(),
            "state=not%20detected&sensorInstanceId=pool%20a%2F1"
        );

        let params = GetScansParams::default().with_states(Vec::new());
        assert_eq!(params.to_query_string(), "");
        assert_eq!(GetScansParams::default().to_query_string(), "");
    }

    #[test]
    fn test_payload_conversions_never_fail() {
        assert_eq!(Payload::from(vec![1u8, 2, 3]).into_bytes(), vec![1, 2, 3]);
        assert_eq!(Payload::from(&b"MZ"[..]).into_bytes(), b"MZ".to_vec());
        assert_eq!(Payload::from(b"MZ").len(), 2);
        assert_eq!(Payload::from(Bytes::from_static(b"abc")).len(), 3);
        assert_eq!(Payload::from("text").into_bytes(), b"text".to_vec());
        assert!(Payload::from(None::<Vec<u8>>).into_bytes().is_empty());
        assert!(Payload::Empty.is_empty());
    }

    #[test]
    fn test_submit_request_defaults() {
        let req = SubmitRequest::new(vec![0u8; 4]);
        assert_eq!(req.filename, "file.bin");
        assert_eq!(req.object_type, "file");
        assert!(req.scan_id.is_none());
        assert!(req.sensor_instance_id.is_none());
    }

    #[test]
    fn test_submit_result_ok_flag() {
        assert!(SubmitResult::new(200, ScanId::from("a"), Some("ok".into())).ok);
        assert!(SubmitResult::new(500, ScanId::from("a"), Some("OK".into())).ok);
        assert!(!SubmitResult::new(200, ScanId::from("a"), Some("OK.".into())).ok);
        assert!(!SubmitResult::new(200, ScanId::from("a"), None).ok);
    }
}
