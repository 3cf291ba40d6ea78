//! Optional debug events
//!
//! Operations describe what they do through a [`DebugLog`]. By default it is
//! a no-op; it can forward to `tracing` or to a caller supplied sink.
//! Setting `KATA_SDK_DEBUG` to any non-empty value, or listing `kata-sdk`
//! in `DEBUG`, switches the default to `tracing`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Prefix carried by every debug event
pub const DEBUG_PREFIX: &str = "[kata-sdk]";

/// Callback receiving `(event, fields)` for every debug event
pub type DebugSink = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Destination of debug events
#[derive(Clone, Default)]
pub enum DebugLog {
    #[default]
    Off,
    /// `tracing::debug!` under the `kata_sdk` target
    Tracing,
    Sink(DebugSink),
}

impl DebugLog {
    /// Pick the destination: a custom sink wins, then the explicit flag or environment
    pub fn resolve(enabled: bool, sink: Option<DebugSink>) -> Self {
        match sink {
            Some(sink) => Self::Sink(sink),
            None if enabled || env_enabled() => Self::Tracing,
            None => Self::Off,
        }
    }

    /// Wrap a closure as a sink
    pub fn sink<F>(f: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        Self::Sink(Arc::new(f))
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Emit one event; `fields` is only evaluated when enabled
    pub fn emit(&self, event: &str, fields: impl FnOnce() -> Value) {
        match self {
            Self::Off => {}
            Self::Tracing => {
                let fields = fields();
                tracing::debug!(target: "kata_sdk", "{} {} {}", DEBUG_PREFIX, event, fields);
            }
            Self::Sink(sink) => sink(&format!("{} {}", DEBUG_PREFIX, event), &fields()),
        }
    }
}

impl fmt::Debug for DebugLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::Tracing => f.write_str("Tracing"),
            Self::Sink(_) => f.write_str("Sink(..)"),
        }
    }
}

fn env_enabled() -> bool {
    env_flags_enable(
        std::env::var("KATA_SDK_DEBUG").ok().as_deref(),
        std::env::var("DEBUG").ok().as_deref(),
    )
}

/// `KATA_SDK_DEBUG` non-empty, or `DEBUG` naming `kata-sdk` as a whole word
pub(crate) fn env_flags_enable(kata_sdk_debug: Option<&str>, debug: Option<&str>) -> bool {
    if kata_sdk_debug.is_some_and(|v| !v.is_empty()) {
        return true;
    }
    debug.is_some_and(|v| contains_word(&v.to_ascii_lowercase(), "kata-sdk"))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_env_flags() {
        assert!(env_flags_enable(Some("1"), None));
        assert!(!env_flags_enable(Some(""), None));
        assert!(env_flags_enable(None, Some("kata-sdk")));
        assert!(env_flags_enable(None, Some("express,KATA-SDK,http")));
        assert!(env_flags_enable(None, Some("app:* kata-sdk")));
        assert!(!env_flags_enable(None, Some("kata-sdkx")));
        assert!(!env_flags_enable(None, Some("mykata-sdk")));
        assert!(!env_flags_enable(None, None));
    }

    #[test]
    fn test_sink_wins_over_flag() {
        let sink: DebugSink = Arc::new(|_: &str, _: &Value| {});
        let log = DebugLog::resolve(false, Some(sink));
        assert!(matches!(log, DebugLog::Sink(_)));
    }

    #[test]
    fn test_explicit_flag_enables_tracing() {
        assert!(matches!(DebugLog::resolve(true, None), DebugLog::Tracing));
    }

    #[test]
    fn test_sink_receives_prefixed_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let log = DebugLog::sink(move |event, fields| {
            captured
                .lock()
                .unwrap()
                .push((event.to_string(), fields.clone()));
        });

        log.emit("init", || json!({"sensorId": "s1"}));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "[kata-sdk] init");
        assert_eq!(seen[0].1["sensorId"], "s1");
    }

    #[test]
    fn test_off_does_not_build_fields() {
        DebugLog::Off.emit("never", || panic!("fields built while disabled"));
    }
}
