//! Polling a scan until it reaches a terminal state

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use crate::debug::DebugLog;
use crate::error::Result;
use crate::types::{GetScansParams, ScanId, ScanItem, ScanState};

/// Default pause between two state queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Anything that can answer a scan state query
///
/// [`KataClient`](crate::KataClient) is the production source.
#[async_trait]
pub trait ScanStateSource: Send + Sync {
    async fn get_scans(&self, params: &GetScansParams) -> Result<Vec<ScanItem>>;
}

/// Options for [`wait_for_terminal`]
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Pause between polls
    pub poll_interval: Duration,
    /// Restrict the query to one sensor instance
    pub sensor_instance_id: Option<String>,
    /// Overall budget; the client falls back to its configured wait timeout
    pub budget: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            sensor_instance_id: None,
            budget: None,
        }
    }
}

impl WaitOptions {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn sensor_instance_id(mut self, id: impl Into<String>) -> Self {
        self.sensor_instance_id = Some(id.into());
        self
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// Poll `source` until `scan_id` reports a terminal state or `budget` runs out
///
/// The first query always happens, even with a zero budget. The deadline is
/// checked after each sleep. Query errors abort the wait unchanged.
/// Returns `Ok(None)` when the deadline passes without a terminal state.
pub async fn wait_for_terminal<S>(
    source: &S,
    scan_id: &ScanId,
    poll_interval: Duration,
    sensor_instance_id: Option<&str>,
    budget: Duration,
    log: &DebugLog,
) -> Result<Option<ScanItem>>
where
    S: ScanStateSource + ?Sized,
{
    let deadline = Instant::now() + budget;
    let params = GetScansParams {
        states: Some(ScanState::wait_filter()),
        sensor_instance_id: sensor_instance_id.map(str::to_string),
    };

    log.emit("waitForResult: start", || {
        json!({
            "scanId": scan_id.to_string(),
            "pollIntervalMs": poll_interval.as_millis() as u64,
            "timeoutMs": budget.as_millis() as u64,
            "states": params.states,
        })
    });

    loop {
        let items = source.get_scans(&params).await?;
        let hit = items.into_iter().find(|item| item.is_scan(scan_id));

        log.emit("waitForResult: poll", || {
            json!({
                "found": hit.is_some(),
                "terminal": hit.as_ref().is_some_and(ScanItem::is_terminal),
                "remainingMs": deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            })
        });

        if let Some(item) = hit.filter(ScanItem::is_terminal) {
            return Ok(Some(item));
        }

        tokio::time::sleep(poll_interval).await;
        if Instant::now() >= deadline {
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KataClientError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted responses; the last one repeats forever
    struct ScriptedSource {
        responses: Mutex<VecDeque<Vec<ScanItem>>>,
        calls: AtomicUsize,
        last_params: Mutex<Option<GetScansParams>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Vec<ScanItem>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                last_params: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScanStateSource for ScriptedSource {
        async fn get_scans(&self, params: &GetScansParams) -> Result<Vec<ScanItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_params.lock().unwrap() = Some(params.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.pop_front().unwrap_or_default())
            } else {
                Ok(responses.front().cloned().unwrap_or_default())
            }
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ScanStateSource for FailingSource {
        async fn get_scans(&self, _params: &GetScansParams) -> Result<Vec<ScanItem>> {
            Err(KataClientError::HttpStatus { status: 503 })
        }
    }

    fn item(id: impl Into<ScanId>, states: &[ScanState]) -> ScanItem {
        ScanItem {
            scan_id: Some(id.into()),
            state: states.to_vec(),
        }
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_returns_on_first_terminal_poll() {
        let source = ScriptedSource::new(vec![vec![
            item("other", &[ScanState::Detect]),
            item("42", &[ScanState::NotDetected]),
        ]]);

        let start = Instant::now();
        let hit = wait_for_terminal(&source, &ScanId::from(42i64), MINUTE, None, MINUTE, &DebugLog::Off)
            .await
            .unwrap();

        assert_eq!(hit, Some(item("42", &[ScanState::NotDetected])));
        assert_eq!(source.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_alongside_processing_counts() {
        let source = ScriptedSource::new(vec![vec![item(
            7i64,
            &[ScanState::Processing, ScanState::Error],
        )]]);

        let hit = wait_for_terminal(&source, &ScanId::from("7"), MINUTE, None, MINUTE, &DebugLog::Off)
            .await
            .unwrap();

        assert!(hit.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_polling_while_processing() {
        let source = ScriptedSource::new(vec![
            vec![item("a", &[ScanState::Processing])],
            vec![],
            vec![item("a", &[ScanState::Processing])],
            vec![item("a", &[ScanState::Processing, ScanState::Detect])],
        ]);

        let start = Instant::now();
        let hit = wait_for_terminal(
            &source,
            &ScanId::from("a"),
            Duration::from_secs(10),
            None,
            Duration::from_secs(600),
            &DebugLog::Off,
        )
        .await
        .unwrap();

        assert_eq!(hit.unwrap().state, vec![ScanState::Processing, ScanState::Detect]);
        assert_eq!(source.calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires_while_processing() {
        let source = ScriptedSource::new(vec![vec![item("a", &[ScanState::Processing])]]);

        let start = Instant::now();
        let hit = wait_for_terminal(
            &source,
            &ScanId::from("a"),
            MINUTE,
            None,
            Duration::from_secs(150),
            &DebugLog::Off,
        )
        .await
        .unwrap();

        assert_eq!(hit, None);
        // polls at 0s, 60s, 120s; the check after the 180s wake-up expires
        assert_eq!(source.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_polls_once() {
        let source = ScriptedSource::new(vec![vec![]]);

        let hit = wait_for_terminal(
            &source,
            &ScanId::from("missing"),
            MINUTE,
            None,
            Duration::ZERO,
            &DebugLog::Off,
        )
        .await
        .unwrap();

        assert_eq!(hit, None);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_aborts_wait() {
        let result = wait_for_terminal(
            &FailingSource,
            &ScanId::from("a"),
            MINUTE,
            None,
            Duration::from_secs(3600),
            &DebugLog::Off,
        )
        .await;

        assert!(matches!(
            result,
            Err(KataClientError::HttpStatus { status: 503 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_uses_wait_filter_and_instance() {
        let source = ScriptedSource::new(vec![vec![item("a", &[ScanState::Timeout])]]);

        wait_for_terminal(
            &source,
            &ScanId::from("a"),
            MINUTE,
            Some("instance-2"),
            MINUTE,
            &DebugLog::Off,
        )
        .await
        .unwrap();

        let params = source.last_params.lock().unwrap().clone().unwrap();
        assert_eq!(params.states, Some(ScanState::wait_filter()));
        assert_eq!(params.sensor_instance_id.as_deref(), Some("instance-2"));
        assert_eq!(
            params.to_query_string(),
            "state=processing%2Cdetect%2Cnot%20detected%2Cerror%2Ctimeout&sensorInstanceId=instance-2"
        );
    }

    #[test]
    fn test_default_options() {
        let options = WaitOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(60));
        assert!(options.sensor_instance_id.is_none());
        assert!(options.budget.is_none());
    }
}
