use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::Api;
use kube::api::{ListParams, LogParams};
use tracing::debug;

use kubeconsole_logs::{LogParser, LogSource, compare_stamps};
use kubeconsole_types::{ConsoleTarget, LogItem};

/// Errors raised while fetching from the cluster
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("kubernetes request failed: {0}")]
    Kube(#[from] kube::Error),

    #[error("invalid window start {0:?}")]
    InvalidSince(String),
}

/// Extra seconds requested beyond the window start
///
/// The API server measures `sinceSeconds` on its own clock; the margin keeps
/// the last buffered second inside the window when the local clock runs
/// behind. Lines older than the window start are discarded by the merge.
pub const CLOCK_SKEW_MARGIN_SECS: i64 = 5;

/// Build log request parameters for a fetch window
///
/// The window start is truncated to its whole second and the elapsed time
/// rounded up, since the log endpoint only accepts whole seconds.
pub fn log_params(
    container: Option<&str>,
    tail_lines: i64,
    since: Option<&str>,
    now: DateTime<Utc>,
) -> Result<LogParams, SourceError> {
    let mut params = LogParams {
        container: container.map(str::to_string),
        timestamps: true,
        ..Default::default()
    };

    match since {
        Some(since) => {
            let start = DateTime::parse_from_rfc3339(since)
                .map_err(|_| SourceError::InvalidSince(since.to_string()))?;
            let elapsed_ms = (now.timestamp_millis() - start.timestamp() * 1000).max(0);
            params.since_seconds = Some((elapsed_ms + 999) / 1000 + CLOCK_SKEW_MARGIN_SECS);
        }
        None => params.tail_lines = Some(tail_lines),
    }

    Ok(params)
}

/// Container log output of one pod
pub struct PodLogSource {
    api: Api<Pod>,
    pod: String,
    container: Option<String>,
    tail_lines: i64,
}

impl PodLogSource {
    pub fn new(client: kube::Client, target: &ConsoleTarget, tail_lines: i64) -> Self {
        Self {
            api: Api::namespaced(client, &target.namespace),
            pod: target.pod.clone(),
            container: target.container.clone(),
            tail_lines,
        }
    }
}

impl LogSource for PodLogSource {
    type Error = SourceError;

    async fn fetch(&self, since: Option<&str>) -> Result<Vec<LogItem>, SourceError> {
        let params = log_params(self.container.as_deref(), self.tail_lines, since, Utc::now())?;
        let body = self.api.logs(&self.pod, &params).await?;
        let items = LogParser::parse_body(&body);
        debug!(pod = %self.pod, lines = items.len(), ?since, "fetched logs");
        Ok(items)
    }
}

/// Events whose involved object is the pod
pub struct PodEventSource {
    api: Api<Event>,
    pod: String,
}

impl PodEventSource {
    pub fn new(client: kube::Client, target: &ConsoleTarget) -> Self {
        Self {
            api: Api::namespaced(client, &target.namespace),
            pod: target.pod.clone(),
        }
    }
}

impl LogSource for PodEventSource {
    type Error = SourceError;

    async fn fetch(&self, _since: Option<&str>) -> Result<Vec<LogItem>, SourceError> {
        let params = ListParams::default().fields(&format!("involvedObject.name={}", self.pod));
        let events = self.api.list(&params).await?;

        let mut items: Vec<LogItem> = events.items.iter().map(event_to_item).collect();
        items.sort_by(|a, b| compare_stamps(a.time_stamp(), b.time_stamp()));
        debug!(pod = %self.pod, events = items.len(), "fetched events");
        Ok(items)
    }
}

/// Render an event as a console line
///
/// Uses the most recent of the event's timestamps, formatted as RFC3339 with
/// nanoseconds so it sorts with container log lines.
pub fn event_to_item(event: &Event) -> LogItem {
    let stamp = event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.first_timestamp.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .unwrap_or_default();

    let mut text = format!(
        "{} {}: {}",
        event.type_.as_deref().unwrap_or("Normal"),
        event.reason.as_deref().unwrap_or("-"),
        event.message.as_deref().unwrap_or("").trim()
    );
    if let Some(count) = event.count.filter(|c| *c > 1) {
        text.push_str(&format!(" (x{})", count));
    }

    LogItem::new(stamp, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    #[test]
    fn test_first_fetch_uses_tail_lines() {
        let params = log_params(Some("app"), 100, None, Utc::now()).unwrap();
        assert!(params.timestamps);
        assert_eq!(params.tail_lines, Some(100));
        assert_eq!(params.since_seconds, None);
        assert_eq!(params.container.as_deref(), Some("app"));
    }

    #[test]
    fn test_window_starts_at_whole_second_with_margin() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 10).unwrap();
        let params = log_params(None, 100, Some("2024-01-15T10:30:07.250Z"), now).unwrap();
        assert_eq!(params.since_seconds, Some(3 + CLOCK_SKEW_MARGIN_SECS));
        assert_eq!(params.tail_lines, None);

        // Partial seconds round up
        let now = now + chrono::Duration::milliseconds(400);
        let params = log_params(None, 100, Some("2024-01-15T12:30:07.250+02:00"), now).unwrap();
        assert_eq!(params.since_seconds, Some(4 + CLOCK_SKEW_MARGIN_SECS));
    }

    #[test]
    fn test_window_start_ahead_of_local_clock() {
        // Local clock two seconds behind the server that stamped the line
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 5).unwrap();
        let params = log_params(None, 100, Some("2024-01-15T10:30:07.900Z"), now).unwrap();
        assert_eq!(params.since_seconds, Some(CLOCK_SKEW_MARGIN_SECS));
    }

    #[test]
    fn test_invalid_window_start() {
        let err = log_params(None, 100, Some("yesterday"), Utc::now()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidSince(_)));
    }

    #[test]
    fn test_event_to_item() {
        let event = Event {
            type_: Some("Warning".to_string()),
            reason: Some("BackOff".to_string()),
            message: Some("Back-off restarting failed container\n".to_string()),
            count: Some(3),
            last_timestamp: Some(Time(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())),
            ..Default::default()
        };

        let item = event_to_item(&event);
        assert_eq!(item.time_stamp(), "2024-01-15T10:30:00.000000000Z");
        assert_eq!(
            item.log_data(),
            "Warning BackOff: Back-off restarting failed container (x3)"
        );
    }

    #[test]
    fn test_event_without_timestamps() {
        let item = event_to_item(&Event::default());
        assert_eq!(item.time_stamp(), "");
        assert_eq!(item.log_data(), "Normal -: ");
    }
}
