use std::future::Future;
use std::time::{Duration, SystemTime};

use futures_util::{Stream, StreamExt};
use http::StatusCode;
use http::header::RETRY_AFTER;
use serde_json::Value as JsonValue;
use tracing::warn;

use llmrelay_common::{GatewayError, RelayResult};
use llmrelay_protocol::sse::SseParser;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// The adapter retry ladder.
///
/// 401/400 trigger exactly one forced auth refresh before the retry; 429 and
/// 5xx back off exponentially (429 honoring Retry-After) up to
/// `max_retries`; anything else surfaces immediately with the upstream
/// status preserved.
pub(crate) async fn retry_request<S, SFut, R, RFut>(
    policy: &RetryPolicy,
    mut send: S,
    mut refresh: R,
) -> RelayResult<wreq::Response>
where
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<wreq::Response, wreq::Error>>,
    R: FnMut() -> RFut,
    RFut: Future<Output = RelayResult<()>>,
{
    let mut attempt: u32 = 0;
    let mut refreshed = false;
    loop {
        let response = match send().await {
            Ok(response) => response,
            Err(err) => {
                if attempt < policy.max_retries {
                    let delay = policy.backoff(attempt);
                    warn!(event = "upstream_network_retry", attempt = attempt, delay_ms = delay.as_millis() as u64, error = %err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(GatewayError::upstream(503, err.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if (status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST) && !refreshed
        {
            refreshed = true;
            warn!(event = "auth_refresh_retry", status = status.as_u16());
            refresh().await?;
            continue;
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if attempt < policy.max_retries {
                let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                    retry_after(&response).unwrap_or_else(|| policy.backoff(attempt))
                } else {
                    policy.backoff(attempt)
                };
                warn!(event = "upstream_retry", status = status.as_u16(), attempt = attempt, delay_ms = delay.as_millis() as u64);
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
        }

        return Err(upstream_error(response).await);
    }
}

pub(crate) async fn upstream_error(response: wreq::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        format!("upstream returned {status}")
    } else {
        body
    };
    match status {
        401 | 403 => GatewayError::AuthRejected(message),
        _ => GatewayError::upstream(status, message),
    }
}

fn retry_after(response: &wreq::Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?.trim().to_string();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = httpdate::parse_http_date(&value).ok()?;
    when.duration_since(SystemTime::now()).ok()
}

/// Decode an SSE body into the JSON payload of each event.
///
/// Single-event parse failures are logged and skipped; `[DONE]` markers are
/// swallowed. The stream ends when the connection does, flushing whatever
/// the parser still buffers.
pub(crate) fn sse_json_stream(
    response: wreq::Response,
) -> impl Stream<Item = RelayResult<JsonValue>> + Send {
    async_stream::stream! {
        let mut parser = SseParser::new();
        let mut body = std::pin::pin!(response.bytes_stream());
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(GatewayError::upstream(502, err.to_string()));
                    return;
                }
            };
            for event in parser.push_bytes(&chunk) {
                if let Some(value) = decode_event(&event.data) {
                    yield Ok(value);
                }
            }
        }
        for event in parser.finish() {
            if let Some(value) = decode_event(&event.data) {
                yield Ok(value);
            }
        }
    }
}

fn decode_event(data: &str) -> Option<JsonValue> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(event = "sse_event_skipped", error = %err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_exponential() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff(2), Duration::from_millis(4000));
    }

    #[test]
    fn done_marker_and_garbage_are_skipped() {
        assert!(decode_event("[DONE]").is_none());
        assert!(decode_event("").is_none());
        assert!(decode_event("{not json").is_none());
        assert_eq!(
            decode_event("{\"a\":1}"),
            Some(serde_json::json!({"a": 1}))
        );
    }
}
