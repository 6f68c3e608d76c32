use std::future::Future;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tracing::info;

use llmrelay_common::RelayResult;
use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::response::{FinishReason, GenerateContentResponse};
use llmrelay_protocol::gemini::types::{Content, Part};

/// The literal continuation nudge. It never reaches the client.
pub(super) const CONTINUE_INSTRUCTION: &str = "Please continue from where you left off.";

pub(super) type GeminiStream =
    Pin<Box<dyn Stream<Item = RelayResult<GenerateContentResponse>> + Send>>;
pub(super) type StreamCall = Box<
    dyn FnMut(
            GenerateContentRequest,
        ) -> Pin<Box<dyn Future<Output = RelayResult<GeminiStream>> + Send>>
        + Send,
>;

/// Anti-truncation driver, a plain loop over the states streaming,
/// appending, done.
///
/// `first` is the already-opened round-zero stream; every follow-up round
/// re-issues through `call` with a fresh copy of the original `contents`
/// plus the accumulated continuation turns. A round that ends in
/// `MAX_TOKENS` with text generated has its terminator swallowed, so the
/// client sees one uninterrupted answer.
pub(super) fn run_with_continuation(
    first: GeminiStream,
    base_request: GenerateContentRequest,
    anti_truncation: bool,
    mut call: StreamCall,
) -> impl Stream<Item = RelayResult<GenerateContentResponse>> + Send {
    async_stream::stream! {
        let original_contents = base_request.contents.clone();
        let mut continuations: Vec<Content> = Vec::new();
        let mut upstream = Some(first);
        loop {
            let mut current = match upstream.take() {
                Some(current) => current,
                None => {
                    let mut request = base_request.clone();
                    request.contents = original_contents.clone();
                    request.contents.extend(continuations.iter().cloned());
                    match call(request).await {
                        Ok(current) => current,
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            };

            let mut collected_text = String::new();
            let mut truncated = false;
            while let Some(item) = current.next().await {
                let mut chunk = match item {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };
                collected_text.push_str(&chunk.primary_text());

                if anti_truncation
                    && chunk.finish_reason() == Some(FinishReason::MaxTokens)
                    && !collected_text.is_empty()
                {
                    truncated = true;
                    if let Some(candidate) = chunk.candidates.first_mut() {
                        candidate.finish_reason = None;
                    }
                    let has_payload = chunk
                        .candidates
                        .first()
                        .and_then(|candidate| candidate.content.as_ref())
                        .map(|content| !content.parts.is_empty())
                        .unwrap_or(false);
                    if has_payload {
                        yield Ok(chunk);
                    }
                    continue;
                }
                yield Ok(chunk);
            }

            if !truncated {
                return;
            }
            continuations.push(Content::model(vec![Part::text(collected_text.clone())]));
            continuations.push(Content::user(vec![Part::text(CONTINUE_INSTRUCTION)]));
            info!(event = "anti_truncation_continue", round = continuations.len() / 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::gemini::response::Candidate;
    use std::sync::{Arc, Mutex};

    fn text_chunk(text: &str, finish: Option<FinishReason>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(vec![Part::text(text)])),
                finish_reason: finish,
                index: Some(0),
            }],
            ..GenerateContentResponse::default()
        }
    }

    fn scripted(chunks: Vec<GenerateContentResponse>) -> GeminiStream {
        Box::pin(futures_util::stream::iter(chunks.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn truncated_round_triggers_one_continuation_call() {
        // Round 0 ends in MAX_TOKENS with text; round 1 finishes normally.
        let first = scripted(vec![text_chunk("T1", Some(FinishReason::MaxTokens))]);
        let seen_requests: Arc<Mutex<Vec<GenerateContentRequest>>> =
            Arc::new(Mutex::new(Vec::new()));
        let seen = seen_requests.clone();
        let call: StreamCall = Box::new(move |request| {
            seen.lock().unwrap().push(request);
            Box::pin(async {
                Ok(scripted(vec![text_chunk("T2", Some(FinishReason::Stop))]))
            })
        });

        let base = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("Q")])],
            ..GenerateContentRequest::default()
        };
        let stream = run_with_continuation(first, base, true, call);
        let chunks: Vec<_> = stream.collect::<Vec<_>>().await;
        let chunks: Vec<GenerateContentResponse> =
            chunks.into_iter().map(|item| item.unwrap()).collect();

        // The client sees T1 then T2, one terminal finish, no nudge text.
        let text: String = chunks.iter().map(|c| c.primary_text()).collect();
        assert_eq!(text, "T1T2");
        let finishes: Vec<_> = chunks.iter().filter_map(|c| c.finish_reason()).collect();
        assert_eq!(finishes, vec![FinishReason::Stop]);

        // The continuation call got the original contents plus the two
        // appended turns, verbatim.
        let requests = seen_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let contents = &requests[0].contents;
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].parts[0].text.as_deref(), Some("Q"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[1].parts[0].text.as_deref(), Some("T1"));
        assert_eq!(contents[2].role.as_deref(), Some("user"));
        assert_eq!(
            contents[2].parts[0].text.as_deref(),
            Some(CONTINUE_INSTRUCTION)
        );
    }

    #[tokio::test]
    async fn disabled_anti_truncation_forwards_max_tokens() {
        let first = scripted(vec![text_chunk("T1", Some(FinishReason::MaxTokens))]);
        let call: StreamCall = Box::new(|_| {
            Box::pin(async {
                Err(llmrelay_common::GatewayError::PoolExhausted(
                    "continuation not expected".to_string(),
                ))
            })
        });
        let stream = run_with_continuation(
            first,
            GenerateContentRequest::default(),
            false,
            call,
        );
        let chunks: Vec<_> = stream.collect::<Vec<_>>().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].as_ref().unwrap().finish_reason(),
            Some(FinishReason::MaxTokens)
        );
    }

    #[tokio::test]
    async fn empty_truncated_round_stops_without_continuing() {
        // MAX_TOKENS with no text generated: nothing to continue from.
        let first = scripted(vec![text_chunk("", Some(FinishReason::MaxTokens))]);
        let call: StreamCall = Box::new(|_| {
            Box::pin(async {
                Err(llmrelay_common::GatewayError::PoolExhausted(
                    "continuation not expected".to_string(),
                ))
            })
        });
        let stream = run_with_continuation(
            first,
            GenerateContentRequest::default(),
            true,
            call,
        );
        let chunks: Vec<_> = stream.collect::<Vec<_>>().await;
        assert_eq!(chunks.len(), 1);
    }
}
