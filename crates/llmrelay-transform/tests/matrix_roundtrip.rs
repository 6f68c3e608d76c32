use llmrelay_common::Protocol;
use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::stream::{ContentBlockDelta, MessageDelta, StreamEvent};
use llmrelay_protocol::claude::types::{
    MessageContent as ClaudeContent, MessageParam, Role, StopReason, ThinkingConfig,
    ToolChoice as ClaudeToolChoice, Usage as ClaudeUsage,
};
use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{
    ChatMessage, FunctionDefinition, MessageContent, ToolChoice, ToolChoiceMode, ToolDefinition,
};
use llmrelay_transform::{
    ChatRequest, StreamPayload, TransformOptions, convert_request, stream_converter,
};
use serde_json::json;

fn openai_tool_request() -> ChatCompletionRequest {
    let mut request = ChatCompletionRequest::new("claude-3-5-sonnet");
    request.messages = vec![ChatMessage::User {
        content: MessageContent::Text("Q".to_string()),
    }];
    request.tools = Some(vec![ToolDefinition {
        r#type: "function".to_string(),
        function: FunctionDefinition {
            name: "f".to_string(),
            description: Some("d".to_string()),
            parameters: Some(json!({
                "type": "object",
                "properties": { "x": { "type": "string" } }
            })),
        },
    }]);
    request.tool_choice = Some(ToolChoice::Mode(ToolChoiceMode::Required));
    request.max_tokens = Some(512);
    request.temperature = Some(0.7);
    request.top_p = Some(0.9);
    request
}

#[test]
fn openai_tool_call_request_maps_to_claude_shapes() {
    let out = convert_request(
        Protocol::Claude,
        ChatRequest::OpenAi(openai_tool_request()),
        &TransformOptions::default(),
    )
    .unwrap();
    let ChatRequest::Claude(claude) = out else {
        panic!("expected claude request");
    };
    assert_eq!(
        claude.messages[0].content,
        ClaudeContent::Text("Q".to_string())
    );
    let tools = claude.tools.as_ref().unwrap();
    assert_eq!(tools[0].name, "f");
    assert_eq!(tools[0].description.as_deref(), Some("d"));
    assert_eq!(claude.tool_choice, Some(ClaudeToolChoice::Any));
}

#[test]
fn request_round_trip_preserves_common_fields() {
    let original = openai_tool_request();
    let there = convert_request(
        Protocol::Claude,
        ChatRequest::OpenAi(original.clone()),
        &TransformOptions::default(),
    )
    .unwrap();
    let ChatRequest::Claude(claude) = there else {
        panic!("expected claude request");
    };
    let back = convert_request(
        Protocol::OpenAi,
        ChatRequest::Claude(claude),
        &TransformOptions::default(),
    )
    .unwrap();
    let ChatRequest::OpenAi(openai) = back else {
        panic!("expected openai request");
    };

    assert_eq!(openai.model, original.model);
    assert_eq!(openai.temperature, original.temperature);
    assert_eq!(openai.top_p, original.top_p);
    assert_eq!(openai.max_tokens, original.max_tokens);
    let tools = openai.tools.as_ref().unwrap();
    assert_eq!(tools[0].function.name, "f");
    assert_eq!(tools[0].function.description.as_deref(), Some("d"));
    assert!(matches!(
        openai.tool_choice,
        Some(ToolChoice::Mode(ToolChoiceMode::Required))
    ));
    assert!(matches!(
        &openai.messages[0],
        ChatMessage::User { content: MessageContent::Text(text) } if text == "Q"
    ));
}

#[test]
fn thinking_request_converts_to_reasoning_effort() {
    let mut request = MessagesRequest::new("claude-3-5-sonnet", 8000);
    request.messages = vec![MessageParam {
        role: Role::User,
        content: ClaudeContent::Text("Q".to_string()),
    }];
    request.thinking = Some(ThinkingConfig::Enabled { budget_tokens: 150 });

    let out = convert_request(
        Protocol::OpenAi,
        ChatRequest::Claude(request),
        &TransformOptions::default(),
    )
    .unwrap();
    let ChatRequest::OpenAi(openai) = out else {
        panic!("expected openai request");
    };
    assert_eq!(
        openai.reasoning_effort,
        Some(llmrelay_protocol::openai::types::ReasoningEffort::Medium)
    );
    assert_eq!(openai.max_completion_tokens, Some(8000));
    assert_eq!(openai.max_tokens, None);
}

fn claude_event_stream() -> Vec<StreamEvent> {
    vec![
        StreamEvent::MessageStart {
            message: MessageResponse::new("msg_1", "claude-3-5-sonnet"),
        },
        StreamEvent::ContentBlockStart {
            index: 0,
            content_block: llmrelay_protocol::claude::types::ContentBlock::Text {
                text: String::new(),
            },
        },
        StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentBlockDelta::TextDelta {
                text: "hel".to_string(),
            },
        },
        StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentBlockDelta::TextDelta {
                text: "lo".to_string(),
            },
        },
        StreamEvent::ContentBlockStop { index: 0 },
        StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(StopReason::MaxTokens),
                stop_sequence: None,
            },
            usage: Some(ClaudeUsage {
                input_tokens: Some(5),
                output_tokens: Some(2),
                ..ClaudeUsage::default()
            }),
        },
        StreamEvent::MessageStop,
    ]
}

#[test]
fn claude_stream_round_trip_is_structurally_equivalent() {
    let mut to_openai = stream_converter(Protocol::Claude, Protocol::OpenAi).unwrap();
    let mut back_to_claude = stream_converter(Protocol::OpenAi, Protocol::Claude).unwrap();

    let mut round_tripped = Vec::new();
    for event in claude_event_stream() {
        for chunk in to_openai.push(StreamPayload::Claude(event)).unwrap() {
            round_tripped.extend(back_to_claude.push(chunk).unwrap());
        }
    }

    let text: String = round_tripped
        .iter()
        .filter_map(|payload| match payload {
            StreamPayload::Claude(StreamEvent::ContentBlockDelta {
                delta: ContentBlockDelta::TextDelta { text },
                ..
            }) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "hello");

    assert!(matches!(
        round_tripped.first(),
        Some(StreamPayload::Claude(StreamEvent::MessageStart { .. }))
    ));
    let stop_reasons: Vec<StopReason> = round_tripped
        .iter()
        .filter_map(|payload| match payload {
            StreamPayload::Claude(StreamEvent::MessageDelta { delta, .. }) => delta.stop_reason,
            _ => None,
        })
        .collect();
    assert_eq!(stop_reasons, vec![StopReason::MaxTokens]);
    assert!(matches!(
        round_tripped.last(),
        Some(StreamPayload::Claude(StreamEvent::MessageStop))
    ));
}
