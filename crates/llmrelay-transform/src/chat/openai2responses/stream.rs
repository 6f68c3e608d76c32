use llmrelay_protocol::openai::stream::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta,
};
use llmrelay_protocol::openai::types::FinishReason;
use llmrelay_protocol::openai_responses::response::{OutputItem, Response};
use llmrelay_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::chat::openai2responses::response::{finish_reason_for, map_usage};
use crate::ids;

/// Translate Responses stream events into OpenAI chat-completion chunks.
#[derive(Debug)]
pub struct ResponsesToOpenAiStream {
    id: String,
    created: i64,
    model: String,
    role_sent: bool,
    tool_calls_seen: u32,
}

impl ResponsesToOpenAiStream {
    pub fn new() -> Self {
        Self {
            id: ids::chat_completion_id(),
            created: ids::unix_timestamp(),
            model: String::new(),
            role_sent: false,
            tool_calls_seen: 0,
        }
    }

    pub fn transform_event(&mut self, event: ResponseStreamEvent) -> Vec<ChatCompletionChunk> {
        match event {
            ResponseStreamEvent::Created { response } => {
                self.absorb(&response);
                vec![self.chunk(
                    ChunkDelta {
                        role: Some("assistant".to_string()),
                        ..ChunkDelta::default()
                    },
                    None,
                    None,
                )]
            }
            ResponseStreamEvent::InProgress { response } => {
                self.absorb(&response);
                Vec::new()
            }
            ResponseStreamEvent::OutputTextDelta { delta, .. } => {
                if delta.is_empty() {
                    return Vec::new();
                }
                let role = self.take_role();
                vec![self.chunk(
                    ChunkDelta {
                        role,
                        content: Some(delta),
                        ..ChunkDelta::default()
                    },
                    None,
                    None,
                )]
            }
            ResponseStreamEvent::OutputItemAdded { item, .. } => match item {
                OutputItem::FunctionCall { call_id, name, .. } => {
                    let index = self.tool_calls_seen;
                    self.tool_calls_seen += 1;
                    let role = self.take_role();
                    vec![self.chunk(
                        ChunkDelta {
                            role,
                            tool_calls: Some(vec![ToolCallDelta {
                                index,
                                id: Some(call_id),
                                r#type: Some("function".to_string()),
                                function: Some(FunctionCallDelta {
                                    name: Some(name),
                                    arguments: None,
                                }),
                            }]),
                            ..ChunkDelta::default()
                        },
                        None,
                        None,
                    )]
                }
                _ => Vec::new(),
            },
            ResponseStreamEvent::FunctionCallArgumentsDelta { delta, .. } => {
                if self.tool_calls_seen == 0 {
                    return Vec::new();
                }
                let index = self.tool_calls_seen - 1;
                vec![self.chunk(
                    ChunkDelta {
                        tool_calls: Some(vec![ToolCallDelta {
                            index,
                            id: None,
                            r#type: None,
                            function: Some(FunctionCallDelta {
                                name: None,
                                arguments: Some(delta),
                            }),
                        }]),
                        ..ChunkDelta::default()
                    },
                    None,
                    None,
                )]
            }
            ResponseStreamEvent::Completed { response } => {
                self.absorb(&response);
                let finish = finish_reason_for(&response, self.tool_calls_seen > 0);
                let usage = response.usage.as_ref().map(map_usage);
                vec![self.chunk(ChunkDelta::default(), Some(finish), usage)]
            }
            ResponseStreamEvent::OutputTextDone { .. }
            | ResponseStreamEvent::ContentPartAdded { .. }
            | ResponseStreamEvent::ContentPartDone { .. }
            | ResponseStreamEvent::OutputItemDone { .. }
            | ResponseStreamEvent::FunctionCallArgumentsDone { .. } => Vec::new(),
        }
    }

    fn absorb(&mut self, response: &Response) {
        if !response.model.is_empty() {
            self.model = response.model.clone();
        }
        if !response.id.is_empty() {
            self.id = format!("chatcmpl-{}", response.id.trim_start_matches("resp_"));
        }
    }

    fn take_role(&mut self) -> Option<String> {
        if self.role_sent {
            None
        } else {
            self.role_sent = true;
            Some("assistant".to_string())
        }
    }

    fn chunk(
        &mut self,
        delta: ChunkDelta,
        finish_reason: Option<FinishReason>,
        usage: Option<llmrelay_protocol::openai::types::Usage>,
    ) -> ChatCompletionChunk {
        if delta.role.is_some() {
            self.role_sent = true;
        }
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
        }
    }
}

impl Default for ResponsesToOpenAiStream {
    fn default() -> Self {
        Self::new()
    }
}
