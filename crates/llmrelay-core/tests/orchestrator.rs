use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use llmrelay_common::{
    AccountUuid, GatewayConfig, GatewayError, PoolSettings, Protocol, ProviderType, RelayResult,
};
use llmrelay_core::Orchestrator;
use llmrelay_pool::{
    CredentialMaterial, EventHub, PoolManager, ProviderAccount,
};
use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::stream::{ContentBlockDelta, MessageDelta, StreamEvent};
use llmrelay_protocol::claude::types::{ContentBlock, StopReason, Usage as ClaudeUsage};
use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{ChatMessage, FinishReason, MessageContent};
use llmrelay_provider::{AdapterSource, ChunkStream, ProviderAdapter};
use llmrelay_transform::{ChatRequest, ChatResponse, ModelList, StreamPayload};

/// Claude-native stub: answers every generate with a fixed message and
/// streams a small framed event sequence.
struct ClaudeStub {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl ProviderAdapter for ClaudeStub {
    fn provider_type(&self) -> ProviderType {
        ProviderType::ClaudeCustom
    }

    async fn generate(&self, model: &str, request: ChatRequest) -> RelayResult<ChatResponse> {
        let ChatRequest::Claude(_) = request else {
            return Err(GatewayError::InvalidConfig("not claude".to_string()));
        };
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut response = MessageResponse::new("msg_stub", model);
        response.content = vec![ContentBlock::Text {
            text: "pong".to_string(),
        }];
        response.stop_reason = Some(StopReason::EndTurn);
        response.usage = ClaudeUsage {
            input_tokens: Some(1),
            output_tokens: Some(1),
            ..ClaudeUsage::default()
        };
        Ok(ChatResponse::Claude(response))
    }

    async fn stream(&self, model: &str, _request: ChatRequest) -> RelayResult<ChunkStream> {
        let events = vec![
            StreamEvent::MessageStart {
                message: MessageResponse::new("msg_stub", model),
            },
            StreamEvent::ContentBlockStart {
                index: 0,
                content_block: ContentBlock::Text {
                    text: String::new(),
                },
            },
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: ContentBlockDelta::TextDelta {
                    text: "pong".to_string(),
                },
            },
            StreamEvent::ContentBlockStop { index: 0 },
            StreamEvent::MessageDelta {
                delta: MessageDelta {
                    stop_reason: Some(StopReason::EndTurn),
                    stop_sequence: None,
                },
                usage: None,
            },
            StreamEvent::MessageStop,
        ];
        Ok(Box::pin(futures_util::stream::iter(
            events.into_iter().map(|event| Ok(StreamPayload::Claude(event))),
        )))
    }

    async fn list_models(&self) -> RelayResult<ModelList> {
        Ok(ModelList::Claude(
            llmrelay_protocol::claude::models::ModelList {
                data: vec![llmrelay_protocol::claude::models::ModelInfo::new(
                    "claude-3-5-sonnet",
                )],
                has_more: false,
                first_id: None,
                last_id: None,
            },
        ))
    }

    async fn refresh(&self) -> RelayResult<()> {
        Ok(())
    }
}

/// Always fails with an upstream 500.
struct BrokenStub;

#[async_trait::async_trait]
impl ProviderAdapter for BrokenStub {
    fn provider_type(&self) -> ProviderType {
        ProviderType::ClaudeCustom
    }

    async fn generate(&self, _model: &str, _request: ChatRequest) -> RelayResult<ChatResponse> {
        Err(GatewayError::upstream(500, "stub exploded"))
    }

    async fn stream(&self, _model: &str, _request: ChatRequest) -> RelayResult<ChunkStream> {
        Err(GatewayError::upstream(500, "stub exploded"))
    }

    async fn list_models(&self) -> RelayResult<ModelList> {
        Err(GatewayError::upstream(500, "stub exploded"))
    }

    async fn refresh(&self) -> RelayResult<()> {
        Ok(())
    }
}

/// Routes specific account uuids to the broken stub, everyone else to the
/// healthy one.
struct StubSource {
    healthy: Arc<ClaudeStub>,
    broken_uuids: Vec<AccountUuid>,
}

#[async_trait::async_trait]
impl AdapterSource for StubSource {
    async fn adapter(
        &self,
        account: &ProviderAccount,
    ) -> RelayResult<Arc<dyn ProviderAdapter>> {
        if self.broken_uuids.contains(&account.uuid) {
            Ok(Arc::new(BrokenStub))
        } else {
            Ok(self.healthy.clone())
        }
    }
}

fn claude_account() -> ProviderAccount {
    let mut account = ProviderAccount::new(ProviderType::ClaudeCustom);
    account.credential = CredentialMaterial::ApiKey {
        api_key: "sk-test".to_string(),
    };
    account
}

fn pool(dir: &tempfile::TempDir) -> PoolManager {
    PoolManager::new(
        PoolSettings {
            auto_health_check_enabled: false,
            save_debounce_time: Duration::from_millis(10),
            ..PoolSettings::default()
        },
        HashMap::new(),
        dir.path().join("provider_pools.json"),
        EventHub::new(16),
    )
}

fn openai_request(model: &str) -> ChatRequest {
    let mut request = ChatCompletionRequest::new(model);
    request.messages = vec![ChatMessage::User {
        content: MessageContent::Text("ping".to_string()),
    }];
    ChatRequest::OpenAi(request)
}

#[tokio::test]
async fn generate_converts_between_client_and_upstream_dialects() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir);
    pool.insert_account(claude_account()).await;

    let source = Arc::new(StubSource {
        healthy: Arc::new(ClaudeStub {
            calls: AtomicU32::new(0),
        }),
        broken_uuids: Vec::new(),
    });
    let orchestrator = Orchestrator::new(pool, source, &GatewayConfig::default());

    let response = orchestrator
        .generate(ProviderType::ClaudeCustom, openai_request("claude-3-5-sonnet"))
        .await
        .unwrap();
    let ChatResponse::OpenAi(completion) = response else {
        panic!("expected client-dialect response");
    };
    assert_eq!(
        completion.choices[0].message.content.as_deref(),
        Some("pong")
    );
    assert_eq!(completion.choices[0].finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn failed_account_is_excluded_and_marked() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir);

    let mut broken = claude_account();
    // Oldest lastUsed, so selection picks it first.
    broken.last_used = Some(time::macros::datetime!(2020-01-01 00:00:00 UTC));
    let broken_uuid = broken.uuid;
    let healthy = claude_account();
    let healthy_uuid = healthy.uuid;
    pool.insert_account(broken).await;
    pool.insert_account(healthy).await;

    let stub = Arc::new(ClaudeStub {
        calls: AtomicU32::new(0),
    });
    let source = Arc::new(StubSource {
        healthy: stub.clone(),
        broken_uuids: vec![broken_uuid],
    });
    let orchestrator = Orchestrator::new(pool.clone(), source, &GatewayConfig::default());

    let response = orchestrator
        .generate(ProviderType::ClaudeCustom, openai_request("claude-3-5-sonnet"))
        .await
        .unwrap();
    assert!(matches!(response, ChatResponse::OpenAi(_)));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

    let failed = pool
        .account(ProviderType::ClaudeCustom, broken_uuid)
        .await
        .unwrap();
    assert_eq!(failed.error_count, 1);
    assert_eq!(failed.last_error_status_code, Some(500));
    let succeeded = pool
        .account(ProviderType::ClaudeCustom, healthy_uuid)
        .await
        .unwrap();
    assert_eq!(succeeded.error_count, 0);
    assert_eq!(succeeded.usage_count, 1);
}

#[tokio::test]
async fn exhausted_pool_surfaces_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir);
    let mut account = claude_account();
    account.is_healthy = false;
    pool.insert_account(account).await;

    let source = Arc::new(StubSource {
        healthy: Arc::new(ClaudeStub {
            calls: AtomicU32::new(0),
        }),
        broken_uuids: Vec::new(),
    });
    let orchestrator = Orchestrator::new(pool, source, &GatewayConfig::default());

    let err = orchestrator
        .generate(ProviderType::ClaudeCustom, openai_request("claude-3-5-sonnet"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::PoolExhausted(_)));
}

#[tokio::test]
async fn stream_is_converted_into_the_client_dialect() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir);
    pool.insert_account(claude_account()).await;

    let source = Arc::new(StubSource {
        healthy: Arc::new(ClaudeStub {
            calls: AtomicU32::new(0),
        }),
        broken_uuids: Vec::new(),
    });
    let orchestrator = Orchestrator::new(pool, source, &GatewayConfig::default());

    let mut request = openai_request("claude-3-5-sonnet");
    if let ChatRequest::OpenAi(inner) = &mut request {
        inner.stream = Some(true);
    }
    let stream = orchestrator
        .stream(ProviderType::ClaudeCustom, request)
        .await
        .unwrap();
    let payloads: Vec<StreamPayload> = stream
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(|item| item.unwrap())
        .collect();

    let text: String = payloads
        .iter()
        .filter_map(|payload| match payload {
            StreamPayload::OpenAi(chunk) => chunk.choices[0].delta.content.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(text, "pong");

    let finishes: Vec<FinishReason> = payloads
        .iter()
        .filter_map(|payload| match payload {
            StreamPayload::OpenAi(chunk) => chunk.choices[0].finish_reason,
            _ => None,
        })
        .collect();
    assert_eq!(finishes, vec![FinishReason::Stop]);
}

#[tokio::test]
async fn identity_protocols_bypass_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir);
    pool.insert_account(claude_account()).await;

    let source = Arc::new(StubSource {
        healthy: Arc::new(ClaudeStub {
            calls: AtomicU32::new(0),
        }),
        broken_uuids: Vec::new(),
    });
    let orchestrator = Orchestrator::new(pool, source, &GatewayConfig::default());

    let mut request = llmrelay_protocol::claude::request::MessagesRequest::new(
        "claude-3-5-sonnet",
        1024,
    );
    request.messages = vec![llmrelay_protocol::claude::types::MessageParam {
        role: llmrelay_protocol::claude::types::Role::User,
        content: llmrelay_protocol::claude::types::MessageContent::Text("ping".to_string()),
    }];
    let response = orchestrator
        .generate(ProviderType::ClaudeCustom, ChatRequest::Claude(request))
        .await
        .unwrap();
    assert!(matches!(response, ChatResponse::Claude(_)));
}

#[tokio::test]
async fn model_listing_converts_to_the_client_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir);
    pool.insert_account(claude_account()).await;

    let source = Arc::new(StubSource {
        healthy: Arc::new(ClaudeStub {
            calls: AtomicU32::new(0),
        }),
        broken_uuids: Vec::new(),
    });
    let orchestrator = Orchestrator::new(pool.clone(), source, &GatewayConfig::default());

    let list = orchestrator
        .list_models(ProviderType::ClaudeCustom, Protocol::OpenAi)
        .await
        .unwrap();
    let ModelList::OpenAi(list) = list else {
        panic!("expected openai-shape list");
    };
    assert_eq!(list.data[0].id, "claude-3-5-sonnet");

    // Listing does not consume the LRU budget.
    let account = pool.snapshot().await[&ProviderType::ClaudeCustom][0].clone();
    assert_eq!(account.usage_count, 0);
}
