use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{info, warn};

use llmrelay_common::{GatewayConfig, GatewayError, ProviderType, RelayResult};
use llmrelay_pool::{PoolManager, SelectOptions, Selection};
use llmrelay_provider::{AdapterSource, ChunkStream};
use llmrelay_transform::{
    ChatRequest, ChatResponse, ModelList, TransformOptions, convert_model_list, convert_request,
    convert_response, stream_converter,
};

use crate::probe::AdapterHealthProbe;

/// Thin glue between pool, converter matrix, and adapters: pick an account
/// (fallback-aware), translate, dispatch, translate back, and on provider
/// failure mark the account unhealthy and re-select with it excluded.
pub struct Orchestrator {
    pool: PoolManager,
    adapters: Arc<dyn AdapterSource>,
    options: TransformOptions,
    max_attempts: u32,
}

impl Orchestrator {
    pub fn new(pool: PoolManager, adapters: Arc<dyn AdapterSource>, config: &GatewayConfig) -> Self {
        Self {
            pool,
            adapters,
            options: TransformOptions {
                reasoning_max_tokens: config.openai_reasoning_max_tokens,
            },
            max_attempts: config.request_max_retries.max(1),
        }
    }

    /// Wire the recovery scheduler's probe through the adapter factory.
    pub async fn install_health_probe(&self) {
        self.pool
            .set_probe(Arc::new(AdapterHealthProbe::new(self.adapters.clone())))
            .await;
    }

    pub fn pool(&self) -> &PoolManager {
        &self.pool
    }

    pub async fn generate(
        &self,
        target: ProviderType,
        request: ChatRequest,
    ) -> RelayResult<ChatResponse> {
        let client_protocol = request.protocol();
        let model = request.model().to_string();
        let mut exclude = Vec::new();
        let mut last_error = None;

        for _ in 0..self.max_attempts {
            let Some(selection) = self.select(target, &model, &exclude).await else {
                break;
            };
            let upstream_protocol = selection.actual_type.protocol();
            let native = if upstream_protocol == client_protocol {
                request.clone()
            } else {
                convert_request(upstream_protocol, request.clone(), &self.options)?
            };

            let adapter = match self.adapters.adapter(&selection.account).await {
                Ok(adapter) => adapter,
                Err(err) => {
                    self.note_failure(&selection, &err).await;
                    exclude.push(selection.account.uuid);
                    last_error = Some(err);
                    continue;
                }
            };

            match adapter.generate(&model, native).await {
                Ok(response) => {
                    return if upstream_protocol == client_protocol {
                        Ok(response)
                    } else {
                        convert_response(client_protocol, response, &model)
                    };
                }
                Err(err @ GatewayError::UnsupportedConversion { .. }) => {
                    // Deterministic client error; retrying cannot help.
                    return Err(err);
                }
                Err(err) => {
                    self.note_failure(&selection, &err).await;
                    exclude.push(selection.account.uuid);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::PoolExhausted(target.to_string())))
    }

    pub async fn stream(
        &self,
        target: ProviderType,
        request: ChatRequest,
    ) -> RelayResult<ChunkStream> {
        let client_protocol = request.protocol();
        let model = request.model().to_string();
        let mut exclude = Vec::new();
        let mut last_error = None;

        for _ in 0..self.max_attempts {
            let Some(selection) = self.select(target, &model, &exclude).await else {
                break;
            };
            let upstream_protocol = selection.actual_type.protocol();
            let native = if upstream_protocol == client_protocol {
                request.clone()
            } else {
                convert_request(upstream_protocol, request.clone(), &self.options)?
            };

            let adapter = match self.adapters.adapter(&selection.account).await {
                Ok(adapter) => adapter,
                Err(err) => {
                    self.note_failure(&selection, &err).await;
                    exclude.push(selection.account.uuid);
                    last_error = Some(err);
                    continue;
                }
            };

            match adapter.stream(&model, native).await {
                Ok(upstream) => {
                    return Ok(self.wrap_stream(
                        upstream,
                        selection,
                        upstream_protocol == client_protocol,
                        upstream_protocol,
                        client_protocol,
                    )?);
                }
                Err(err @ GatewayError::UnsupportedConversion { .. }) => return Err(err),
                Err(err) => {
                    self.note_failure(&selection, &err).await;
                    exclude.push(selection.account.uuid);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::PoolExhausted(target.to_string())))
    }

    pub async fn list_models(
        &self,
        target: ProviderType,
        client_protocol: llmrelay_common::Protocol,
    ) -> RelayResult<ModelList> {
        let options = SelectOptions {
            skip_usage_count: true,
            ..SelectOptions::default()
        };
        let selection = self
            .pool
            .select_with_fallback(target, &options)
            .await
            .ok_or_else(|| GatewayError::PoolExhausted(target.to_string()))?;
        let adapter = self.adapters.adapter(&selection.account).await?;
        let list = adapter.list_models().await?;
        convert_model_list(client_protocol, list)
    }

    async fn select(
        &self,
        target: ProviderType,
        model: &str,
        exclude: &[llmrelay_common::AccountUuid],
    ) -> Option<Selection> {
        let options = SelectOptions {
            requested_model: Some(model.to_string()),
            exclude: exclude.to_vec(),
            skip_usage_count: false,
        };
        self.pool.select_with_fallback(target, &options).await
    }

    async fn note_failure(&self, selection: &Selection, err: &GatewayError) {
        info!(
            event = "provider_failure",
            provider_type = %selection.actual_type,
            account = %selection.account.uuid,
            error = %err,
        );
        self.pool
            .mark_unhealthy(
                selection.actual_type,
                selection.account.uuid,
                &err.to_string(),
                err.status_code(),
            )
            .await;
    }

    /// Pipe upstream frames through the per-call stream converter. A
    /// mid-stream failure is reported to the pool once and ends the stream;
    /// dropping the returned stream drops the upstream connection without
    /// touching health.
    fn wrap_stream(
        &self,
        mut upstream: ChunkStream,
        selection: Selection,
        identity: bool,
        from: llmrelay_common::Protocol,
        to: llmrelay_common::Protocol,
    ) -> RelayResult<ChunkStream> {
        let mut converter = if identity {
            None
        } else {
            Some(stream_converter(from, to)?)
        };
        let pool = self.pool.clone();

        let stream = async_stream::stream! {
            let mut failed = false;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(payload) => match converter.as_mut() {
                        None => yield Ok(payload),
                        Some(converter) => match converter.push(payload) {
                            Ok(outputs) => {
                                for output in outputs {
                                    yield Ok(output);
                                }
                            }
                            Err(err) => {
                                warn!(event = "stream_convert_failed", error = %err);
                                yield Err(err);
                                return;
                            }
                        },
                    },
                    Err(err) => {
                        if !failed {
                            failed = true;
                            pool.mark_unhealthy(
                                selection.actual_type,
                                selection.account.uuid,
                                &err.to_string(),
                                err.status_code(),
                            )
                            .await;
                        }
                        yield Err(err);
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
