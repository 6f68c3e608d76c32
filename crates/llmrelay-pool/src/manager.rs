use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use llmrelay_common::{AccountUuid, PoolSettings, ProviderType, provider_supports_model};

use crate::account::{ProviderAccount, ScheduleKind};
use crate::events::{EventHub, HealthEvent, HealthEventType};
use crate::health::{HealthProbe, ProbeOutcome, default_health_check_model};
use crate::persist::{PendingSaves, load_pools, overlay_write};

#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub requested_model: Option<String>,
    pub exclude: Vec<AccountUuid>,
    /// Leave `lastUsed`/`usageCount` untouched on the picked account.
    pub skip_usage_count: bool,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub account: ProviderAccount,
    pub actual_type: ProviderType,
    pub is_fallback: bool,
}

/// Per-type account pools with health tracking, LRU selection, fallback
/// chains, a dual-policy recovery scheduler, and debounced persistence.
///
/// All pool state sits behind one mutex; selection and health transitions
/// are atomic under it.
#[derive(Clone)]
pub struct PoolManager {
    shared: Arc<Shared>,
}

struct Shared {
    settings: PoolSettings,
    fallback_chain: HashMap<ProviderType, Vec<ProviderType>>,
    path: PathBuf,
    pools: Mutex<HashMap<ProviderType, Vec<ProviderAccount>>>,
    pending: Arc<PendingSaves>,
    events: EventHub,
    timers: Mutex<HashMap<AccountUuid, JoinHandle<()>>>,
    probe: RwLock<Option<Arc<dyn HealthProbe>>>,
    writer: std::sync::Mutex<Option<JoinHandle<()>>>,
    closed: std::sync::atomic::AtomicBool,
}

impl PoolManager {
    /// Must be called from within a tokio runtime; the debounced writer task
    /// starts immediately.
    pub fn new(
        settings: PoolSettings,
        fallback_chain: HashMap<ProviderType, Vec<ProviderType>>,
        path: PathBuf,
        events: EventHub,
    ) -> Self {
        let shared = Arc::new(Shared {
            settings,
            fallback_chain,
            path,
            pools: Mutex::new(HashMap::new()),
            pending: Arc::new(PendingSaves::new()),
            events,
            timers: Mutex::new(HashMap::new()),
            probe: RwLock::new(None),
            writer: std::sync::Mutex::new(None),
            closed: std::sync::atomic::AtomicBool::new(false),
        });
        let manager = Self { shared };
        manager.spawn_writer();
        manager.spawn_health_sweeper();
        manager
    }

    pub fn events(&self) -> &EventHub {
        &self.shared.events
    }

    /// Install the probe used by timer-driven recovery checks.
    pub async fn set_probe(&self, probe: Arc<dyn HealthProbe>) {
        *self.shared.probe.write().await = Some(probe);
    }

    /// Replace in-memory pools with the persisted file contents.
    pub async fn load(&self) -> llmrelay_common::RelayResult<()> {
        let pools = load_pools(&self.shared.path).await?;
        *self.shared.pools.lock().await = pools;
        Ok(())
    }

    pub async fn insert_account(&self, account: ProviderAccount) {
        let provider_type = account.provider_type;
        self.shared
            .pools
            .lock()
            .await
            .entry(provider_type)
            .or_default()
            .push(account);
        self.shared.pending.mark(provider_type).await;
    }

    pub async fn account(
        &self,
        provider_type: ProviderType,
        uuid: AccountUuid,
    ) -> Option<ProviderAccount> {
        self.shared
            .pools
            .lock()
            .await
            .get(&provider_type)?
            .iter()
            .find(|account| account.uuid == uuid)
            .cloned()
    }

    pub async fn snapshot(&self) -> HashMap<ProviderType, Vec<ProviderAccount>> {
        self.shared.pools.lock().await.clone()
    }

    /// LRU selection within one provider type. Ties on `lastUsed` break
    /// toward the lower `usageCount`; the picked account is stamped unless
    /// `skip_usage_count` is set.
    pub async fn select_provider(
        &self,
        provider_type: ProviderType,
        options: &SelectOptions,
    ) -> Option<ProviderAccount> {
        let picked = {
            let mut pools = self.shared.pools.lock().await;
            let accounts = pools.get_mut(&provider_type)?;
            let model = options.requested_model.as_deref();
            let candidate = accounts
                .iter_mut()
                .filter(|account| account.is_candidate(model))
                .filter(|account| !options.exclude.contains(&account.uuid))
                .min_by_key(|account| (account.last_used, account.usage_count))?;
            if !options.skip_usage_count {
                candidate.last_used = Some(OffsetDateTime::now_utc());
                candidate.usage_count += 1;
            }
            candidate.clone()
        };
        if !options.skip_usage_count {
            self.shared.pending.mark(provider_type).await;
        }
        Some(picked)
    }

    /// Selection across the primary type and its fallback chain. Only chain
    /// entries speaking the primary's protocol (and claiming the requested
    /// model) are tried; the trial list is built once and deduplicated.
    pub async fn select_with_fallback(
        &self,
        primary: ProviderType,
        options: &SelectOptions,
    ) -> Option<Selection> {
        let mut trial = vec![primary];
        for fallback in self
            .shared
            .fallback_chain
            .get(&primary)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            if trial.contains(fallback) {
                continue;
            }
            if fallback.protocol() != primary.protocol() {
                continue;
            }
            if let Some(model) = options.requested_model.as_deref()
                && !provider_supports_model(*fallback, model)
            {
                continue;
            }
            trial.push(*fallback);
        }

        for provider_type in trial {
            if let Some(account) = self.select_provider(provider_type, options).await {
                let is_fallback = provider_type != primary;
                if is_fallback {
                    info!(
                        event = "fallback_activated",
                        primary = %primary,
                        actual = %provider_type,
                        account = %account.uuid,
                    );
                }
                return Some(Selection {
                    account,
                    actual_type: provider_type,
                    is_fallback,
                });
            }
        }
        None
    }

    /// Record one upstream failure. Stamping `lastUsed` keeps LRU from
    /// re-picking an account that just failed.
    pub async fn mark_unhealthy(
        &self,
        provider_type: ProviderType,
        uuid: AccountUuid,
        error_message: &str,
        status_code: Option<u16>,
    ) {
        let transitioned = {
            let mut pools = self.shared.pools.lock().await;
            let Some(account) = find_account(&mut pools, provider_type, uuid) else {
                return;
            };
            let now = OffsetDateTime::now_utc();
            account.error_count += 1;
            account.last_error_time = Some(now);
            account.last_used = Some(now);
            account.last_error_message = Some(error_message.to_string());
            account.last_error_status_code = status_code;
            if account.error_count >= self.shared.settings.max_error_count && account.is_healthy {
                account.is_healthy = false;
                true
            } else {
                false
            }
        };
        self.shared.pending.mark(provider_type).await;

        if transitioned {
            warn!(
                event = "account_unhealthy",
                provider_type = %provider_type,
                account = %uuid,
                status = status_code,
                error = %error_message,
            );
            self.shared
                .events
                .emit(HealthEvent {
                    provider_uuid: uuid,
                    provider_type,
                    event_type: HealthEventType::Unhealthy,
                    error_code: status_code,
                    error_message: Some(error_message.to_string()),
                })
                .await;
            self.schedule_recovery(provider_type, uuid, status_code).await;
        }
    }

    /// Confirmed-healthy transition: clears error and recovery state and
    /// cancels any pending timer. Timer-driven (forced) checks also reset
    /// the usage counter.
    pub async fn mark_healthy(
        &self,
        provider_type: ProviderType,
        uuid: AccountUuid,
        reset_usage_count: bool,
    ) {
        let transitioned = {
            let mut pools = self.shared.pools.lock().await;
            let Some(account) = find_account(&mut pools, provider_type, uuid) else {
                return;
            };
            let was_healthy = account.is_healthy;
            account.is_healthy = true;
            account.reset_error_state();
            account.last_health_check_time = Some(OffsetDateTime::now_utc());
            if reset_usage_count {
                account.usage_count = 0;
            }
            !was_healthy
        };
        self.cancel_timer(uuid).await;
        self.shared.pending.mark(provider_type).await;

        if transitioned {
            info!(
                event = "account_recovered",
                provider_type = %provider_type,
                account = %uuid,
            );
            self.shared
                .events
                .emit(HealthEvent {
                    provider_uuid: uuid,
                    provider_type,
                    event_type: HealthEventType::Healthy,
                    error_code: None,
                    error_message: None,
                })
                .await;
        }
    }

    /// Run one health check. Returns `None` when the account opted out of
    /// health checking and the check was not forced; error counters are
    /// reset in that case but health is left alone.
    pub async fn run_health_check(
        &self,
        provider_type: ProviderType,
        uuid: AccountUuid,
        force: bool,
    ) -> Option<ProbeOutcome> {
        let account = self.account(provider_type, uuid).await?;
        let model = account
            .check_model_name
            .clone()
            .unwrap_or_else(|| default_health_check_model(provider_type).to_string());

        if !account.check_health && !force {
            let mut pools = self.shared.pools.lock().await;
            if let Some(account) = find_account(&mut pools, provider_type, uuid) {
                let healthy = account.is_healthy;
                account.reset_error_state();
                account.is_healthy = healthy;
            }
            drop(pools);
            self.cancel_timer(uuid).await;
            self.shared.pending.mark(provider_type).await;
            return None;
        }

        let probe = self.shared.probe.read().await.clone()?;
        let outcome = probe.probe(&account, &model).await;

        {
            let mut pools = self.shared.pools.lock().await;
            if let Some(account) = find_account(&mut pools, provider_type, uuid) {
                account.last_health_check_time = Some(OffsetDateTime::now_utc());
                account.last_health_check_model = Some(outcome.model_name.clone());
            }
        }
        self.shared.pending.mark(provider_type).await;
        Some(outcome)
    }

    /// Cancel every timer and flush pending state. Call before process exit.
    pub async fn shutdown(&self) {
        self.shared
            .closed
            .store(true, std::sync::atomic::Ordering::SeqCst);
        for (_, handle) in self.shared.timers.lock().await.drain() {
            handle.abort();
        }
        if let Ok(mut writer) = self.shared.writer.lock()
            && let Some(writer) = writer.take()
        {
            writer.abort();
        }
        let snapshot = self.snapshot().await;
        if let Err(err) = overlay_write(&self.shared.path, snapshot).await {
            warn!(event = "pool_save_failed", error = %err);
        }
    }

    async fn schedule_recovery(
        &self,
        provider_type: ProviderType,
        uuid: AccountUuid,
        status_code: Option<u16>,
    ) {
        if !self.shared.settings.auto_health_check_enabled {
            return;
        }
        let delay = {
            let mut pools = self.shared.pools.lock().await;
            let Some(account) = find_account(&mut pools, provider_type, uuid) else {
                return;
            };
            if status_code == Some(429) {
                account.health_check_schedule_type = Some(ScheduleKind::RateLimit);
                account.quick_retry_count = 0;
                account.quick_retry_phase_start_time = None;
                self.shared.settings.rate_limit_health_check_interval
            } else {
                if account.health_check_schedule_type != Some(ScheduleKind::QuickRetry) {
                    account.health_check_schedule_type = Some(ScheduleKind::QuickRetry);
                    account.quick_retry_count = 0;
                    account.quick_retry_phase_start_time = Some(OffsetDateTime::now_utc());
                }
                self.shared.settings.quick_retry_interval
            }
        };
        self.shared.pending.mark(provider_type).await;
        self.arm_timer(provider_type, uuid, delay).await;
    }

    fn arm_timer<'a>(
        &'a self,
        provider_type: ProviderType,
        uuid: AccountUuid,
        delay: Duration,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if self.shared.closed.load(std::sync::atomic::Ordering::SeqCst) {
                return;
            }
            let weak = Arc::downgrade(&self.shared);
            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let manager = PoolManager { shared };
                manager.run_scheduled_check(provider_type, uuid).await;
            });
            let mut timers = self.shared.timers.lock().await;
            if let Some(previous) = timers.insert(uuid, task) {
                previous.abort();
            }
        })
    }

    async fn cancel_timer(&self, uuid: AccountUuid) {
        if let Some(handle) = self.shared.timers.lock().await.remove(&uuid) {
            handle.abort();
        }
    }

    async fn run_scheduled_check(&self, provider_type: ProviderType, uuid: AccountUuid) {
        let Some(outcome) = self.run_health_check(provider_type, uuid, true).await else {
            return;
        };
        if outcome.success {
            self.mark_healthy(provider_type, uuid, true).await;
            return;
        }

        let next_delay = {
            let mut pools = self.shared.pools.lock().await;
            let Some(account) = find_account(&mut pools, provider_type, uuid) else {
                return;
            };
            let now = OffsetDateTime::now_utc();
            account.last_error_time = Some(now);
            account.last_error_message = outcome.error_message.clone();
            account.last_error_status_code = outcome.status_code;
            match account.health_check_schedule_type {
                Some(ScheduleKind::QuickRetry) => {
                    account.quick_retry_count += 1;
                    account.last_quick_retry_time = Some(now);
                    if account.quick_retry_count < self.shared.settings.quick_retry_max_count {
                        self.shared.settings.quick_retry_interval
                    } else {
                        // Quota exhausted: drop to the slow cadence.
                        account.health_check_schedule_type = Some(ScheduleKind::Standard);
                        self.shared.settings.standard_health_check_interval
                    }
                }
                Some(ScheduleKind::RateLimit) => {
                    self.shared.settings.rate_limit_health_check_interval
                }
                _ => {
                    account.health_check_schedule_type = Some(ScheduleKind::Standard);
                    self.shared.settings.standard_health_check_interval
                }
            }
        };
        self.shared.pending.mark(provider_type).await;
        self.arm_timer(provider_type, uuid, next_delay).await;
    }

    /// Periodic sweep re-arming recovery for unhealthy accounts whose timer
    /// was lost (process restart restores pool state but not timers).
    fn spawn_health_sweeper(&self) {
        if !self.shared.settings.auto_health_check_enabled {
            return;
        }
        let weak = Arc::downgrade(&self.shared);
        let interval = self.shared.settings.health_check_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if shared.closed.load(std::sync::atomic::Ordering::SeqCst) {
                    return;
                }
                let manager = PoolManager { shared };
                let orphaned = {
                    let pools = manager.shared.pools.lock().await;
                    let timers = manager.shared.timers.lock().await;
                    pools
                        .iter()
                        .flat_map(|(provider_type, accounts)| {
                            accounts.iter().filter_map(|account| {
                                (!account.is_healthy
                                    && !account.is_disabled
                                    && !timers.contains_key(&account.uuid))
                                .then_some((*provider_type, account.uuid))
                            })
                        })
                        .collect::<Vec<_>>()
                };
                for (provider_type, uuid) in orphaned {
                    manager
                        .arm_timer(
                            provider_type,
                            uuid,
                            manager.shared.settings.standard_health_check_interval,
                        )
                        .await;
                }
            }
        });
    }

    fn spawn_writer(&self) {
        let weak = Arc::downgrade(&self.shared);
        let pending = self.shared.pending.clone();
        let debounce = self.shared.settings.save_debounce_time;
        let task = tokio::spawn(async move {
            loop {
                let dirty = pending.wait_and_take(debounce).await;
                // The strong ref lives only for the write itself.
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let updates = {
                    let pools = shared.pools.lock().await;
                    dirty
                        .into_iter()
                        .filter_map(|provider_type| {
                            pools
                                .get(&provider_type)
                                .map(|accounts| (provider_type, accounts.clone()))
                        })
                        .collect::<HashMap<_, _>>()
                };
                if updates.is_empty() {
                    continue;
                }
                if let Err(err) = overlay_write(&shared.path, updates).await {
                    warn!(event = "pool_save_failed", error = %err);
                }
            }
        });
        if let Ok(mut writer) = self.shared.writer.lock() {
            *writer = Some(task);
        }
    }
}

fn find_account(
    pools: &mut HashMap<ProviderType, Vec<ProviderAccount>>,
    provider_type: ProviderType,
    uuid: AccountUuid,
) -> Option<&mut ProviderAccount> {
    pools
        .get_mut(&provider_type)?
        .iter_mut()
        .find(|account| account.uuid == uuid)
}
