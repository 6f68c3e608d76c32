use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use llmrelay_common::{PoolSettings, ProviderType};
use llmrelay_pool::{
    EventHub, HealthEvent, HealthEventType, HealthProbe, PoolManager, ProbeOutcome,
    ProviderAccount, ScheduleKind, SelectOptions,
};
use tokio::time::timeout;

fn fast_settings() -> PoolSettings {
    PoolSettings {
        max_error_count: 3,
        quick_retry_interval: Duration::from_millis(50),
        quick_retry_max_count: 3,
        rate_limit_health_check_interval: Duration::from_secs(600),
        standard_health_check_interval: Duration::from_secs(600),
        save_debounce_time: Duration::from_millis(10),
        ..PoolSettings::default()
    }
}

fn manager(settings: PoolSettings) -> (PoolManager, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    let manager = PoolManager::new(settings, HashMap::new(), path, EventHub::new(32));
    (manager, dir)
}

struct FailingProbe {
    calls: AtomicU32,
    status: u16,
}

#[async_trait::async_trait]
impl HealthProbe for FailingProbe {
    async fn probe(&self, _account: &ProviderAccount, model: &str) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProbeOutcome::failure(model, "probe failed", Some(self.status))
    }
}

struct HealthyProbe;

#[async_trait::async_trait]
impl HealthProbe for HealthyProbe {
    async fn probe(&self, _account: &ProviderAccount, model: &str) -> ProbeOutcome {
        ProbeOutcome::success(model)
    }
}

#[tokio::test]
async fn lru_selection_prefers_never_used_then_oldest() {
    let (manager, _dir) = manager(fast_settings());

    let a = ProviderAccount::new(ProviderType::OpenAiCustom);
    let mut b = ProviderAccount::new(ProviderType::OpenAiCustom);
    b.last_used = Some(time::macros::datetime!(2024-01-01 00:00:00 UTC));
    b.usage_count = 5;
    let (a_uuid, b_uuid) = (a.uuid, b.uuid);
    manager.insert_account(a).await;
    manager.insert_account(b).await;

    let options = SelectOptions::default();
    let first = manager
        .select_provider(ProviderType::OpenAiCustom, &options)
        .await
        .unwrap();
    assert_eq!(first.uuid, a_uuid);
    assert_eq!(first.usage_count, 1);
    assert!(first.last_used.is_some());

    let second = manager
        .select_provider(ProviderType::OpenAiCustom, &options)
        .await
        .unwrap();
    assert_eq!(second.uuid, b_uuid);
}

#[tokio::test]
async fn excluded_and_disabled_accounts_are_skipped() {
    let (manager, _dir) = manager(fast_settings());
    let a = ProviderAccount::new(ProviderType::ClaudeCustom);
    let mut b = ProviderAccount::new(ProviderType::ClaudeCustom);
    b.is_disabled = true;
    let a_uuid = a.uuid;
    manager.insert_account(a).await;
    manager.insert_account(b).await;

    let options = SelectOptions {
        exclude: vec![a_uuid],
        ..SelectOptions::default()
    };
    assert!(
        manager
            .select_provider(ProviderType::ClaudeCustom, &options)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn unhealthy_transition_emits_event_and_updates_state() {
    let (manager, _dir) = manager(PoolSettings {
        auto_health_check_enabled: false,
        ..fast_settings()
    });
    let mut rx = manager.events().subscribe();

    let account = ProviderAccount::new(ProviderType::OpenAiCustom);
    let uuid = account.uuid;
    manager.insert_account(account).await;

    for _ in 0..3 {
        manager
            .mark_unhealthy(ProviderType::OpenAiCustom, uuid, "boom", Some(500))
            .await;
    }

    let event: HealthEvent = timeout(Duration::from_millis(200), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event_type, HealthEventType::Unhealthy);
    assert_eq!(event.error_code, Some(500));
    assert_eq!(event.provider_uuid, uuid);

    let account = manager
        .account(ProviderType::OpenAiCustom, uuid)
        .await
        .unwrap();
    assert!(!account.is_healthy);
    assert_eq!(account.error_count, 3);
    assert_eq!(account.last_error_message.as_deref(), Some("boom"));
    // A failed account moves to the back of the LRU order.
    assert!(account.last_used.is_some());
}

#[tokio::test]
async fn quick_retry_phase_exhausts_into_standard_schedule() {
    let (manager, _dir) = manager(fast_settings());
    let probe = Arc::new(FailingProbe {
        calls: AtomicU32::new(0),
        status: 500,
    });
    manager.set_probe(probe.clone()).await;

    let account = ProviderAccount::new(ProviderType::OpenAiCustom);
    let uuid = account.uuid;
    manager.insert_account(account).await;

    for _ in 0..3 {
        manager
            .mark_unhealthy(ProviderType::OpenAiCustom, uuid, "http 500", Some(500))
            .await;
    }
    let account = manager
        .account(ProviderType::OpenAiCustom, uuid)
        .await
        .unwrap();
    assert_eq!(
        account.health_check_schedule_type,
        Some(ScheduleKind::QuickRetry)
    );

    // Three quick retries at 50 ms, all failing, then the slow cadence.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let account = manager
        .account(ProviderType::OpenAiCustom, uuid)
        .await
        .unwrap();
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    assert_eq!(account.quick_retry_count, 3);
    assert_eq!(
        account.health_check_schedule_type,
        Some(ScheduleKind::Standard)
    );
    assert!(!account.is_healthy);

    manager.shutdown().await;
}

#[tokio::test]
async fn rate_limit_failures_skip_quick_retries() {
    let (manager, _dir) = manager(fast_settings());
    let probe = Arc::new(FailingProbe {
        calls: AtomicU32::new(0),
        status: 429,
    });
    manager.set_probe(probe.clone()).await;

    let account = ProviderAccount::new(ProviderType::ClaudeCustom);
    let uuid = account.uuid;
    manager.insert_account(account).await;

    for _ in 0..3 {
        manager
            .mark_unhealthy(ProviderType::ClaudeCustom, uuid, "rate limited", Some(429))
            .await;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    let account = manager
        .account(ProviderType::ClaudeCustom, uuid)
        .await
        .unwrap();
    assert_eq!(
        account.health_check_schedule_type,
        Some(ScheduleKind::RateLimit)
    );
    assert_eq!(account.quick_retry_count, 0);
    // The 10-minute timer has not fired, so no probe ran.
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn successful_recovery_marks_healthy_and_resets_usage() {
    let (manager, _dir) = manager(fast_settings());
    manager.set_probe(Arc::new(HealthyProbe)).await;

    let mut account = ProviderAccount::new(ProviderType::OpenAiCustom);
    account.usage_count = 7;
    let uuid = account.uuid;
    manager.insert_account(account).await;

    for _ in 0..3 {
        manager
            .mark_unhealthy(ProviderType::OpenAiCustom, uuid, "http 503", Some(503))
            .await;
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    let account = manager
        .account(ProviderType::OpenAiCustom, uuid)
        .await
        .unwrap();
    assert!(account.is_healthy);
    assert_eq!(account.error_count, 0);
    assert_eq!(account.usage_count, 0);
    assert_eq!(account.health_check_schedule_type, None);
    assert!(account.last_health_check_time.is_some());

    manager.shutdown().await;
}

#[tokio::test]
async fn fallback_respects_protocol_prefix_and_model_support() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    let chain = HashMap::from([(
        ProviderType::ClaudeCustom,
        vec![
            ProviderType::ClaudeCodeCustom,
            ProviderType::OpenAiCustom,
        ],
    )]);
    let manager = PoolManager::new(
        PoolSettings {
            auto_health_check_enabled: false,
            ..fast_settings()
        },
        chain,
        path,
        EventHub::new(8),
    );

    let mut primary = ProviderAccount::new(ProviderType::ClaudeCustom);
    primary.is_healthy = false;
    manager.insert_account(primary).await;
    let fallback = ProviderAccount::new(ProviderType::ClaudeCodeCustom);
    let fallback_uuid = fallback.uuid;
    manager.insert_account(fallback).await;
    // Healthy, but the wrong protocol; must never serve a claude request.
    manager
        .insert_account(ProviderAccount::new(ProviderType::OpenAiCustom))
        .await;

    let options = SelectOptions {
        requested_model: Some("claude-3-5-sonnet".to_string()),
        ..SelectOptions::default()
    };
    let selection = manager
        .select_with_fallback(ProviderType::ClaudeCustom, &options)
        .await
        .unwrap();
    assert!(selection.is_fallback);
    assert_eq!(selection.actual_type, ProviderType::ClaudeCodeCustom);
    assert_eq!(selection.account.uuid, fallback_uuid);

    // With the chain entry gone unhealthy too, nothing is selectable.
    manager
        .mark_unhealthy(ProviderType::ClaudeCodeCustom, fallback_uuid, "down", Some(500))
        .await;
    manager
        .mark_unhealthy(ProviderType::ClaudeCodeCustom, fallback_uuid, "down", Some(500))
        .await;
    manager
        .mark_unhealthy(ProviderType::ClaudeCodeCustom, fallback_uuid, "down", Some(500))
        .await;
    assert!(
        manager
            .select_with_fallback(ProviderType::ClaudeCustom, &options)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn debounced_writer_persists_after_quiet_period() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    let manager = PoolManager::new(
        PoolSettings {
            save_debounce_time: Duration::from_millis(20),
            auto_health_check_enabled: false,
            ..fast_settings()
        },
        HashMap::new(),
        path.clone(),
        EventHub::new(8),
    );

    let account = ProviderAccount::new(ProviderType::GeminiCliOauth);
    let uuid = account.uuid;
    manager.insert_account(account).await;

    tokio::time::sleep(Duration::from_millis(120)).await;
    let pools = llmrelay_pool::load_pools(&path).await.unwrap();
    assert_eq!(pools[&ProviderType::GeminiCliOauth][0].uuid, uuid);
    assert!(pools[&ProviderType::GeminiCliOauth][0].last_used.is_none());

    manager
        .select_provider(ProviderType::GeminiCliOauth, &SelectOptions::default())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    let pools = llmrelay_pool::load_pools(&path).await.unwrap();
    let persisted = &pools[&ProviderType::GeminiCliOauth][0];
    assert!(persisted.last_used.is_some());
    assert_eq!(persisted.usage_count, 1);
}

#[tokio::test]
async fn reload_round_trips_through_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider_pools.json");
    let settings = PoolSettings {
        save_debounce_time: Duration::from_millis(10),
        auto_health_check_enabled: false,
        ..fast_settings()
    };

    let first = PoolManager::new(settings.clone(), HashMap::new(), path.clone(), EventHub::new(8));
    let mut account = ProviderAccount::new(ProviderType::ClaudeCustom);
    account.not_supported_models.insert("claude-opus-4-20250514".to_string());
    let uuid = account.uuid;
    first.insert_account(account).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    first.shutdown().await;

    let second = PoolManager::new(settings, HashMap::new(), path, EventHub::new(8));
    second.load().await.unwrap();
    let restored = second.account(ProviderType::ClaudeCustom, uuid).await.unwrap();
    assert!(restored.not_supported_models.contains("claude-opus-4-20250514"));
}
