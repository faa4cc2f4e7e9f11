//! Integration tests for load/start/stop/unload transitions.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use helpers::{MockPlugin, StopBehavior, registry, registry_with_timeout, state_of};
use pluginhost_registry::{LifecycleOperation, PluginMetadata, PluginState, RegistryError};

#[tokio::test]
async fn test_load_happy_path() {
    let registry = registry();
    let plugin = MockPlugin::new("alpha").arc();

    registry.load_plugin(plugin.clone()).await.unwrap();

    let meta = registry.get_plugin_metadata("alpha").await.unwrap();
    assert_eq!(meta.state, PluginState::Initialized);
    assert_eq!(meta.error_count, 0);
    assert_eq!(meta.restart_count, 0);
    assert_eq!(meta.version, "1.0.0");
    assert!(meta.last_activity >= meta.loaded_at);
    assert_eq!(plugin.calls.initialize(), 1);
    assert_eq!(plugin.calls.start(), 0);
}

#[tokio::test]
async fn test_duplicate_load_rejected() {
    let registry = registry();
    let first = MockPlugin::new("alpha").arc();
    registry.load_plugin(first.clone()).await.unwrap();
    registry.start_plugin("alpha").await.unwrap();
    let before = registry.get_plugin_metadata("alpha").await.unwrap();

    let second = MockPlugin::new("alpha").arc();
    let err = registry.load_plugin(second.clone()).await.unwrap_err();

    assert!(matches!(err, RegistryError::AlreadyLoaded { .. }));
    assert!(err.is_admission_error());
    assert_eq!(second.calls.total(), 0);

    let after = registry.get_plugin_metadata("alpha").await.unwrap();
    assert_eq!(after.state, PluginState::Started);
    assert_eq!(after.loaded_at, before.loaded_at);
    assert_eq!(after.last_activity, before.last_activity);
    assert_eq!(registry.count().await, 1);
}

#[tokio::test]
async fn test_failed_initialize_keeps_errored_record() {
    let registry = registry();
    let plugin = MockPlugin::new("fragile").failing_initialize().arc();

    let err = registry.load_plugin(plugin.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::HookFailed {
            operation: LifecycleOperation::Initialize,
            ..
        }
    ));

    let meta = registry.get_plugin_metadata("fragile").await.unwrap();
    assert_eq!(meta.state, PluginState::Error);
    assert_eq!(meta.error_count, 1);
    assert_eq!(meta.last_error.as_deref(), Some("initialize failed"));

    let retry = registry.load_plugin(MockPlugin::new("fragile").arc()).await;
    assert!(matches!(retry, Err(RegistryError::AlreadyLoaded { .. })));
}

#[tokio::test]
async fn test_start_stop_start() {
    let registry = registry();
    let plugin = MockPlugin::new("alpha").arc();
    registry.load_plugin(plugin.clone()).await.unwrap();

    registry.start_plugin("alpha").await.unwrap();
    assert_eq!(state_of(&registry, "alpha").await, Some(PluginState::Started));

    registry.stop_plugin("alpha").await.unwrap();
    assert_eq!(state_of(&registry, "alpha").await, Some(PluginState::Stopped));

    registry.start_plugin("alpha").await.unwrap();
    assert_eq!(state_of(&registry, "alpha").await, Some(PluginState::Started));
    assert_eq!(plugin.calls.start(), 2);
    assert_eq!(plugin.calls.stop(), 1);
}

#[tokio::test]
async fn test_stop_when_not_started_is_noop() {
    let registry = registry();
    let plugin = MockPlugin::new("idle").arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    let before = registry.get_plugin_metadata("idle").await.unwrap();

    registry.stop_plugin("idle").await.unwrap();

    let after = registry.get_plugin_metadata("idle").await.unwrap();
    assert_eq!(plugin.calls.stop(), 0);
    assert_eq!(after.state, PluginState::Initialized);
    assert_eq!(after.last_activity, before.last_activity);
}

#[tokio::test]
async fn test_start_requires_startable_state() {
    let registry = registry();
    registry
        .load_plugin(MockPlugin::new("alpha").arc())
        .await
        .unwrap();
    registry.start_plugin("alpha").await.unwrap();

    let err = registry.start_plugin("alpha").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidState {
            state: PluginState::Started,
            operation: LifecycleOperation::Start,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_plugin_operations() {
    let registry = registry();

    for result in [
        registry.start_plugin("ghost").await,
        registry.stop_plugin("ghost").await,
        registry.reload_plugin("ghost").await,
        registry.unload_plugin("ghost").await,
    ] {
        assert!(matches!(result, Err(RegistryError::NotFound { .. })));
    }
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn test_start_failure_moves_to_error() {
    let registry = registry();
    let plugin = MockPlugin::new("alpha").arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    plugin.fail_start.store(true, Ordering::SeqCst);

    let err = registry.start_plugin("alpha").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::HookFailed {
            operation: LifecycleOperation::Start,
            ..
        }
    ));

    let meta = registry.get_plugin_metadata("alpha").await.unwrap();
    assert_eq!(meta.state, PluginState::Error);
    assert_eq!(meta.error_count, 1);
}

#[tokio::test]
async fn test_panicking_hook_is_a_failure() {
    let registry = registry();
    let plugin = MockPlugin::new("volatile").arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    plugin.panic_on_start.store(true, Ordering::SeqCst);

    let err = registry.start_plugin("volatile").await.unwrap_err();
    match err {
        RegistryError::HookFailed { message, .. } => assert!(message.contains("start exploded")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(state_of(&registry, "volatile").await, Some(PluginState::Error));
}

#[tokio::test]
async fn test_stop_failure_moves_to_error() {
    let registry = registry();
    let plugin = MockPlugin::new("alpha").with_stop(StopBehavior::Fail).arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    registry.start_plugin("alpha").await.unwrap();

    let err = registry.stop_plugin("alpha").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::HookFailed {
            operation: LifecycleOperation::Stop,
            ..
        }
    ));
    let meta = registry.get_plugin_metadata("alpha").await.unwrap();
    assert_eq!(meta.state, PluginState::Error);
    assert_eq!(meta.error_count, 1);
}

#[tokio::test]
async fn test_stop_timeout_moves_to_error() {
    let registry = registry_with_timeout(Duration::from_millis(50));
    let plugin = MockPlugin::new("stuck").with_stop(StopBehavior::Hang).arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    registry.start_plugin("stuck").await.unwrap();

    let started = Instant::now();
    let err = registry.stop_plugin("stuck").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        RegistryError::ShutdownTimeout { timeout_ms: 50, .. }
    ));
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(2), "stop took {elapsed:?}");

    let meta = registry.get_plugin_metadata("stuck").await.unwrap();
    assert_eq!(meta.state, PluginState::Error);
    assert_eq!(meta.error_count, 1);
    assert_eq!(registry.orphaned_stop_count(), 1);
}

#[tokio::test]
async fn test_timed_out_stop_is_cancelled_cooperatively() {
    let registry = registry_with_timeout(Duration::from_millis(50));
    let plugin = MockPlugin::new("polite")
        .with_stop(StopBehavior::HangUntilCancelled)
        .arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    registry.start_plugin("polite").await.unwrap();

    let err = registry.stop_plugin("polite").await.unwrap_err();
    assert!(matches!(err, RegistryError::ShutdownTimeout { .. }));

    let cancelled = plugin.stop_cancelled.clone();
    assert!(
        helpers::eventually(Duration::from_secs(2), || {
            cancelled.load(Ordering::SeqCst) && registry.orphaned_stop_count() == 0
        })
        .await
    );
    assert_eq!(
        registry.get_plugin_metadata("polite").await.unwrap().error_count,
        1
    );
}

#[tokio::test]
async fn test_unload_removes_completely() {
    let registry = registry();
    let plugin = MockPlugin::new("alpha").arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    registry.start_plugin("alpha").await.unwrap();

    registry.unload_plugin("alpha").await.unwrap();

    assert_eq!(plugin.calls.stop(), 1);
    assert!(registry.get_plugin_metadata("alpha").await.is_none());
    assert!(registry.get_plugin("alpha").await.is_none());
    assert!(
        registry
            .get_all_plugins_metadata()
            .await
            .iter()
            .all(|meta| meta.name != "alpha")
    );

    registry.load_plugin(MockPlugin::new("alpha").arc()).await.unwrap();
    assert_eq!(state_of(&registry, "alpha").await, Some(PluginState::Initialized));
}

#[tokio::test]
async fn test_unload_errored_plugin_skips_stop() {
    let registry = registry();
    let plugin = MockPlugin::new("fragile").failing_initialize().arc();
    let _ = registry.load_plugin(plugin.clone()).await;

    registry.unload_plugin("fragile").await.unwrap();
    assert_eq!(plugin.calls.stop(), 0);
    assert!(!registry.contains("fragile").await);
}

#[tokio::test]
async fn test_unload_with_failing_stop_still_removes() {
    let registry = registry();
    let plugin = MockPlugin::new("alpha").with_stop(StopBehavior::Fail).arc();
    registry.load_plugin(plugin.clone()).await.unwrap();
    registry.start_plugin("alpha").await.unwrap();

    let err = registry.unload_plugin("alpha").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::HookFailed {
            operation: LifecycleOperation::Stop,
            ..
        }
    ));
    assert!(!registry.contains("alpha").await);
}

#[tokio::test]
async fn test_concurrent_operations_on_one_plugin_are_serialized() {
    let registry = Arc::new(registry());
    let plugin = MockPlugin::new("slow")
        .with_start_delay(Duration::from_millis(30))
        .arc();
    registry.load_plugin(plugin.clone()).await.unwrap();

    let first = tokio::spawn({
        let registry = registry.clone();
        async move { registry.start_plugin("slow").await }
    });
    let second = tokio::spawn({
        let registry = registry.clone();
        async move { registry.start_plugin("slow").await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(RegistryError::InvalidState { .. })))
        .count();

    assert_eq!(ok, 1);
    assert_eq!(rejected, 1);
    assert_eq!(plugin.calls.start(), 1);
    assert_eq!(state_of(&registry, "slow").await, Some(PluginState::Started));
}

#[tokio::test]
async fn test_shutdown_all_stops_dependents_first() {
    let registry = registry();
    let log = Arc::new(Mutex::new(Vec::new()));

    for (name, deps) in [("base", vec![]), ("middle", vec!["base"]), ("top", vec!["middle"])] {
        let plugin = MockPlugin::new(name)
            .depends_on(&deps)
            .with_stop_log(log.clone());
        registry.load_plugin(plugin.arc()).await.unwrap();
        registry.start_plugin(name).await.unwrap();
    }

    let failures = registry.shutdown_all().await;

    assert!(failures.is_empty());
    assert_eq!(*log.lock().unwrap(), vec!["top", "middle", "base"]);
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn test_shutdown_all_handles_readmitted_dependency() {
    let registry = registry();
    let log = Arc::new(Mutex::new(Vec::new()));

    registry
        .load_plugin(MockPlugin::new("db").with_stop_log(log.clone()).arc())
        .await
        .unwrap();
    registry
        .load_plugin(
            MockPlugin::new("api")
                .depends_on(&["db"])
                .with_stop_log(log.clone())
                .arc(),
        )
        .await
        .unwrap();
    registry.unload_plugin("db").await.unwrap();
    registry
        .load_plugin(MockPlugin::new("db").with_stop_log(log.clone()).arc())
        .await
        .unwrap();
    registry.start_plugin("db").await.unwrap();
    registry.start_plugin("api").await.unwrap();

    let failures = registry.shutdown_all().await;

    assert!(failures.is_empty());
    assert_eq!(*log.lock().unwrap(), vec!["api", "db"]);
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn test_get_plugins_by_state() {
    let registry = registry();
    for name in ["one", "two", "three", "four"] {
        registry.load_plugin(MockPlugin::new(name).arc()).await.unwrap();
    }
    let _ = registry
        .load_plugin(MockPlugin::new("broken").failing_initialize().arc())
        .await;
    registry.start_plugin("three").await.unwrap();
    registry.start_plugin("one").await.unwrap();

    let names = |records: Vec<PluginMetadata>| -> Vec<String> {
        records.into_iter().map(|meta| meta.name).collect()
    };

    assert_eq!(
        names(registry.get_plugins_by_state(PluginState::Started).await),
        vec!["one", "three"]
    );
    assert_eq!(
        names(registry.get_plugins_by_state(PluginState::Initialized).await),
        vec!["two", "four"]
    );
    assert_eq!(
        names(registry.get_plugins_by_state(PluginState::Error).await),
        vec!["broken"]
    );
    assert!(
        registry
            .get_plugins_by_state(PluginState::Stopped)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_shutdown_all_collects_failures() {
    let registry = registry();
    let good = MockPlugin::new("good").arc();
    let bad = MockPlugin::new("bad").with_stop(StopBehavior::Fail).arc();
    registry.load_plugin(good.clone()).await.unwrap();
    registry.load_plugin(bad.clone()).await.unwrap();
    registry.start_plugin("good").await.unwrap();
    registry.start_plugin("bad").await.unwrap();

    let failures = registry.shutdown_all().await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].plugin_name(), "bad");
    assert_eq!(good.calls.stop(), 1);
    assert_eq!(registry.count().await, 0);
}
