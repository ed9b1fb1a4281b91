use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;

use super::sandbox::ScriptSandbox;
use super::types::ScriptValue;
use crate::configuration::{CaptureConfig, ScriptingConfig};
use crate::error_handling::types::ScriptError;
use crate::retention::RetentionManager;

// Helper building a sandbox over a throwaway capture directory
fn sandbox(scripting: ScriptingConfig) -> (TempDir, Arc<RetentionManager>, ScriptSandbox) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let capture = CaptureConfig {
        directory: dir.path().to_path_buf(),
        ..Default::default()
    };
    let retention = Arc::new(RetentionManager::new(&capture));
    let sandbox = ScriptSandbox::new(scripting, retention.clone());
    (dir, retention, sandbox)
}

fn fast_config(timeout_ms: u64) -> ScriptingConfig {
    ScriptingConfig {
        timeout_ms,
        // keeps abandoned runaway loops short-lived
        loop_iteration_limit: 20_000_000,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_simple_expression() {
    let (_dir, _retention, sandbox) = sandbox(fast_config(2000));
    let outcome = sandbox.execute("1 + 1").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::Number(2.0));
}

#[tokio::test]
async fn test_timeout_then_recovery() {
    let (_dir, _retention, sandbox) = sandbox(fast_config(50));

    let started = Instant::now();
    let result = sandbox.execute("while(true){}").await;
    let waited = started.elapsed();

    assert_eq!(result, Err(ScriptError::Timeout(Duration::from_millis(50))));
    assert!(result.unwrap_err().is_timeout());
    assert!(waited < Duration::from_millis(1000), "waited {:?}", waited);

    let outcome = sandbox.execute("1+1").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::Number(2.0));
}

#[tokio::test]
async fn test_abandoned_script_holds_its_slot_until_it_exits() {
    let (_dir, _retention, sandbox) = sandbox(ScriptingConfig {
        max_concurrent: 1,
        loop_iteration_limit: 0,
        ..fast_config(50)
    });

    // spins on wall-clock time, so neither the interrupt nor a loop limit ends it early
    let result = sandbox
        .execute("const end = Date.now() + 600; while (Date.now() < end) {}")
        .await;
    assert!(matches!(result, Err(ScriptError::Timeout(_))));

    // the runaway thread is still evaluating and keeps the only slot
    assert_eq!(sandbox.execute("1+1").await, Err(ScriptError::Busy));

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match sandbox.execute("1+1").await {
            Ok(outcome) => {
                assert_eq!(outcome.value, ScriptValue::Number(2.0));
                break;
            }
            Err(ScriptError::Busy) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            other => panic!("slot was never released: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_runtime_errors_are_distinct_from_timeout() {
    let (_dir, _retention, sandbox) = sandbox(fast_config(2000));

    match sandbox.execute("throw new Error('boom')").await {
        Err(ScriptError::Runtime(message)) => assert!(message.contains("boom"), "{}", message),
        other => panic!("expected runtime error, got {:?}", other),
    }
    assert!(matches!(
        sandbox.execute("let = ;").await,
        Err(ScriptError::Runtime(_))
    ));
    // still usable afterwards
    assert!(sandbox.execute("true").await.is_ok());
}

#[tokio::test]
async fn test_retain_binding_writes_hold() {
    let (_dir, retention, sandbox) = sandbox(fast_config(2000));

    let outcome = sandbox.execute("retain('stream-1', 60)").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::Bool(true));
    assert!(retention.is_retained("stream-1"));

    let outcome = sandbox
        .execute("pcap.retain('stream-2', 30); pcap.isRetained('stream-2') && isRetained('stream-1')")
        .await
        .unwrap();
    assert_eq!(outcome.value, ScriptValue::Bool(true));
    assert!(retention.is_retained("stream-2"));
}

#[tokio::test]
async fn test_retain_rejects_bad_arguments() {
    let (_dir, retention, sandbox) = sandbox(fast_config(2000));

    let outcome = sandbox
        .execute("[retain('only-id'), retain('neg', -5), retain('', 10)]")
        .await
        .unwrap();
    assert_eq!(outcome.value, ScriptValue::Json(json!([false, false, false])));
    assert!(retention.retained_captures().is_empty());
}

#[tokio::test]
async fn test_retain_duration_is_capped() {
    let (_dir, retention, sandbox) = sandbox(ScriptingConfig {
        retention_limit_secs: 10,
        ..fast_config(2000)
    });

    sandbox.execute("retain('capped', 3600)").await.unwrap();

    let holds = retention.retained_captures();
    assert_eq!(holds.len(), 1);
    assert!(holds[0].expires_at <= Utc::now() + chrono::TimeDelta::seconds(11));
}

#[tokio::test]
async fn test_path_binding() {
    let (_dir, retention, sandbox) = sandbox(fast_config(2000));

    let outcome = sandbox.execute("path('stream-9')").await.unwrap();
    let expected = retention.capture_path("stream-9").to_string_lossy().into_owned();
    assert_eq!(outcome.value, ScriptValue::String(expected.clone()));

    let outcome = sandbox.execute("pcap.path('stream-9')").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::String(expected));

    assert!(matches!(
        sandbox.execute("path()").await,
        Err(ScriptError::Runtime(_))
    ));
}

#[tokio::test]
async fn test_sleep_is_interrupted_by_timeout() {
    let (_dir, retention, sandbox) = sandbox(fast_config(100));

    let started = Instant::now();
    let result = sandbox.execute("sleep(10000); retain('late', 60)").await;
    assert!(matches!(result, Err(ScriptError::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));

    // the abandoned script must not act after the interrupt
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!retention.is_retained("late"));
}

#[tokio::test]
async fn test_sleep_completes_within_budget() {
    let (_dir, _retention, sandbox) = sandbox(fast_config(2000));
    let outcome = sandbox.execute("sleep(20); 'done'").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::String("done".to_string()));
    assert!(outcome.elapsed_ms >= 20);
}

#[tokio::test]
async fn test_globals_do_not_leak_between_runs() {
    let (_dir, _retention, sandbox) = sandbox(fast_config(2000));

    sandbox.execute("var leaked = 42; globalThis.other = 1; leaked").await.unwrap();
    let outcome = sandbox
        .execute("typeof leaked + ',' + typeof other")
        .await
        .unwrap();
    assert_eq!(outcome.value, ScriptValue::String("undefined,undefined".to_string()));
}

#[tokio::test]
async fn test_log_binding_collects_messages() {
    let (_dir, _retention, sandbox) = sandbox(fast_config(2000));

    let outcome = sandbox
        .execute("log('hello'); console.log('a', 1); 7")
        .await
        .unwrap();
    assert_eq!(outcome.logs, vec!["hello".to_string(), "a 1".to_string()]);
    assert_eq!(outcome.value, ScriptValue::Number(7.0));
}

#[tokio::test]
async fn test_object_results_become_json() {
    let (_dir, _retention, sandbox) = sandbox(fast_config(2000));
    let outcome = sandbox.execute("({a: 1, b: [true, 'x']})").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::Json(json!({"a": 1, "b": [true, "x"]})));

    let outcome = sandbox.execute("null").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::Null);
    let outcome = sandbox.execute("undefined").await.unwrap();
    assert_eq!(outcome.value, ScriptValue::Undefined);
}

#[tokio::test]
async fn test_disabled_sandbox() {
    let (_dir, _retention, sandbox) = sandbox(ScriptingConfig {
        enabled: false,
        ..fast_config(2000)
    });
    assert_eq!(sandbox.execute("1").await, Err(ScriptError::Disabled));
}

#[tokio::test]
async fn test_busy_when_admission_is_full() {
    let (_dir, _retention, sandbox) = sandbox(ScriptingConfig {
        max_concurrent: 1,
        ..fast_config(2000)
    });
    let sandbox = Arc::new(sandbox);

    let running = {
        let sandbox = sandbox.clone();
        tokio::spawn(async move { sandbox.execute("sleep(300); 1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(sandbox.execute("2").await, Err(ScriptError::Busy));
    assert!(running.await.unwrap().is_ok());
    // admitted again once the first run released its slot
    assert!(sandbox.execute("3").await.is_ok());
}

#[tokio::test]
async fn test_executions_are_serialized() {
    let (_dir, _retention, sandbox) = sandbox(ScriptingConfig {
        max_concurrent: 4,
        ..fast_config(2000)
    });

    let started = Instant::now();
    let (a, b) = tokio::join!(
        sandbox.execute("sleep(100); 'a'"),
        sandbox.execute("sleep(100); 'b'")
    );
    assert!(a.is_ok() && b.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(200));
}
