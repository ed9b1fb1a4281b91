use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use boa_engine::{Context, JsValue, Source};
use log::{debug, error, info, warn};
use tokio::sync::{oneshot, Mutex, Semaphore};
use uuid::Uuid;

use super::bindings::ScriptBindings;
use super::interrupt::InterruptSignal;
use super::types::{ScriptOutcome, ScriptValue};
use crate::configuration::ScriptingConfig;
use crate::error_handling::types::ScriptError;
use crate::retention::RetentionManager;

/// Runs user scripts one at a time under a wall-clock timeout.
///
/// Every execution gets a fresh engine on its own thread with freshly built
/// bindings, so nothing a script defines is visible to the next one. The
/// caller waits on a completion channel raced against the timeout; when the
/// timeout wins the interrupt signal is raised, the caller gets
/// [`ScriptError::Timeout`], and the evaluation thread is left behind. Bound
/// functions refuse to act once interrupted, and the engine's loop-iteration
/// limit ends scripts that never call into a binding.
///
/// At most `max_concurrent` executions hold an admission slot at once: queued
/// callers, the running one, and any abandoned thread still evaluating. A slot
/// is given back only when its evaluation thread exits, so runaway scripts
/// cannot pile up. Callers finding every slot taken get [`ScriptError::Busy`].
pub struct ScriptSandbox {
    config: ScriptingConfig,
    retention: Arc<RetentionManager>,
    admission: Arc<Semaphore>,
    engine: Mutex<()>,
}

impl ScriptSandbox {
    pub fn new(config: ScriptingConfig, retention: Arc<RetentionManager>) -> Self {
        let admission = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            retention,
            admission,
            engine: Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn retention_limit(&self) -> Option<Duration> {
        match self.config.retention_limit_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub async fn execute(&self, script: &str) -> Result<ScriptOutcome, ScriptError> {
        if !self.config.enabled {
            return Err(ScriptError::Disabled);
        }
        let permit = self.admission.clone().try_acquire_owned().map_err(|_| {
            warn!(
                "Rejecting script: {} executions already admitted",
                self.config.max_concurrent
            );
            ScriptError::Busy
        })?;
        let _engine = self.engine.lock().await;

        let execution_id = Uuid::new_v4();
        let timeout = self.config.timeout();
        let signal = Arc::new(InterruptSignal::new());
        let bindings = ScriptBindings::new(
            execution_id,
            self.retention.clone(),
            signal.clone(),
            self.retention_limit(),
        );
        let loop_limit = match self.config.loop_iteration_limit {
            0 => u64::MAX,
            limit => limit,
        };

        debug!("[script {}] starting ({} bytes)", execution_id, script.len());
        let started = Instant::now();
        let (tx, rx) = oneshot::channel();
        let source = script.to_string();
        let worker_bindings = bindings.clone();
        thread::Builder::new()
            .name(format!("script-{}", execution_id))
            .spawn(move || {
                let result = evaluate(&source, &worker_bindings, loop_limit);
                // The slot follows the thread, not the caller.
                drop(permit);
                let _ = tx.send(result);
            })
            .map_err(|e| {
                error!("[script {}] failed to spawn execution thread: {}", execution_id, e);
                ScriptError::WorkerFailed(e.to_string())
            })?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => {
                let elapsed = started.elapsed();
                info!("[script {}] finished in {:?}", execution_id, elapsed);
                Ok(ScriptOutcome {
                    execution_id,
                    value,
                    logs: bindings.logs(),
                    elapsed_ms: elapsed.as_millis() as u64,
                })
            }
            Ok(Ok(Err(e))) => {
                warn!("[script {}] failed: {}", execution_id, e);
                Err(e)
            }
            Ok(Err(_)) => {
                error!("[script {}] execution thread died without a result", execution_id);
                Err(ScriptError::WorkerFailed(
                    "execution thread exited without a result".to_string(),
                ))
            }
            Err(_) => {
                signal.raise();
                warn!(
                    "[script {}] interrupted after {:?}, abandoning its thread",
                    execution_id, timeout
                );
                Err(ScriptError::Timeout(timeout))
            }
        }
    }
}

fn evaluate(
    source: &str,
    bindings: &ScriptBindings,
    loop_limit: u64,
) -> Result<ScriptValue, ScriptError> {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(loop_limit);
    bindings
        .install(&mut context)
        .map_err(|e| ScriptError::WorkerFailed(format!("failed to install bindings: {}", e)))?;

    let value = context
        .eval(Source::from_bytes(source))
        .map_err(|e| ScriptError::Runtime(e.to_string()))?;
    Ok(convert_value(&value, &mut context))
}

fn convert_value(value: &JsValue, context: &mut Context) -> ScriptValue {
    if value.is_undefined() {
        ScriptValue::Undefined
    } else if value.is_null() {
        ScriptValue::Null
    } else if let Some(b) = value.as_boolean() {
        ScriptValue::Bool(b)
    } else if let Some(n) = value.as_number() {
        ScriptValue::Number(n)
    } else if let Some(s) = value.as_string() {
        ScriptValue::String(s.to_std_string_escaped())
    } else if value.is_object() {
        match value.to_json(context) {
            Ok(json) => ScriptValue::Json(json),
            Err(_) => ScriptValue::String(value.display().to_string()),
        }
    } else {
        ScriptValue::String(value.display().to_string())
    }
}
