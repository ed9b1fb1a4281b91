//! Capability surface exposed to scripts.
//!
//! Globals: `retain(id, seconds)`, `isRetained(id)`, `path(id)`, `sleep(ms)`
//! and `log(...)`. The capture helpers are also reachable as `pcap.retain`,
//! `pcap.isRetained` and `pcap.path`, and `console.log` aliases `log`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use boa_engine::object::JsObject;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction};
use boa_gc::{Finalize, Trace};
use log::{debug, info, warn};
use uuid::Uuid;

use super::interrupt::InterruptSignal;
use crate::retention::RetentionManager;

const MAX_SLEEP: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-execution binding state. Built fresh for every script run.
///
/// Each bound function carries its own clone as captures. None of the fields
/// hold engine objects, so the collector has nothing to trace.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct ScriptBindings {
    #[unsafe_ignore_trace]
    execution_id: Uuid,
    #[unsafe_ignore_trace]
    retention: Arc<RetentionManager>,
    #[unsafe_ignore_trace]
    signal: Arc<InterruptSignal>,
    #[unsafe_ignore_trace]
    retention_limit: Option<Duration>,
    #[unsafe_ignore_trace]
    logs: Arc<Mutex<Vec<String>>>,
}

impl ScriptBindings {
    pub fn new(
        execution_id: Uuid,
        retention: Arc<RetentionManager>,
        signal: Arc<InterruptSignal>,
        retention_limit: Option<Duration>,
    ) -> Self {
        Self {
            execution_id,
            retention,
            signal,
            retention_limit,
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Messages logged so far by the script.
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Registers every binding as a global of `context`.
    pub fn install(&self, context: &mut Context) -> JsResult<()> {
        let retain = self.retain_fn().to_js_function(context.realm());
        let is_retained = self.is_retained_fn().to_js_function(context.realm());
        let path = self.path_fn().to_js_function(context.realm());
        let sleep = self.sleep_fn().to_js_function(context.realm());
        let log = self.log_fn().to_js_function(context.realm());

        let pcap = JsObject::default();
        pcap.set(js_string!("retain"), retain.clone(), false, context)?;
        pcap.set(js_string!("isRetained"), is_retained.clone(), false, context)?;
        pcap.set(js_string!("path"), path.clone(), false, context)?;

        let console = JsObject::default();
        console.set(js_string!("log"), log.clone(), false, context)?;

        context.register_global_property(js_string!("retain"), retain, Attribute::all())?;
        context.register_global_property(js_string!("isRetained"), is_retained, Attribute::all())?;
        context.register_global_property(js_string!("path"), path, Attribute::all())?;
        context.register_global_property(js_string!("sleep"), sleep, Attribute::all())?;
        context.register_global_property(js_string!("log"), log, Attribute::all())?;
        context.register_global_property(js_string!("pcap"), pcap, Attribute::all())?;
        context.register_global_property(js_string!("console"), console, Attribute::all())?;
        Ok(())
    }

    fn retain_fn(&self) -> NativeFunction {
        NativeFunction::from_copy_closure_with_captures(
            |_, args, bindings, ctx| bindings.retain(args, ctx),
            self.clone(),
        )
    }

    fn is_retained_fn(&self) -> NativeFunction {
        NativeFunction::from_copy_closure_with_captures(
            |_, args, bindings, ctx| bindings.is_retained(args, ctx),
            self.clone(),
        )
    }

    fn path_fn(&self) -> NativeFunction {
        NativeFunction::from_copy_closure_with_captures(
            |_, args, bindings, ctx| bindings.path(args, ctx),
            self.clone(),
        )
    }

    fn sleep_fn(&self) -> NativeFunction {
        NativeFunction::from_copy_closure_with_captures(
            |_, args, bindings, ctx| bindings.sleep(args, ctx),
            self.clone(),
        )
    }

    fn log_fn(&self) -> NativeFunction {
        NativeFunction::from_copy_closure_with_captures(
            |_, args, bindings, ctx| bindings.log(args, ctx),
            self.clone(),
        )
    }

    fn retain(&self, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
        ensure_running(&self.signal)?;
        let id = self.execution_id;
        let capture_id = string_arg(args, 0, ctx)?;
        let seconds = number_arg(args, 1, ctx)?;
        let (Some(capture_id), Some(seconds)) = (capture_id, seconds) else {
            warn!("[script {}] retain(captureId, durationSeconds) needs two arguments", id);
            return Ok(JsValue::from(false));
        };
        if capture_id.is_empty() || !seconds.is_finite() || seconds < 0.0 {
            warn!(
                "[script {}] retain({:?}, {}) rejected: invalid arguments",
                id, capture_id, seconds
            );
            return Ok(JsValue::from(false));
        }

        let mut duration = Duration::try_from_secs_f64(seconds.trunc()).unwrap_or(Duration::MAX);
        if let Some(limit) = self.retention_limit {
            if duration > limit {
                debug!(
                    "[script {}] retain duration {:?} capped to {:?}",
                    id, duration, limit
                );
                duration = limit;
            }
        }
        self.retention.retain_pcap(&capture_id, duration);
        Ok(JsValue::from(true))
    }

    fn is_retained(&self, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
        ensure_running(&self.signal)?;
        let retained = match string_arg(args, 0, ctx)? {
            Some(capture_id) => self.retention.is_retained(&capture_id),
            None => false,
        };
        Ok(JsValue::from(retained))
    }

    fn path(&self, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
        ensure_running(&self.signal)?;
        let Some(capture_id) = string_arg(args, 0, ctx)? else {
            return Err(JsNativeError::typ()
                .with_message("path(captureId) requires a capture id")
                .into());
        };
        let path = self
            .retention
            .capture_path(&capture_id)
            .to_string_lossy()
            .into_owned();
        Ok(JsValue::from(JsString::from(path.as_str())))
    }

    fn sleep(&self, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
        ensure_running(&self.signal)?;
        let millis = number_arg(args, 0, ctx)?
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .unwrap_or(0.0);
        let duration = Duration::try_from_secs_f64(millis / 1000.0)
            .unwrap_or(MAX_SLEEP)
            .min(MAX_SLEEP);
        if !self.signal.sleep(duration) {
            return Err(interrupted());
        }
        Ok(JsValue::undefined())
    }

    fn log(&self, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
        ensure_running(&self.signal)?;
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            parts.push(arg.to_string(ctx)?.to_std_string_escaped());
        }
        let message = parts.join(" ");
        info!("[script {}] {}", self.execution_id, message);
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
        Ok(JsValue::undefined())
    }
}

fn interrupted() -> boa_engine::JsError {
    JsNativeError::error()
        .with_message("script interrupted")
        .into()
}

fn ensure_running(signal: &InterruptSignal) -> JsResult<()> {
    if signal.is_raised() {
        Err(interrupted())
    } else {
        Ok(())
    }
}

fn string_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<Option<String>> {
    match args.get(index) {
        Some(value) if !value.is_undefined() => {
            Ok(Some(value.to_string(ctx)?.to_std_string_escaped()))
        }
        _ => Ok(None),
    }
}

fn number_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<Option<f64>> {
    match args.get(index) {
        Some(value) if !value.is_undefined() => Ok(Some(value.to_number(ctx)?)),
        _ => Ok(None),
    }
}
