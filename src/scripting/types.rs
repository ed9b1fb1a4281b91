use serde::Serialize;
use uuid::Uuid;

/// Completion value of a script, detached from the engine that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Objects and arrays, converted through JSON.
    Json(serde_json::Value),
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptOutcome {
    pub execution_id: Uuid,
    pub value: ScriptValue,
    /// Messages passed to `log` / `console.log`, in call order.
    pub logs: Vec<String>,
    pub elapsed_ms: u64,
}
