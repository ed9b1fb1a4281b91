//! Sandboxed script execution.
//!
//! Scripts are JavaScript evaluated by `boa_engine` with a small capability
//! surface (see [`bindings`]) that reaches into capture retention.

pub mod bindings;
pub mod interrupt;
pub mod sandbox;
pub mod types;

#[cfg(test)]
mod tests;

pub use interrupt::InterruptSignal;
pub use sandbox::ScriptSandbox;
pub use types::{ScriptOutcome, ScriptValue};
