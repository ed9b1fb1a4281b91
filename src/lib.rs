pub mod configuration;
pub mod connection_tracking;
pub mod controller;
pub mod error_handling;
pub mod packet_classification;
pub mod retention;
pub mod scripting;
pub mod web_interface;

pub use connection_tracking::{Connection, ConnectionRegistry, ConnectionStatus};
pub use controller::Controller;
pub use packet_classification::{CapturedPacket, PacketClassifier};
pub use retention::RetentionManager;
pub use scripting::ScriptSandbox;
