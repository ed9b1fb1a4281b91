//! Wiring of one capture worker.

pub mod controller_handler;

pub use controller_handler::Controller;
